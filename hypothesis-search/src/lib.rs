//! Hypothesis-search drives the generate step of a
//! generate-test-constrain loop for inductive logic programming.
//!
//! The hypothesis space is a ground answer set program whose models
//! are candidate logic programs.  A `Generator` hands out candidates
//! one at a time; the caller tests them and reports `Rejection`s,
//! which the constraint compiler turns into nogoods over the space:
//!
//! - `logic` is the first-order vocabulary (atoms, literals, rules,
//!   programs) and canonical rule `Handle`s;
//! - `grounder` enumerates the bindings that instantiate abstract
//!   constraints, with memoisation;
//! - `constrain` compiles rejections into ground nogoods;
//! - `backend` is the answer set solver seam, with a SAT-based
//!   implementation on top of `satumerator`;
//! - `space` renders the hypothesis space for a bias;
//! - `generator` is the search session.
pub mod backend;
pub mod bias;
pub mod constrain;
pub mod error;
pub mod generator;
pub mod ground;
pub mod grounder;
pub mod logic;
pub mod settings;
pub mod space;

pub use backend::AspBackend;
pub use backend::SatBackend;
pub use bias::Bias;
pub use constrain::Compiler;
pub use constrain::ConstraintKind;
pub use constrain::Rejection;
pub use error::Error;
pub use error::Result;
pub use generator::Candidate;
pub use generator::Dimension;
pub use generator::Generator;
pub use grounder::Grounder;
pub use logic::Program;
pub use logic::Rule;
pub use settings::Settings;

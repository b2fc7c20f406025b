//! Satumerator enumerates every solution of small combinatorial
//! problems with an incremental SAT solver (CryptoMiniSat).
//!
//! Two front-ends share the same variable map and CNF gadgets:
//!
//! - `Satumerator` enumerates all assignments of its atoms under
//!   exactly-one / at-most-one domains and signed nogoods;
//! - `GroundProgram` accepts tight ground normal programs (with choice
//!   rules, integrity constraints and externals), and its
//!   `ModelStream`s enumerate their stable models.
mod gadgets;
mod kb;
mod program;
mod satumerator;
mod solver_state;

pub use kb::AtMostOne;
pub use kb::ChoiceConstraint;
pub use kb::Nogood;
pub use kb::StateAtom;
pub use program::GroundProgram;
pub use program::Head;
pub use program::ModelStream;
pub use program::ProgramRule;
pub use satumerator::Satumerator;

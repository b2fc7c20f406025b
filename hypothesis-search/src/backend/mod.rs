//! The answer set backend the search session drives.
//!
//! A backend holds a permanent ground program, built from named text
//! fragments and from rules added one at a time, and hands out models
//! through a restartable stream.  Nogoods added through `add_nogood`
//! only constrain the current stream; anything meant to last must be
//! added as a rule.
mod parse;
mod sat;

use crate::error::Result;
use crate::ground::GroundAtom;
use crate::ground::Nogood;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;

pub use parse::GroundParser;
pub use parse::Rule as GrammarRule;
pub use sat::SatBackend;

/// The shown atoms of a model.
pub type Model = BTreeSet<GroundAtom>;

pub trait AspBackend {
    /// Backend-side handle for an interned atom.
    type Atom: Copy + Debug + Eq + Hash;

    /// Registers the program text `text` under `name`, parameterised
    /// by `params`.  Adding to an existing fragment appends to it.
    fn add(&mut self, name: &str, params: &[&str], text: &str) -> Result<()>;

    /// Instantiates the fragment `name` with `args` for its parameters
    /// and adds the result to the permanent program.
    fn ground(&mut self, name: &str, args: &[i64]) -> Result<()>;

    /// Fixes the truth value of an external atom.  Unknown atoms are
    /// ignored.
    fn assign_external(&mut self, atom: &GroundAtom, value: bool);

    /// Makes an external atom permanently false.
    fn release_external(&mut self, atom: &GroundAtom);

    fn add_atom(&mut self, atom: &GroundAtom) -> Self::Atom;

    /// Adds `head :- body`, or an integrity constraint when `head` is
    /// `None`.
    fn add_rule(&mut self, head: Option<Self::Atom>, body: &[(Self::Atom, bool)]);

    /// Forbids `nogood` in the current model stream.
    fn add_nogood(&mut self, nogood: &Nogood);

    /// Restarts the model stream from the current program.
    fn solve(&mut self);

    /// Returns the next model of the current stream, starting one if
    /// needed.
    fn next_model(&mut self) -> Option<Model>;
}

//! Traits and types that represent Satumerator's knowledge of the
//! search space.
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;

/// A `StateAtom` is an atomic piece of state, e.g., the decision `x =
/// true`.  Anything hashable, ordered and cloneable qualifies.
pub trait StateAtom
where
    Self: Clone + Debug + Eq + Hash + PartialOrd + Ord + Sized,
{
}

impl<T> StateAtom for T where T: Clone + Debug + Eq + Hash + PartialOrd + Ord + Sized {}

/// A `Nogood` is a partial assignment that no solution may extend:
/// at least one of the `(atom, value)` pairs must be violated.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Nogood<A: StateAtom> {
    pub partial_assignment: BTreeSet<(A, bool)>,
}

impl<A: StateAtom> Nogood<A> {
    #[must_use]
    pub fn new(partial_assignment: impl IntoIterator<Item = (A, bool)>) -> Self {
        Self {
            partial_assignment: partial_assignment.into_iter().collect(),
        }
    }

    /// Returns a nogood that forbids setting all of `atoms` to true.
    #[must_use]
    pub fn positive(atoms: impl IntoIterator<Item = A>) -> Self {
        Self::new(atoms.into_iter().map(|atom| (atom, true)))
    }
}

/// A `ChoiceConstraint` is a set of `StateAtoms` from which any valid
/// state much pick exactly one option to assert as true.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ChoiceConstraint<A: StateAtom> {
    pub options: BTreeSet<A>,
}

impl<A: StateAtom> ChoiceConstraint<A> {
    #[must_use]
    pub fn new(options: impl IntoIterator<Item = A>) -> Self {
        Self {
            options: options.into_iter().collect(),
        }
    }
}

/// An `AtMostOne` constraint lets valid states assert zero or one of
/// its `options`, never more.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AtMostOne<A: StateAtom> {
    pub options: BTreeSet<A>,
}

impl<A: StateAtom> AtMostOne<A> {
    #[must_use]
    pub fn new(options: impl IntoIterator<Item = A>) -> Self {
        Self {
            options: options.into_iter().collect(),
        }
    }
}

#[test]
fn test_nogood_dedup() {
    let x = Nogood::new(vec![("x", true), ("y", false), ("x", true)]);
    let y = Nogood::new(vec![("y", false), ("x", true)]);

    assert_eq!(x, y);
    assert_eq!(x.partial_assignment.len(), 2);
}

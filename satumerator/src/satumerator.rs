//! A `Satumerator` enumerates every assignment of its atoms that
//! satisfies the declared domain (choice and at-most-one constraints)
//! and avoids all nogoods.  Each model is reported once, as the set of
//! atoms it sets to true; after each model, we add a blocking clause
//! over all known atoms, so the enumeration is complete and
//! duplicate-free.
use super::gadgets;
use super::solver_state::SolverState;
use super::{AtMostOne, ChoiceConstraint, Nogood, StateAtom};
use cryptominisat::Lbool;
use cryptominisat::Lit;
use std::collections::BTreeSet;
use std::collections::HashSet;

pub struct Satumerator<A: StateAtom> {
    clauses: HashSet<Nogood<A>>,
    domain: HashSet<ChoiceConstraint<A>>,
    at_most_one: HashSet<AtMostOne<A>>,
    sat_state: SolverState<A>,
    // Set once the last model has been blocked (or the domain is
    // trivially infeasible).
    exhausted: bool,
}

impl<A: StateAtom> Satumerator<A> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            clauses: HashSet::new(),
            domain: HashSet::new(),
            at_most_one: HashSet::new(),
            sat_state: SolverState::new(),
            exhausted: false,
        }
    }

    /// Refines the domain to take into account the "pick one of k"
    /// choice `constraint`.
    pub fn declare_choice(&mut self, constraint: ChoiceConstraint<A>) {
        if self.domain.contains(&constraint) {
            return;
        }

        if constraint.options.is_empty() {
            self.exhausted = true;
        }

        let vars: Vec<Lit> = self
            .sat_state
            .atoms_vars(constraint.options.iter().cloned());

        gadgets::add_at_least_one_constraint(self.sat_state.solver(), &vars);
        gadgets::add_at_most_one_constraint(self.sat_state.solver(), &vars);
        self.domain.insert(constraint);
    }

    /// Refines the domain to take into account the "pick zero or one
    /// of k" `constraint`.
    pub fn declare_at_most_one(&mut self, constraint: AtMostOne<A>) {
        if self.at_most_one.contains(&constraint) {
            return;
        }

        let vars: Vec<Lit> = self
            .sat_state
            .atoms_vars(constraint.options.iter().cloned());

        gadgets::add_at_most_one_constraint(self.sat_state.solver(), &vars);
        self.at_most_one.insert(constraint);
    }

    /// Adds `nogood`.
    ///
    /// # Errors
    ///
    /// Returns `Err` when some of the atoms in `nogood` are not
    /// constrained by a domain constraint: a nogood over an atom the
    /// enumeration never projects on would be meaningless.
    pub fn add_nogood(&mut self, nogood: Nogood<A>) -> Result<(), &'static str> {
        if self.clauses.contains(&nogood) {
            return Ok(());
        }

        let mut vars = Vec::with_capacity(nogood.partial_assignment.len());
        for (atom, value) in &nogood.partial_assignment {
            let lit = self
                .sat_state
                .lookup(atom)
                .ok_or("nogood includes unconstrained variable.")?;
            vars.push(if *value { lit } else { !lit });
        }

        gadgets::add_nogood(self.sat_state.solver(), &vars);
        self.clauses.insert(nogood);
        Ok(())
    }

    /// Returns the next model, as the set of atoms it sets to true,
    /// and blocks it from future calls.
    ///
    /// A `None` means that the enumeration has been completed.
    pub fn next_model(&mut self) -> Option<BTreeSet<A>> {
        if self.exhausted {
            return None;
        }

        match self.sat_state.solver().solve() {
            Lbool::True => {
                let mut model = BTreeSet::new();
                let mut blocking = Vec::new();

                for (atom, lit) in self.sat_state.atoms() {
                    if self.sat_state.holds(lit) {
                        model.insert(atom.clone());
                        blocking.push(!lit);
                    } else {
                        blocking.push(lit);
                    }
                }

                if blocking.is_empty() {
                    self.exhausted = true;
                } else {
                    self.sat_state.solver().add_clause(&blocking);
                }

                Some(model)
            }
            // If there is no model, then we're done.
            Lbool::False => {
                self.exhausted = true;
                None
            }
            #[cfg(not(tarpaulin_include))]
            Lbool::Undef => panic!("Exhaustive enumeration timed out without time limit."),
        }
    }

    /// Drains every remaining model.
    pub fn all_models(&mut self) -> Vec<BTreeSet<A>> {
        std::iter::from_fn(|| self.next_model()).collect()
    }
}

impl<A: StateAtom> Default for Satumerator<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[test]
fn test_smoke() {
    // Create an empty enumerator. We should find exactly one trivial
    // model.
    let mut state = Satumerator::<String>::new();
    assert_eq!(state.next_model(), Some(BTreeSet::new()));
    assert_eq!(state.next_model(), None);
}

#[test]
fn test_nogood_no_domain() {
    // Add a nogood for `x = true` without a domain constraint.
    // That should fail.
    let mut state = Satumerator::<String>::default();

    assert!(state.add_nogood(Nogood::positive(vec!["x".into()])).is_err());
}

#[test]
fn test_nogood_with_domain() {
    // Add a domain constraint `exactly_one_of(x, y)`, and nogoods for
    // `x = true` and `y = true`.  We should be done.
    let mut state = Satumerator::<String>::new();

    state.declare_choice(ChoiceConstraint::new(vec!["x".into(), "y".into()]));
    state
        .add_nogood(Nogood::positive(vec!["x".into()]))
        .expect("ok");
    state
        .add_nogood(Nogood::positive(vec!["y".into()]))
        .expect("ok");

    assert_eq!(state.next_model(), None);
}

#[test]
fn test_empty_choice() {
    let mut state = Satumerator::<String>::new();

    state.declare_choice(ChoiceConstraint::new(Vec::<String>::new()));
    assert_eq!(state.next_model(), None);
}

#[test]
fn test_enumerate_injections() {
    // Two items `a` and `b`, each mapped to exactly one of three slots,
    // with at most one item per slot: 3 * 2 = 6 injections.
    let mut state = Satumerator::<(char, u32)>::new();

    for item in ['a', 'b'] {
        state.declare_choice(ChoiceConstraint::new((0..3).map(|slot| (item, slot))));
    }
    for slot in 0..3 {
        state.declare_at_most_one(AtMostOne::new(['a', 'b'].iter().map(|item| (*item, slot))));
    }

    let models = state.all_models();
    assert_eq!(models.len(), 6);
    assert_eq!(
        models.iter().collect::<HashSet<_>>().len(),
        6,
        "models must be distinct"
    );
    for model in &models {
        assert_eq!(model.len(), 2);
    }
}

#[test]
fn test_negative_nogood() {
    // exactly_one_of(x, y, z), and "x must hold" as the nogood
    // `x = false`.
    let mut state = Satumerator::<String>::new();

    state.declare_choice(ChoiceConstraint::new(vec![
        "x".into(),
        "y".into(),
        "z".into(),
    ]));
    state
        .add_nogood(Nogood::new(vec![("x".into(), false)]))
        .expect("ok");

    let models = state.all_models();
    assert_eq!(models, vec![["x".to_string()].into_iter().collect()]);
}

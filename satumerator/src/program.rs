//! A `GroundProgram` is a ground normal logic program with choice
//! rules, integrity constraints and external atoms.  We only accept
//! tight programs (no positive cycles through rule heads), for which
//! stable models coincide with the models of Clark's completion: each
//! atom is true iff the body of one of its rules holds.  The
//! completion is plain CNF, so CryptoMiniSat can enumerate the stable
//! models for us.
//!
//! The program itself is permanent and only grows; each call to
//! `solve` translates the current program into a fresh `ModelStream`.
//! Nogoods added to a stream only last as long as that stream, while
//! rules added to the program persist into every later stream.
use super::gadgets;
use super::solver_state::SolverState;
use super::{Nogood, StateAtom};
use cryptominisat::Lbool;
use cryptominisat::Lit;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;

/// The head of a ground rule.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Head<A: StateAtom> {
    /// The rule derives this atom.
    Atom(A),
    /// The rule allows (but does not force) any subset of these atoms.
    Choice(Vec<A>),
    /// Integrity constraint: the body must not hold.
    Falsum,
}

/// A ground rule `head :- body`, where the body is a conjunction of
/// `(atom, positive?)` literals.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProgramRule<A: StateAtom> {
    pub head: Head<A>,
    pub body: Vec<(A, bool)>,
}

impl<A: StateAtom> ProgramRule<A> {
    #[must_use]
    pub fn fact(atom: A) -> Self {
        Self {
            head: Head::Atom(atom),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn constraint(body: Vec<(A, bool)>) -> Self {
        Self {
            head: Head::Falsum,
            body,
        }
    }
}

/// A sign preference for an atom: higher weights are honoured first.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Preference<A: StateAtom> {
    atom: A,
    weight: i64,
    sign: bool,
}

pub struct GroundProgram<A: StateAtom> {
    rules: Vec<ProgramRule<A>>,
    known_rules: HashSet<ProgramRule<A>>,
    // `None` for declared but unassigned externals.
    externals: BTreeMap<A, Option<bool>>,
    preferences: Vec<Preference<A>>,
}

impl<A: StateAtom> GroundProgram<A> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            known_rules: HashSet::new(),
            externals: BTreeMap::new(),
            preferences: Vec::new(),
        }
    }

    /// Adds `rule` to the program.  Returns false if the exact same
    /// rule was already present.
    pub fn add_rule(&mut self, rule: ProgramRule<A>) -> bool {
        if self.known_rules.contains(&rule) {
            return false;
        }

        self.known_rules.insert(rule.clone());
        self.rules.push(rule);
        true
    }

    /// Returns the number of distinct rules in the program.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Declares `atom` as external.  Unassigned externals are false.
    pub fn declare_external(&mut self, atom: A) {
        self.externals.entry(atom).or_insert(None);
    }

    /// Fixes the truth value of the external `atom`.  Returns false
    /// (and does nothing) if `atom` is not a declared external.
    pub fn assign_external(&mut self, atom: &A, value: bool) -> bool {
        match self.externals.get_mut(atom) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    /// Turns the external `atom` into a regular atom; without a rule
    /// to support it, it is false from now on.
    pub fn release_external(&mut self, atom: &A) -> bool {
        self.externals.remove(atom).is_some()
    }

    /// Asks model enumeration to try and give `atom` the truth value
    /// `sign`; higher `weight`s are tried first.
    pub fn prefer(&mut self, atom: A, weight: i64, sign: bool) {
        self.preferences.push(Preference { atom, weight, sign });
    }

    /// Translates the current program to a fresh model stream.
    #[must_use]
    pub fn solve(&self) -> ModelStream<A> {
        let mut sat_state = SolverState::new();
        let mut supports: BTreeMap<A, Vec<Lit>> = BTreeMap::new();
        let mut choices: BTreeSet<A> = BTreeSet::new();
        let mut truth: Option<Lit> = None;

        for rule in &self.rules {
            let body = body_literal(&mut sat_state, &mut truth, &rule.body);

            match &rule.head {
                Head::Atom(atom) => {
                    let head = sat_state.atom_var(atom.clone());
                    // body -> head
                    gadgets::add_implies_any(sat_state.solver(), body, &[head]);
                    supports.entry(atom.clone()).or_default().push(body);
                }
                Head::Choice(atoms) => {
                    for atom in atoms {
                        sat_state.atom_var(atom.clone());
                        supports.entry(atom.clone()).or_default().push(body);
                        choices.insert(atom.clone());
                    }
                }
                Head::Falsum => gadgets::add_nogood(sat_state.solver(), &[body]),
            }
        }

        let mut assumptions = Vec::with_capacity(self.externals.len());
        for (atom, value) in &self.externals {
            let lit = sat_state.atom_var(atom.clone());
            assumptions.push(if *value == Some(true) { lit } else { !lit });
        }

        // Completion: every non-external atom needs a support.
        let atoms: Vec<(A, Lit)> = sat_state
            .atoms()
            .map(|(atom, lit)| (atom.clone(), lit))
            .collect();
        for (atom, lit) in &atoms {
            if self.externals.contains_key(atom) {
                continue;
            }

            let bodies = supports.get(atom).map(Vec::as_slice).unwrap_or(&[]);
            gadgets::add_implies_any(sat_state.solver(), *lit, bodies);
        }

        let mut preferences = self.preferences.clone();
        preferences.sort_by(|x, y| y.weight.cmp(&x.weight));
        let preferences = preferences
            .into_iter()
            .map(|pref| {
                let lit = sat_state.atom_var(pref.atom);
                if pref.sign {
                    lit
                } else {
                    !lit
                }
            })
            .collect();

        let choices = choices
            .into_iter()
            .map(|atom| sat_state.atom_var(atom))
            .collect();

        log::debug!(
            "translated ground program: {} rules, {} atoms, {} externals",
            self.rules.len(),
            atoms.len(),
            self.externals.len()
        );

        ModelStream {
            sat_state,
            assumptions,
            preferences,
            choices,
            exhausted: false,
            models: 0,
        }
    }
}

impl<A: StateAtom> Default for GroundProgram<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns a literal equivalent to the conjunction `body`.
fn body_literal<A: StateAtom>(
    sat_state: &mut SolverState<A>,
    truth: &mut Option<Lit>,
    body: &[(A, bool)],
) -> Lit {
    let signed = |sat_state: &mut SolverState<A>, (atom, positive): &(A, bool)| {
        let lit = sat_state.atom_var(atom.clone());
        if *positive {
            lit
        } else {
            !lit
        }
    };

    match body {
        [] => *truth.get_or_insert_with(|| {
            let lit = sat_state.fresh_var();
            sat_state.solver().add_clause(&[lit]);
            lit
        }),
        [single] => signed(sat_state, single),
        _ => {
            let inputs: Vec<Lit> = body.iter().map(|x| signed(sat_state, x)).collect();
            let output = sat_state.fresh_var();
            gadgets::add_tseitin_and(sat_state.solver(), output, &inputs);
            output
        }
    }
}

/// A `ModelStream` enumerates the stable models of a `GroundProgram`
/// snapshot, each exactly once.
pub struct ModelStream<A: StateAtom> {
    sat_state: SolverState<A>,
    assumptions: Vec<Lit>,
    preferences: Vec<Lit>,
    // Stable models of tight programs are determined by their choice
    // atoms, so blocking clauses only mention these.
    choices: Vec<Lit>,
    exhausted: bool,
    models: usize,
}

impl<A: StateAtom> ModelStream<A> {
    /// Returns the set of true atoms in the next model, if any.
    pub fn next_model(&mut self) -> Option<BTreeSet<A>> {
        if self.exhausted {
            return None;
        }

        let mut assumptions = self.assumptions.clone();
        match self.sat_state.solver().solve_with_assumptions(&assumptions) {
            Lbool::True => {}
            Lbool::False => {
                log::debug!("model stream exhausted after {} models", self.models);
                self.exhausted = true;
                return None;
            }
            #[cfg(not(tarpaulin_include))]
            Lbool::Undef => panic!("Model enumeration timed out without time limit."),
        }

        if !self.preferences.is_empty() {
            for pref in &self.preferences {
                assumptions.push(*pref);
                if self.sat_state.solver().solve_with_assumptions(&assumptions) != Lbool::True {
                    assumptions.pop();
                }
            }

            // The last probe may have failed; settle on the kept
            // preferences, which we know to be satisfiable.
            let outcome = self.sat_state.solver().solve_with_assumptions(&assumptions);
            assert_eq!(outcome, Lbool::True);
        }

        let model: BTreeSet<A> = self
            .sat_state
            .atoms()
            .filter(|(_, lit)| self.sat_state.holds(*lit))
            .map(|(atom, _)| atom.clone())
            .collect();

        let blocking: Vec<Lit> = self
            .choices
            .iter()
            .map(|lit| if self.sat_state.holds(*lit) { !*lit } else { *lit })
            .collect();
        if blocking.is_empty() {
            self.exhausted = true;
        } else {
            self.sat_state.solver().add_clause(&blocking);
        }

        self.models += 1;
        Some(model)
    }

    /// Forbids `nogood` for the rest of this stream.  Atoms that the
    /// program never mentions are false.
    pub fn add_nogood(&mut self, nogood: &Nogood<A>) {
        let mut lits = Vec::with_capacity(nogood.partial_assignment.len());

        for (atom, value) in &nogood.partial_assignment {
            match (self.sat_state.lookup(atom), value) {
                (Some(lit), true) => lits.push(lit),
                (Some(lit), false) => lits.push(!lit),
                // The atom is false, so the nogood can never apply.
                (None, true) => return,
                (None, false) => {}
            }
        }

        gadgets::add_nogood(self.sat_state.solver(), &lits);
    }

    /// Returns the number of models produced so far.
    #[must_use]
    pub fn models(&self) -> usize {
        self.models
    }
}

#[cfg(test)]
fn choice(atoms: &[&'static str]) -> ProgramRule<&'static str> {
    ProgramRule {
        head: Head::Choice(atoms.to_vec()),
        body: Vec::new(),
    }
}

#[test]
fn test_completion() {
    let _ = env_logger::builder().is_test(true).try_init();

    // {a; b}.  c :- a, not b.  :- b.
    let mut program = GroundProgram::new();
    program.add_rule(choice(&["a", "b"]));
    program.add_rule(ProgramRule {
        head: Head::Atom("c"),
        body: vec![("a", true), ("b", false)],
    });
    program.add_rule(ProgramRule::constraint(vec![("b", true)]));

    let mut stream = program.solve();
    let mut models = Vec::new();
    while let Some(model) = stream.next_model() {
        models.push(model);
    }

    models.sort();
    let expected: Vec<BTreeSet<&str>> = vec![BTreeSet::new(), ["a", "c"].into_iter().collect()];
    assert_eq!(models, expected);
}

#[test]
fn test_unsupported_atoms_are_false() {
    // x :- y.  with no rule for y: the only model is empty.
    let mut program = GroundProgram::new();
    program.add_rule(ProgramRule {
        head: Head::Atom("x"),
        body: vec![("y", true)],
    });

    let mut stream = program.solve();
    assert_eq!(stream.next_model(), Some(BTreeSet::new()));
    assert_eq!(stream.next_model(), None);
}

#[test]
fn test_externals() {
    let mut program = GroundProgram::new();
    program.declare_external("e");
    program.add_rule(ProgramRule {
        head: Head::Atom("x"),
        body: vec![("e", true)],
    });

    assert_eq!(program.solve().next_model(), Some(BTreeSet::new()));

    assert!(program.assign_external(&"e", true));
    assert_eq!(
        program.solve().next_model(),
        Some(["e", "x"].into_iter().collect())
    );

    assert!(program.release_external(&"e"));
    assert!(!program.assign_external(&"e", true));
    assert_eq!(program.solve().next_model(), Some(BTreeSet::new()));
}

#[test]
fn test_rules_persist_across_streams() {
    let mut program = GroundProgram::new();
    program.add_rule(choice(&["a", "b"]));
    assert_eq!(program.solve().next_model().map(|_| ()), Some(()));

    // Stream nogoods don't persist...
    let mut stream = program.solve();
    stream.add_nogood(&Nogood::positive(vec!["a"]));
    stream.add_nogood(&Nogood::positive(vec!["b"]));
    let count = std::iter::from_fn(|| stream.next_model()).count();
    assert_eq!(count, 1);

    // ... but rules do.
    assert!(program.add_rule(ProgramRule::constraint(vec![("a", true)])));
    assert!(!program.add_rule(ProgramRule::constraint(vec![("a", true)])));
    let mut stream = program.solve();
    let count = std::iter::from_fn(|| stream.next_model()).count();
    assert_eq!(count, 2);
}

#[test]
fn test_nogood_over_unknown_atom() {
    let mut program = GroundProgram::new();
    program.add_rule(choice(&["a"]));

    let mut stream = program.solve();
    // `ghost` is always false: the first nogood never applies, and
    // the second reduces to `a`.
    stream.add_nogood(&Nogood::new(vec![("a", true), ("ghost", true)]));
    stream.add_nogood(&Nogood::new(vec![("a", true), ("ghost", false)]));

    assert_eq!(stream.next_model(), Some(BTreeSet::new()));
    assert_eq!(stream.next_model(), None);
}

#[test]
fn test_preferences() {
    let mut program = GroundProgram::new();
    program.add_rule(choice(&["a", "b"]));
    program.prefer("b", 10, true);
    program.prefer("a", 5, false);

    let mut stream = program.solve();
    assert_eq!(stream.next_model(), Some(["b"].into_iter().collect()));
    assert_eq!(stream.models(), 1);
    assert_eq!(std::iter::from_fn(|| stream.next_model()).count(), 3);
}

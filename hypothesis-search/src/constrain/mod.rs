//! The constraint compiler turns classified rejections into ground
//! nogoods.
//!
//! Each rejection names a `ConstraintKind` and a witness program.  The
//! compiler builds one or more abstract constraint bodies over rule
//! slot placeholders (`R0`, `R1`, ...) and variable slot placeholders
//! (`R0_VA`, ...), asks the `Grounder` for every admissible binding,
//! and keeps the domain literals of each instantiation as a nogood.
//!
//! Witness rules are referenced by their handle once the solver knows
//! the matching `seen_rule` rules; until then, the compiler spells the
//! rule out and queues its `SeenRule` for the next flush.  Everything
//! queued is handed over by `drain`, exactly once.
mod builders;
mod seen;
mod unsat;

use crate::bias::Types;
use crate::ground::ground_body;
use crate::ground::Nogood;
use crate::grounder::Grounder;
use crate::logic::Handle;
use crate::logic::HandleCache;
use crate::logic::Literal;
use crate::logic::Program;
use crate::logic::Rule;
use crate::logic::RuleOrdering;
use crate::settings::Settings;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::fmt;

pub use seen::body_size_literal;
pub use seen::rule_literals;
pub use seen::seen_rule_literal;
pub use seen::SeenRule;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ConstraintKind {
    /// No specialisation of the witness (optionally, of at least
    /// `size` literals) may be proposed.
    Specialisation,
    /// No generalisation of the witness may be proposed.
    Generalisation,
    /// The witness is a single rule that can't be the only recursive
    /// clause for its head.
    Redundancy1,
    /// Predicates the witness never reaches recursively can't be
    /// defined the same way again.
    Redundancy2,
    /// Exactly the witness program may not be proposed again.
    Banish,
    /// The witness bodies are unsatisfiable on their own.
    Unsat,
    /// A recursive rule may not occupy two slots.
    TmpAndy,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConstraintKind::Specialisation => "SPECIALISATION",
            ConstraintKind::Generalisation => "GENERALISATION",
            ConstraintKind::Redundancy1 => "REDUNDANCY_CONSTRAINT1",
            ConstraintKind::Redundancy2 => "REDUNDANCY_CONSTRAINT2",
            ConstraintKind::Banish => "BANISH",
            ConstraintKind::Unsat => "UNSAT",
            ConstraintKind::TmpAndy => "TMP_ANDY",
        })
    }
}

/// An evaluator verdict on a candidate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rejection {
    pub kind: ConstraintKind,
    pub program: Program,
    pub ordering: Option<RuleOrdering>,
    pub size: Option<usize>,
}

impl Rejection {
    #[must_use]
    pub fn new(kind: ConstraintKind, program: Program) -> Self {
        Self {
            kind,
            program,
            ordering: None,
            size: None,
        }
    }

    /// An unsatisfiable body: a program of one headless rule.
    #[must_use]
    pub fn unsat(body: impl IntoIterator<Item = Literal>) -> Self {
        Self::new(ConstraintKind::Unsat, Program::new([Rule::new(None, body)]))
    }

    #[must_use]
    pub fn with_ordering(mut self, ordering: RuleOrdering) -> Self {
        self.ordering = Some(ordering);
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}

/// Work the compiler has queued for the solver's permanent program.
#[derive(Debug, Default)]
pub struct Pending {
    pub seen_rules: Vec<SeenRule>,
    pub bad_handles: BTreeSet<Handle>,
    pub nogoods: Vec<Nogood>,
}

impl Pending {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen_rules.is_empty() && self.bad_handles.is_empty() && self.nogoods.is_empty()
    }
}

pub struct Compiler {
    max_rules: usize,
    max_vars: usize,
    single_solve: bool,
    types: Types,
    grounder: Grounder,
    handles: HandleCache,
    // Handles whose `seen_rule` rules the solver already has.
    seen: BTreeSet<Handle>,
    pending: BTreeMap<Handle, SeenRule>,
    bad: BTreeSet<Handle>,
    pending_nogoods: Vec<Nogood>,
    emitted: HashSet<Nogood>,
}

impl Compiler {
    #[must_use]
    pub fn new(settings: &Settings, types: Types) -> Self {
        Self {
            max_rules: settings.max_rules,
            max_vars: settings.max_vars,
            single_solve: settings.single_solve,
            types,
            grounder: Grounder::new(),
            handles: HandleCache::new(),
            seen: BTreeSet::new(),
            pending: BTreeMap::new(),
            bad: BTreeSet::new(),
            pending_nogoods: Vec::new(),
            emitted: HashSet::new(),
        }
    }

    /// Compiles `rejections` and returns the nogoods no earlier call
    /// produced.  The same nogoods are queued for `drain`.
    pub fn compile(&mut self, rejections: &[Rejection]) -> Vec<Nogood> {
        let mut fresh = Vec::new();

        for rejection in rejections {
            log::debug!(
                "compiling {} over {} rules",
                rejection.kind,
                rejection.program.len()
            );
            log::trace!("witness:\n{}", rejection.program);

            let nogoods = match rejection.kind {
                ConstraintKind::Unsat => self.unsat_nogoods(&rejection.program),
                _ => {
                    let bodies = self.constraint_bodies(rejection);
                    bodies
                        .iter()
                        .flat_map(|body| self.instantiate(body))
                        .collect()
                }
            };

            for nogood in nogoods {
                if self.emitted.insert(nogood.clone()) {
                    fresh.push(nogood);
                }
            }
        }

        self.pending_nogoods.extend(fresh.iter().cloned());
        fresh
    }

    fn constraint_bodies(&mut self, rejection: &Rejection) -> Vec<Vec<Literal>> {
        let program = &rejection.program;
        let ordering = rejection.ordering.as_ref();
        match rejection.kind {
            ConstraintKind::Specialisation => {
                vec![self.specialisation(program, ordering, rejection.size)]
            }
            ConstraintKind::Generalisation => {
                vec![self.generalisation(program, ordering, rejection.size)]
            }
            ConstraintKind::Banish => vec![self.banish(program, ordering)],
            ConstraintKind::Redundancy1 => self.redundancy1(program).into_iter().collect(),
            ConstraintKind::Redundancy2 => self.redundancy2(program, ordering),
            ConstraintKind::TmpAndy => self.tmp_andy(program),
            ConstraintKind::Unsat => Vec::new(),
        }
    }

    fn instantiate(&mut self, body: &[Literal]) -> Vec<Nogood> {
        let assignments = self
            .grounder
            .find_bindings(body, self.max_rules, self.max_vars);
        assignments
            .iter()
            .map(|assignment| ground_body(body, assignment))
            .collect()
    }

    fn handle(&mut self, rule: &Rule) -> Handle {
        self.handles.handle(rule)
    }

    /// Queues `rule`'s seen rules unless they are flushed or already
    /// queued.
    fn queue_seen_rule(&mut self, handle: &Handle, rule: &Rule, recursive: bool) {
        if self.seen.contains(handle) || self.pending.contains_key(handle) {
            return;
        }

        self.pending.insert(
            handle.clone(),
            SeenRule::new(handle.clone(), rule.clone(), recursive),
        );
    }

    /// Hands every queued seen rule, bad handle and nogood over to the
    /// caller.  Drained handles count as seen from now on.
    pub fn drain(&mut self) -> Pending {
        let pending = std::mem::take(&mut self.pending);
        self.seen.extend(pending.keys().cloned());

        Pending {
            seen_rules: pending.into_values().collect(),
            bad_handles: std::mem::take(&mut self.bad),
            nogoods: std::mem::take(&mut self.pending_nogoods),
        }
    }

    /// Handles whose seen rules have been drained.
    #[must_use]
    pub fn seen_handles(&self) -> &BTreeSet<Handle> {
        &self.seen
    }

    /// Handles that are seen or queued.
    #[must_use]
    pub fn known_handles(&self) -> BTreeSet<Handle> {
        self.seen.iter().chain(self.pending.keys()).cloned().collect()
    }

    /// Number of distinct nogoods produced so far.
    #[must_use]
    pub fn emitted_nogoods(&self) -> usize {
        self.emitted.len()
    }

    #[must_use]
    pub fn grounder(&self) -> &Grounder {
        &self.grounder
    }
}

#[cfg(test)]
use crate::logic::Atom;
#[cfg(test)]
use itertools::Itertools;
#[cfg(test)]
use crate::logic::Var;

#[cfg(test)]
fn atom(predicate: &str, vars: &[&str]) -> Atom {
    Atom::with_vars(
        predicate,
        vars.iter()
            .map(|name| Var::from_name(name).expect("valid variable name")),
    )
}

#[cfg(test)]
fn small_settings() -> Settings {
    Settings {
        max_rules: 2,
        max_vars: 3,
        max_body: 1,
        max_literals: 4,
        ..Settings::default()
    }
}

#[cfg(test)]
fn render(nogood: &Nogood) -> Vec<String> {
    nogood.iter().map(ToString::to_string).collect()
}

#[test]
fn test_banish_nogood() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut compiler = Compiler::new(&small_settings(), Types::default());
    let program = Program::new([Rule::from_atoms(
        atom("head", &["A", "B"]),
        [atom("body", &["A", "B"])],
    )]);

    let nogoods = compiler.compile(&[Rejection::new(ConstraintKind::Banish, program)]);
    assert_eq!(nogoods.len(), 1);
    pretty_assertions::assert_eq!(
        render(&nogoods[0]),
        vec![
            "body_literal(0,body,2,(0,1))",
            "body_size(0,1)",
            "not clause(1)",
            "head_literal(0,head,2,(0,1))",
        ]
    );

    let pending = compiler.drain();
    assert_eq!(pending.seen_rules.len(), 1);
    assert_eq!(pending.nogoods, nogoods);
    assert!(pending.bad_handles.is_empty());
    assert!(compiler.drain().is_empty());
}

#[test]
fn test_seen_rule_idempotence() {
    let mut compiler = Compiler::new(&small_settings(), Types::default());
    let program = Program::new([Rule::from_atoms(
        atom("head", &["A", "B"]),
        [atom("body", &["A", "C"])],
    )]);
    let rejection = Rejection::new(ConstraintKind::Specialisation, program).with_size(2);

    let first = compiler.compile(&[rejection.clone()]);
    assert!(!first.is_empty());
    assert_eq!(compiler.known_handles().len(), 1);

    let second = compiler.compile(&[rejection.clone(), rejection.clone()]);
    assert!(second.is_empty());
    assert_eq!(compiler.known_handles().len(), 1);
    assert_eq!(compiler.emitted_nogoods(), first.len());

    // Once flushed, the rule is referenced through its handle.
    let pending = compiler.drain();
    assert_eq!(pending.seen_rules.len(), 1);
    assert_eq!(compiler.seen_handles().len(), 1);

    let third = compiler.compile(&[rejection]);
    assert!(!third.is_empty());
    assert!(third.iter().all(|nogood| nogood
        .iter()
        .any(|literal| &*literal.atom.predicate == "seen_rule")));
    assert_eq!(compiler.known_handles().len(), 1);
    assert!(compiler.drain().seen_rules.is_empty());
}

#[test]
fn test_unsat_type_clash_has_no_nogood() {
    let mut types = Types::default();
    types.body.insert("p".into(), vec!["node".into()]);
    types.body.insert("q".into(), vec!["colour".into()]);
    let settings = Settings {
        max_vars: 2,
        ..small_settings()
    };

    let mut compiler = Compiler::new(&settings, types);
    let rejection = Rejection::unsat([
        Literal::pos(atom("p", &["A"])),
        Literal::pos(atom("q", &["A"])),
    ]);
    assert!(compiler.compile(&[rejection]).is_empty());

    // An untyped body is forbidden in every slot, at every placement.
    let mut untyped = Compiler::new(&settings, Types::default());
    let rejection = Rejection::unsat([
        Literal::pos(atom("p", &["A"])),
        Literal::pos(atom("q", &["A"])),
    ]);
    let nogoods = untyped.compile(&[rejection]);
    assert_eq!(nogoods.len(), 2 * 2);
    assert!(untyped.known_handles().is_empty());
}

#[test]
fn test_redundancy1_marks_bad_handle() {
    let mut compiler = Compiler::new(&small_settings(), Types::default());
    let rule = Rule::from_atoms(atom("f", &["A"]), [atom("f", &["B"]), atom("g", &["A", "B"])]);
    let rejection = Rejection::new(ConstraintKind::Redundancy1, Program::new([rule.clone()]));

    let nogoods = compiler.compile(&[rejection]);
    assert!(!nogoods.is_empty());
    assert!(nogoods.iter().all(|nogood| nogood
        .iter()
        .any(|literal| literal.to_string() == "num_recursive(f,1)")));

    let pending = compiler.drain();
    assert_eq!(
        pending.bad_handles.into_iter().collect::<Vec<_>>(),
        vec![Handle::of(&rule)]
    );
    // Queued as non-recursive: slot 0 is covered too.
    assert!(!pending.seen_rules[0].recursive);
}

#[test]
fn test_tmp_andy_needs_flushed_handle() {
    let settings = Settings {
        max_rules: 3,
        ..small_settings()
    };
    let mut compiler = Compiler::new(&settings, Types::default());
    let rule = Rule::from_atoms(atom("f", &["A"]), [atom("f", &["B"]), atom("g", &["A", "B"])]);
    let program = Program::new([rule]);

    let rejection = Rejection::new(ConstraintKind::TmpAndy, program.clone());
    assert!(compiler.compile(&[rejection.clone()]).is_empty());

    let _ = compiler.compile(&[Rejection::new(ConstraintKind::Banish, program)]);
    let _ = compiler.drain();

    // R1 = 1 < R2 = 2 is the only admissible pair.
    let nogoods = compiler.compile(&[rejection]);
    assert_eq!(nogoods.len(), 1);
    assert!(render(&nogoods[0]).contains(&"body_size(1,2)".to_string()));
}

#[test]
fn test_recursive_ordering_by_body_size() {
    let settings = Settings {
        max_rules: 3,
        max_vars: 3,
        max_body: 2,
        ..small_settings()
    };
    let short = Rule::from_atoms(atom("f", &["A"]), [atom("f", &["A"])]);
    let long = Rule::from_atoms(atom("f", &["A"]), [atom("f", &["B"]), atom("g", &["A", "B"])]);
    let program = Program::new([short.clone(), long.clone()]);

    // Recursive rules stay out of slot 0, shorter bodies first.
    let mut compiler = Compiler::new(&settings, Types::default());
    let nogoods = compiler.compile(&[Rejection::new(
        ConstraintKind::Generalisation,
        program.clone(),
    )]);
    assert_eq!(nogoods.len(), 2);
    for nogood in &nogoods {
        let rendered = render(nogood);
        assert!(rendered.contains(&"body_size(1,1)".to_string()));
        assert!(rendered.contains(&"body_size(2,2)".to_string()));
    }

    // An explicit ordering overrides body sizes.
    let mut explicit = RuleOrdering::new();
    explicit.insert(long, [short].into_iter().collect());
    let mut compiler = Compiler::new(&settings, Types::default());
    let nogoods = compiler.compile(&[
        Rejection::new(ConstraintKind::Generalisation, program).with_ordering(explicit)
    ]);
    assert_eq!(nogoods.len(), 2);
    for nogood in &nogoods {
        let rendered = render(nogood);
        assert!(rendered.contains(&"body_size(2,1)".to_string()));
        assert!(rendered.contains(&"body_size(1,2)".to_string()));
    }
}

#[test]
fn test_redundancy2_nogoods() {
    let mut compiler = Compiler::new(&small_settings(), Types::default());
    let base = Rule::from_atoms(atom("f", &["A"]), [atom("p", &["A"])]);
    let step = Rule::from_atoms(atom("f", &["A"]), [atom("f", &["B"]), atom("e", &["A", "B"])]);
    let program = Program::new([base.clone(), step.clone()]);

    // Nothing calls `f` from a recursive rule for another head, so `f`
    // gets one body: the base clause in slot 0, the recursive one in
    // slot 1 with `B` in either free variable slot.
    let rejection = Rejection::new(ConstraintKind::Redundancy2, program.clone());
    let nogoods = compiler.compile(&[rejection]);
    let mut rendered: Vec<Vec<String>> = nogoods
        .iter()
        .map(|nogood| render(nogood).into_iter().sorted().collect())
        .collect();
    rendered.sort();
    let expected: Vec<Vec<String>> = [1, 2]
        .into_iter()
        .map(|b| {
            vec![
                "body_literal(0,p,1,(0,))".to_string(),
                format!("body_literal(1,e,2,(0,{}))", b),
                format!("body_literal(1,f,1,({},))", b),
                "head_literal(0,f,1,(0,))".to_string(),
                "head_literal(1,f,1,(0,))".to_string(),
                "num_recursive(f,1)".to_string(),
            ]
            .into_iter()
            .sorted()
            .collect()
        })
        .collect();
    pretty_assertions::assert_eq!(rendered, expected);

    // Both rules are queued for their seen rules; no handle turns bad.
    let pending = compiler.drain();
    assert_eq!(pending.seen_rules.len(), 2);
    assert!(pending.bad_handles.is_empty());

    // Once flushed, the rules are referenced by handle.
    let mut ordering = RuleOrdering::new();
    ordering.insert(base.clone(), [step.clone()].into_iter().collect());
    let rejection =
        Rejection::new(ConstraintKind::Redundancy2, program.clone()).with_ordering(ordering);
    let nogoods = compiler.compile(&[rejection]);
    assert_eq!(nogoods.len(), 1);
    let rendered = render(&nogoods[0]);
    assert!(rendered.contains(&format!("seen_rule({:?},0)", Handle::of(&base).as_str())));
    assert!(rendered.contains(&format!("seen_rule({:?},1)", Handle::of(&step).as_str())));

    // An ordering that puts the recursive rule first can't be met.
    let mut reversed = RuleOrdering::new();
    reversed.insert(step, [base].into_iter().collect());
    let rejection = Rejection::new(ConstraintKind::Redundancy2, program).with_ordering(reversed);
    assert!(compiler.compile(&[rejection]).is_empty());
}

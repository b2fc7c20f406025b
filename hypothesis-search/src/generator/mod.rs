//! The search session: proposes candidate programs and folds the
//! evaluator's rejections back into the solver.
//!
//! A `Generator` owns the backend, the constraint compiler (and with
//! it every cache) and the size windows.  Candidates come out of the
//! current model stream; rejections become nogoods that are injected
//! into that stream immediately, and added to the permanent program
//! (with any new `seen_rule` and bad-handle rules) at the next
//! `update_solver`.
mod parse_model;
mod window;

use crate::backend::AspBackend;
use crate::bias::Bias;
use crate::bias::Directions;
use crate::constrain::Compiler;
use crate::constrain::Rejection;
use crate::error::Result;
use crate::ground::GroundAtom;
use crate::ground::GroundLiteral;
use crate::ground::GroundRule;
use crate::ground::Value;
use crate::logic::Handle;
use crate::logic::Program;
use crate::logic::RuleOrdering;
use crate::settings::Settings;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::collections::HashMap;

pub use window::Dimension;

/// A proposed program, with the clause ordering and argument
/// directions its model carried.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Candidate {
    pub program: Program,
    pub ordering: RuleOrdering,
    pub directions: Directions,
}

fn heuristic(atom: GroundAtom, weight: i64) -> String {
    format!("#heuristic {}. [{},true]", atom, weight)
}

/// Every (size, variables, rules) configuration a program can have
/// under `settings`, smallest size first, then fewest variables, then
/// fewest rules.
fn space_order(settings: &Settings) -> Vec<(i64, i64, i64)> {
    let bound = settings.literal_bound() as i64;
    let max_body = settings.max_body as i64;
    let max_vars = settings.max_vars as i64;

    (1..=settings.max_rules as i64)
        .flat_map(|rules| {
            (2 * rules..=bound.min(rules * (1 + max_body))).flat_map(move |size| {
                (1..=max_vars).map(move |vars| (size, vars, rules))
            })
        })
        .sorted()
        .collect()
}

/// `h_order/4` facts numbering the configurations, and `hspace(I)`
/// with a preference for low `I`.
fn order_space_heuristics(settings: &Settings) -> Vec<String> {
    let mut text = Vec::new();
    for (i, (size, vars, rules)) in space_order(settings).into_iter().enumerate() {
        let index = i as i64 + 1;
        let order = GroundAtom::ints("h_order", [index, size, vars, rules]);
        text.push(format!("{}.", order));

        let hspace = GroundAtom::ints("hspace", [index]);
        let rule = GroundRule::new(
            Some(hspace.clone()),
            [
                GroundLiteral::pos(order),
                GroundLiteral::pos(GroundAtom::ints("size", [size])),
                GroundLiteral::pos(GroundAtom::ints("num_vars", [vars])),
                GroundLiteral::pos(GroundAtom::ints("num_rules", [rules])),
            ],
        );
        text.push(rule.to_string());
        text.push(heuristic(hspace, 1000 - index));
    }

    text
}

/// Assembles the `base` fragment: the caller's encoding, the size
/// bounds as facts, mode-dependent directives, and the background
/// constraints when `settings.bkcons` is set.
fn base_program(settings: &Settings, encoding: &str, background: &[String]) -> String {
    let max_size = settings.max_size() as i64;
    let mut text = vec![
        encoding.to_string(),
        format!("max_clauses({}).", settings.max_rules),
        format!("max_body({}).", settings.max_body),
        format!("max_vars({}).", settings.max_vars),
    ];

    if (settings.max_literals as i64) < max_size {
        text.push(format!("custom_max_size({}).", settings.max_literals));
    }

    if settings.pi_enabled {
        text.push("#show direction_/3.".to_string());
        text.push("#show before/2.".to_string());
    }

    if settings.pi_enabled || settings.recursion_enabled {
        text.push("#show head_literal/4.".to_string());
    }

    if settings.noisy {
        for at_least in 0..=max_size {
            for size in at_least..=max_size {
                let rule = GroundRule::new(
                    Some(GroundAtom::ints("program_size_at_least", [at_least])),
                    [GroundLiteral::pos(GroundAtom::ints("size", [size]))],
                );
                text.push(rule.to_string());
            }
        }
    }

    if settings.bkcons {
        text.extend(background.iter().cloned());
    }

    // Smallest programs first; without a bias, fewest rules first,
    // then fewest literals, then fewest variables.
    if settings.single_solve {
        if settings.order_space {
            text.extend(order_space_heuristics(settings));
        } else {
            if settings.no_bias {
                for rules in 1..=settings.max_rules as i64 {
                    text.push(heuristic(GroundAtom::ints("num_rules", [rules]), 1500 - rules));
                }
            }
            for size in 0..=max_size {
                text.push(heuristic(GroundAtom::ints("size", [size]), 1000 - size));
            }
            if settings.no_bias {
                for vars in 1..=settings.max_vars as i64 {
                    text.push(heuristic(GroundAtom::ints("num_vars", [vars]), 500 - vars));
                }
            }
        }
    }

    text.join("\n")
}

fn seen_rule_atom(handle: &Handle, slot: i64) -> GroundAtom {
    GroundAtom::new(
        "seen_rule",
        [Value::Str(handle.as_str().into()), Value::Int(slot)],
    )
}

/// Rules that forbid reusing a bad rule shape alongside anything
/// proven bad at `size` or below.
fn bad_handle_rules(handle: &Handle, size: i64, max_rules: i64) -> Vec<GroundRule> {
    let mut rules = Vec::new();
    for slot in 0..max_rules {
        rules.push(GroundRule::new(
            Some(GroundAtom::ints("bad_stuff", [slot, size])),
            [GroundLiteral::pos(seen_rule_atom(handle, slot))],
        ));
    }

    for smaller in 1..=size {
        for r1 in 1..max_rules {
            for r2 in (1..max_rules).filter(|r2| *r2 != r1) {
                rules.push(GroundRule::new(
                    None,
                    [
                        GroundLiteral::pos(seen_rule_atom(handle, r1)),
                        GroundLiteral::pos(GroundAtom::ints("bad_stuff", [r2, smaller])),
                    ],
                ));
            }
        }
    }

    rules
}

pub struct Generator<B: AspBackend> {
    settings: Settings,
    bias: Bias,
    backend: B,
    compiler: Compiler,
    windows: window::Windows,
    // Backend atoms for every ground atom flushed so far.
    atoms: HashMap<GroundAtom, B::Atom>,
}

impl<B: AspBackend> Generator<B> {
    /// Loads `encoding` (the hypothesis space for `bias`) into
    /// `backend`, with the size bounds from `settings`, and grounds
    /// it.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the backend rejects the program text.
    pub fn new(settings: Settings, bias: Bias, encoding: &str, backend: B) -> Result<Self> {
        Self::with_background(settings, bias, encoding, &[], backend)
    }

    /// Like `new`, with ground background constraints that join the
    /// base program when `settings.bkcons` is set.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the backend rejects the program text.
    pub fn with_background(
        settings: Settings,
        bias: Bias,
        encoding: &str,
        background: &[String],
        mut backend: B,
    ) -> Result<Self> {
        if !settings.single_solve {
            Dimension::Literals.register(&mut backend)?;
            if settings.no_bias {
                Dimension::Vars.register(&mut backend)?;
                Dimension::Rules.register(&mut backend)?;
            }
        }

        backend.add("base", &[], &base_program(&settings, encoding, background))?;
        backend.ground("base", &[])?;

        log::debug!(
            "generator for {}/{}: max_rules={} max_vars={} max_body={} max_literals={}",
            bias.head_predicate(),
            bias.head_arity(),
            settings.max_rules,
            settings.max_vars,
            settings.max_body,
            settings.max_literals
        );

        let compiler = Compiler::new(&settings, bias.types.clone());
        Ok(Self {
            settings,
            bias,
            backend,
            compiler,
            windows: Default::default(),
            atoms: HashMap::new(),
        })
    }

    /// Returns the next candidate in the current window, or `None`
    /// once the window is exhausted.
    pub fn get_model(&mut self) -> Option<Candidate> {
        let model = self.backend.next_model()?;
        let candidate = parse_model::parse_model(&self.settings, &self.bias, &model);
        log::trace!("candidate:\n{}", candidate.program);
        Some(candidate)
    }

    /// Compiles `rejections` and forbids the resulting nogoods in the
    /// current stream.  Returns the number of new nogoods.
    pub fn constrain(&mut self, rejections: &[Rejection]) -> usize {
        let nogoods = self.compiler.compile(rejections);
        for nogood in &nogoods {
            self.backend.add_nogood(nogood);
        }

        nogoods.len()
    }

    fn intern(&mut self, atom: &GroundAtom) -> B::Atom {
        if let Some(ret) = self.atoms.get(atom) {
            return *ret;
        }

        let ret = self.backend.add_atom(atom);
        self.atoms.insert(atom.clone(), ret);
        ret
    }

    fn add_rule(&mut self, rule: &GroundRule) {
        let head = rule.head.as_ref().map(|atom| self.intern(atom));
        let body: Vec<(B::Atom, bool)> = rule
            .body
            .iter()
            .map(|literal| (self.intern(&literal.atom), literal.positive))
            .collect();
        self.backend.add_rule(head, &body);
    }

    /// Moves the size windows, flushes everything the compiler queued
    /// into the permanent program, and restarts the model stream.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the backend fails to ground a window.
    pub fn update_solver(&mut self, size: usize, num_vars: usize, num_rules: usize) -> Result<()> {
        log::debug!(
            "update_solver: size={} vars={} rules={}",
            size,
            num_vars,
            num_rules
        );

        if !self.settings.single_solve {
            self.windows
                .update(&mut self.backend, Dimension::Literals, size as i64)?;
            if self.settings.no_bias {
                self.windows
                    .update(&mut self.backend, Dimension::Vars, num_vars as i64)?;
                self.windows
                    .update(&mut self.backend, Dimension::Rules, num_rules as i64)?;
            }
        }

        let pending = self.compiler.drain();
        for nogood in &pending.nogoods {
            self.add_rule(&GroundRule::constraint(nogood));
        }

        let (max_rules, max_vars) = (self.settings.max_rules, self.settings.max_vars);
        let mut seen_rules = 0;
        for seen in &pending.seen_rules {
            for rule in seen.ground_rules(max_rules, max_vars) {
                self.add_rule(&rule);
                seen_rules += 1;
            }
        }

        let mut bad_rules = 0;
        if !self.settings.no_bias {
            for handle in &pending.bad_handles {
                for rule in bad_handle_rules(handle, size as i64, max_rules as i64) {
                    self.add_rule(&rule);
                    bad_rules += 1;
                }
            }
        }

        log::debug!(
            "flushed {} nogoods, {} seen rules for {} handles, {} bad-handle rules",
            pending.nogoods.len(),
            seen_rules,
            pending.seen_rules.len(),
            bad_rules
        );

        self.backend.solve();
        Ok(())
    }

    /// Handles whose seen rules are in the permanent program.
    #[must_use]
    pub fn seen_handles(&self) -> &BTreeSet<Handle> {
        self.compiler.seen_handles()
    }

    /// Handles that are flushed or waiting for the next update.
    #[must_use]
    pub fn known_handles(&self) -> BTreeSet<Handle> {
        self.compiler.known_handles()
    }

    /// The value `dimension`'s window is set to, if any.
    #[must_use]
    pub fn window(&self, dimension: Dimension) -> Option<i64> {
        self.windows.get(dimension)
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn bias(&self) -> &Bias {
        &self.bias
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }
}

#[cfg(test)]
use crate::backend::SatBackend;
#[cfg(test)]
use crate::constrain::ConstraintKind;
#[cfg(test)]
use crate::logic::Atom;
#[cfg(test)]
use crate::logic::Rule;
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
fn generator(settings: Settings, bias: Bias) -> Generator<SatBackend> {
    let encoding = crate::space::render(&settings, &bias);
    Generator::new(settings, bias, &encoding, SatBackend::new()).expect("ok")
}

#[cfg(test)]
fn program_size(program: &Program) -> usize {
    program.iter().map(|rule| 1 + rule.body.len()).sum()
}

#[test]
fn test_base_program() {
    let settings = Settings {
        max_rules: 1,
        max_body: 1,
        max_literals: 1,
        single_solve: true,
        noisy: true,
        recursion_enabled: true,
        ..Settings::default()
    };

    let text = base_program(&settings, "% space", &[]);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "% space",
            "max_clauses(1).",
            "max_body(1).",
            "max_vars(6).",
            "custom_max_size(1).",
            "#show head_literal/4.",
            "program_size_at_least(0) :- size(0).",
            "program_size_at_least(0) :- size(1).",
            "program_size_at_least(0) :- size(2).",
            "program_size_at_least(1) :- size(1).",
            "program_size_at_least(1) :- size(2).",
            "program_size_at_least(2) :- size(2).",
            "#heuristic size(0). [1000,true]",
            "#heuristic size(1). [999,true]",
            "#heuristic size(2). [998,true]",
        ]
    );
}

#[test]
fn test_background_and_space_order() {
    let settings = Settings {
        max_rules: 1,
        max_vars: 1,
        max_body: 1,
        single_solve: true,
        order_space: true,
        ..Settings::default()
    };
    let background = vec![":- body_literal(0,p,1,(0,)).".to_string()];

    // Background constraints only join when asked for.
    let text = base_program(&settings, "% space", &background);
    assert!(!text.contains("body_literal"));

    let settings = Settings {
        bkcons: true,
        ..settings
    };
    let text = base_program(&settings, "% space", &background);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "% space",
            "max_clauses(1).",
            "max_body(1).",
            "max_vars(1).",
            ":- body_literal(0,p,1,(0,)).",
            "h_order(1,2,1,1).",
            "hspace(1) :- h_order(1,2,1,1), num_rules(1), num_vars(1), size(2).",
            "#heuristic hspace(1). [999,true]",
        ]
    );

    let wider = Settings {
        max_rules: 2,
        max_vars: 2,
        ..settings
    };
    assert_eq!(
        space_order(&wider),
        vec![(2, 1, 1), (2, 2, 1), (4, 1, 2), (4, 2, 2)]
    );
}

#[test]
fn test_bad_handle_rules() {
    let rule = Rule::from_atoms(atom("f", &["A"]), [atom("p", &["A"])]);
    let handle = Handle::of(&rule);

    // One `bad_stuff` rule per slot, and one constraint per size and
    // ordered pair of distinct slots past 0.
    assert_eq!(bad_handle_rules(&handle, 2, 3).len(), 3 + 2 * 2);
    assert_eq!(bad_handle_rules(&handle, 2, 2).len(), 2);
    assert_eq!(
        bad_handle_rules(&handle, 1, 1)[0].to_string(),
        format!("bad_stuff(0,1) :- seen_rule({:?},0).", handle.as_str())
    );
}

#[test]
fn test_windows_are_exclusive() {
    let _ = env_logger::builder().is_test(true).try_init();

    let settings = Settings {
        max_rules: 2,
        max_vars: 3,
        max_body: 1,
        ..Settings::default()
    };
    let mut session = generator(settings, Bias::new("head", 2).with_body("body", 2));

    // Without a window, every program in the space.
    assert_eq!(std::iter::from_fn(|| session.get_model()).count(), 4);

    for size in [2, 4, 2, 3] {
        session.update_solver(size, 3, 2).expect("ok");
        assert_eq!(session.window(Dimension::Literals), Some(size as i64));
        assert_eq!(session.window(Dimension::Vars), None);

        let sizes: Vec<usize> = std::iter::from_fn(|| session.get_model())
            .map(|candidate| program_size(&candidate.program))
            .collect();
        assert!(sizes.iter().all(|x| *x == size));
        assert_eq!(sizes.len(), if size == 3 { 0 } else { 2 });
    }
}

#[test]
fn test_no_bias_windows() {
    let settings = Settings {
        max_rules: 2,
        max_vars: 3,
        max_body: 1,
        no_bias: true,
        ..Settings::default()
    };
    let mut session = generator(settings, Bias::new("head", 2).with_body("body", 2));

    // Two rules don't fit a one-rule window.
    session.update_solver(4, 2, 1).expect("ok");
    assert_eq!(session.window(Dimension::Rules), Some(1));
    assert_eq!(std::iter::from_fn(|| session.get_model()).count(), 0);

    session.update_solver(4, 2, 2).expect("ok");
    assert_eq!(std::iter::from_fn(|| session.get_model()).count(), 2);

    // Only variables A and B are ever used.
    session.update_solver(2, 3, 1).expect("ok");
    assert_eq!(std::iter::from_fn(|| session.get_model()).count(), 0);
}

#[test]
fn test_single_solve_prefers_small_programs() {
    let settings = Settings {
        max_rules: 2,
        max_vars: 2,
        max_body: 2,
        single_solve: true,
        ..Settings::default()
    };
    let bias = Bias::new("f", 1).with_body("p", 1).with_body("q", 1);
    let mut session = generator(settings, bias);

    let first = session.get_model().expect("a candidate");
    assert_eq!(program_size(&first.program), 2);
    assert_eq!(session.window(Dimension::Literals), None);
}

#[test]
fn test_bad_handles_flush_unless_no_bias() {
    let rule = Rule::from_atoms(atom("f", &["A", "B"]), [atom("f", &["B", "A"])]);
    let witness = Program::new([rule]);

    let mut added = Vec::new();
    for no_bias in [false, true] {
        let settings = Settings {
            max_rules: 3,
            max_vars: 3,
            max_body: 1,
            recursion_enabled: true,
            no_bias,
            ..Settings::default()
        };
        let mut session = generator(settings, Bias::new("f", 2).with_body("p", 2));
        session.update_solver(2, 3, 3).expect("ok");
        let before = session.backend().rules();

        let nogoods = session.constrain(&[Rejection::new(
            ConstraintKind::Redundancy1,
            witness.clone(),
        )]);
        assert!(nogoods > 0);
        assert_eq!(session.seen_handles().len(), 0);
        assert_eq!(session.known_handles().len(), 1);

        session.update_solver(2, 3, 3).expect("ok");
        assert_eq!(session.seen_handles().len(), 1);
        assert_eq!(session.known_handles(), session.seen_handles().clone());
        added.push(session.backend().rules() - before);
    }

    // Nogoods and seen rules either way; the bad-handle rules only
    // with a bias.
    assert_eq!(added[0], added[1] + 3 + 2 * 2);
}

#[cfg(test)]
fn candidates(session: &mut Generator<SatBackend>) -> Vec<String> {
    let mut ret: Vec<String> = std::iter::from_fn(|| session.get_model())
        .map(|candidate| candidate.program.to_string())
        .collect();
    ret.sort();
    ret
}

#[cfg(test)]
fn edge_generator() -> Generator<SatBackend> {
    let settings = Settings {
        max_rules: 2,
        max_vars: 3,
        max_body: 1,
        ..Settings::default()
    };
    generator(settings, Bias::new("head", 2).with_body("body", 2))
}

#[cfg(test)]
fn edge_target() -> Program {
    Program::new([Rule::from_atoms(
        atom("head", &["A", "B"]),
        [atom("body", &["A", "B"])],
    )])
}

#[test]
fn test_banish() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut session = edge_generator();
    session.update_solver(2, 3, 2).expect("ok");

    // The nogood applies to the live stream right away...
    let banish = Rejection::new(ConstraintKind::Banish, edge_target());
    assert_eq!(session.constrain(&[banish.clone()]), 1);
    assert_eq!(candidates(&mut session), vec!["head(A,B):- body(B,A)."]);

    // ... and only once.
    assert_eq!(session.constrain(&[banish]), 0);

    session.update_solver(2, 3, 2).expect("ok");
    assert_eq!(candidates(&mut session), vec!["head(A,B):- body(B,A)."]);

    // Programs that merely contain the witness survive.
    session.update_solver(4, 3, 2).expect("ok");
    assert_eq!(candidates(&mut session).len(), 2);
}

#[test]
fn test_generalisation() {
    let mut session = edge_generator();
    session.update_solver(2, 3, 2).expect("ok");
    assert_eq!(candidates(&mut session).len(), 2);

    let nogoods = session.constrain(&[Rejection::new(
        ConstraintKind::Generalisation,
        edge_target(),
    )]);
    assert_eq!(nogoods, 2);

    session.update_solver(2, 3, 2).expect("ok");
    assert_eq!(candidates(&mut session), vec!["head(A,B):- body(B,A)."]);

    // Every two-rule program has the witness in some slot.
    session.update_solver(4, 3, 2).expect("ok");
    assert!(candidates(&mut session).is_empty());
}

#[test]
fn test_unsat_body() {
    let mut session = edge_generator();
    let body = crate::logic::Literal::pos(atom("body", &["A", "B"]));

    // Two slots, and three choose two ordered variable pairs.
    assert_eq!(session.constrain(&[Rejection::unsat([body])]), 2 * 6);
    for size in [2, 4] {
        session.update_solver(size, 3, 2).expect("ok");
        assert!(candidates(&mut session).is_empty());
    }
}

#[test]
fn test_background_constraints_prune() {
    let settings = Settings {
        max_rules: 2,
        max_vars: 3,
        max_body: 1,
        bkcons: true,
        ..Settings::default()
    };
    let bias = Bias::new("head", 2).with_body("body", 2);
    let encoding = crate::space::render(&settings, &bias);
    let background = vec![":- body_literal(0,body,2,(0,1)).".to_string()];
    let mut session =
        Generator::with_background(settings, bias, &encoding, &background, SatBackend::new())
            .expect("ok");

    session.update_solver(2, 3, 2).expect("ok");
    assert_eq!(candidates(&mut session), vec!["head(A,B):- body(B,A)."]);

    // Only the slot order with `body(B,A)` first is left.
    session.update_solver(4, 3, 2).expect("ok");
    assert_eq!(candidates(&mut session).len(), 1);
}

#[test]
fn test_order_space_starts_small() {
    let settings = Settings {
        max_rules: 2,
        max_vars: 2,
        max_body: 2,
        single_solve: true,
        order_space: true,
        ..Settings::default()
    };
    let bias = Bias::new("f", 1).with_body("p", 1).with_body("q", 1);
    let mut session = generator(settings, bias);

    let first = session.get_model().expect("a candidate");
    assert_eq!(first.program.len(), 1);
    assert_eq!(program_size(&first.program), 2);
}

#[test]
fn test_specialisation() {
    let _ = env_logger::builder().is_test(true).try_init();

    let settings = Settings {
        max_rules: 2,
        max_vars: 3,
        max_body: 2,
        ..Settings::default()
    };
    let mut session = generator(settings, Bias::new("head", 2).with_body("body", 2));
    let every_size = |session: &mut Generator<SatBackend>| {
        let mut ret = Vec::new();
        for size in 2..=6 {
            session.update_solver(size, 3, 2).expect("ok");
            ret.extend(candidates(session));
        }
        ret.sort();
        ret
    };

    let before = every_size(&mut session);
    let is_specialisation =
        |program: &str| program.lines().count() == 1 && program.contains("body(A,B)");
    assert!(before
        .iter()
        .any(|program| is_specialisation(program) && program.matches("body(").count() == 2));

    let nogoods = session.constrain(&[Rejection::new(
        ConstraintKind::Specialisation,
        edge_target(),
    )]);
    assert_eq!(nogoods, 1);

    // The witness and every single rule extending it are gone; larger
    // programs that contain it are not.
    let after = every_size(&mut session);
    let expected: Vec<String> = before
        .iter()
        .filter(|program| !is_specialisation(program.as_str()))
        .cloned()
        .collect();
    pretty_assertions::assert_eq!(after, expected);
    assert!(after
        .iter()
        .any(|program| program.lines().count() == 2 && program.contains("body(A,B)")));
}

//! Renders the ground hypothesis space for a bias: every program of
//! at most `max_rules` clauses for the bias head, each with between 1
//! and `max_body` body literals over at most `max_vars` variables.
//!
//! The text is fully ground and tight, so any backend that reads
//! ground programs can load it.  The predicates it defines are the
//! vocabulary that the constraint compiler and the search session
//! speak:
//!
//! * `clause(R)`: slot `R` holds a clause; slots are contiguous.
//! * `head_literal(R, P, A, Vars)` and `body_literal(R, P, A, Vars)`.
//! * `body_size(R, K)`, `size(N)`, `num_vars(V)`, `num_rules(N)`,
//!   `num_clauses(P, N)`, `recursive_clause(R, P, A)` and
//!   `num_recursive(P, N)`.
//! * `direction_(P, I, D)` and `before(R1, R2)` with predicate
//!   invention.
//!
//! Two clauses of one program always differ in their bodies.
use crate::bias::Bias;
use crate::bias::Direction;
use crate::bias::Type;
use crate::ground::GroundAtom;
use crate::ground::GroundLiteral;
use crate::ground::GroundRule;
use crate::ground::Value;
use crate::settings::Settings;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// A candidate body literal: predicate, arity and variable tuple.
type Candidate = (Value, usize, Vec<i64>);

struct Writer {
    out: String,
}

impl Writer {
    fn rule(&mut self, head: Option<GroundAtom>, body: impl IntoIterator<Item = GroundLiteral>) {
        self.out.push_str(&GroundRule::new(head, body).to_string());
        self.out.push('\n');
    }

    fn fact(&mut self, head: GroundAtom) {
        self.rule(Some(head), []);
    }

    fn choice(&mut self, atoms: &[GroundAtom], body: Option<GroundAtom>) {
        self.out.push('{');
        self.out
            .push_str(&atoms.iter().map(ToString::to_string).join(";"));
        self.out.push('}');
        if let Some(body) = body {
            self.out.push_str(" :- ");
            self.out.push_str(&body.to_string());
        }
        self.out.push_str(".\n");
    }

    fn directive(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }
}

fn pos(atom: GroundAtom) -> GroundLiteral {
    GroundLiteral::pos(atom)
}

fn neg(atom: GroundAtom) -> GroundLiteral {
    GroundLiteral::neg(atom)
}

fn clause(slot: i64) -> GroundAtom {
    GroundAtom::ints("clause", [slot])
}

fn vars(values: &[i64]) -> Value {
    Value::Tuple(values.iter().copied().map(Value::Int).collect())
}

fn body_literal(slot: i64, (predicate, arity, args): &Candidate) -> GroundAtom {
    GroundAtom::new(
        "body_literal",
        [
            Value::Int(slot),
            predicate.clone(),
            Value::from(*arity),
            vars(args),
        ],
    )
}

struct Space<'a> {
    settings: &'a Settings,
    bias: &'a Bias,
    head: Value,
    head_arity: usize,
    max_rules: i64,
    max_vars: i64,
    /// Candidate body literals, per slot.
    candidates: Vec<Vec<Candidate>>,
    w: Writer,
}

impl<'a> Space<'a> {
    fn new(settings: &'a Settings, bias: &'a Bias) -> Self {
        let head_arity = bias.head_arity();
        let identity: Vec<i64> = (0..head_arity as i64).collect();

        let mut signatures: Vec<(Value, usize, bool)> = bias
            .body
            .iter()
            .map(|signature| (Value::Const(signature.predicate.clone()), signature.arity, false))
            .collect();
        if settings.recursion_enabled {
            signatures.push((Value::constant(bias.head_predicate()), head_arity, true));
        }

        let candidates = (0..settings.max_rules)
            .map(|slot| {
                let mut ret = Vec::new();
                for (predicate, arity, recursive) in &signatures {
                    // Slot 0 holds the base case.
                    if *recursive && slot == 0 {
                        continue;
                    }

                    for args in (0..settings.max_vars as i64).permutations(*arity) {
                        if *recursive && args == identity {
                            continue;
                        }
                        ret.push((predicate.clone(), *arity, args));
                    }
                }
                ret
            })
            .collect();

        Self {
            settings,
            bias,
            head: Value::constant(bias.head_predicate()),
            head_arity,
            max_rules: settings.max_rules as i64,
            max_vars: settings.max_vars as i64,
            candidates,
            w: Writer { out: String::new() },
        }
    }

    fn head_literal(&self, slot: i64) -> GroundAtom {
        let identity: Vec<i64> = (0..self.head_arity as i64).collect();
        GroundAtom::new(
            "head_literal",
            [
                Value::Int(slot),
                self.head.clone(),
                Value::from(self.head_arity),
                vars(&identity),
            ],
        )
    }

    fn recursive_clause(&self, slot: i64) -> GroundAtom {
        GroundAtom::new(
            "recursive_clause",
            [Value::Int(slot), self.head.clone(), Value::from(self.head_arity)],
        )
    }

    fn clauses(&mut self) {
        let slots: Vec<GroundAtom> = (0..self.max_rules).map(clause).collect();
        self.w.choice(&slots, None);
        self.w.rule(None, [neg(clause(0))]);
        for slot in 1..self.max_rules {
            self.w.rule(None, [pos(clause(slot)), neg(clause(slot - 1))]);
        }

        for slot in 0..self.max_rules {
            self.w.rule(Some(self.head_literal(slot)), [pos(clause(slot))]);
            let atoms: Vec<GroundAtom> = self.candidates[slot as usize]
                .iter()
                .map(|candidate| body_literal(slot, candidate))
                .collect();
            if !atoms.is_empty() {
                self.w.choice(&atoms, Some(clause(slot)));
            }
        }
    }

    /// `clause_var/2`: contiguous variables, head variables in the
    /// body.
    fn variables(&mut self) {
        for slot in 0..self.max_rules {
            for candidate in &self.candidates[slot as usize] {
                for var in candidate.2.iter().copied().collect::<BTreeSet<_>>() {
                    self.w.rule(
                        Some(GroundAtom::ints("body_var", [slot, var])),
                        [pos(body_literal(slot, candidate))],
                    );
                }
            }

            for var in 0..self.max_vars {
                let clause_var = GroundAtom::ints("clause_var", [slot, var]);
                let body_var = GroundAtom::ints("body_var", [slot, var]);
                if (var as usize) < self.head_arity {
                    self.w.rule(Some(clause_var.clone()), [pos(clause(slot))]);
                    self.w.rule(None, [pos(clause(slot)), neg(body_var.clone())]);
                }
                self.w.rule(Some(clause_var.clone()), [pos(body_var)]);

                if var > 0 {
                    self.w.rule(
                        None,
                        [
                            pos(clause_var),
                            neg(GroundAtom::ints("clause_var", [slot, var - 1])),
                        ],
                    );
                }
            }
        }

        for var in 0..self.max_vars {
            let used = GroundAtom::ints("var_used", [var]);
            for slot in 0..self.max_rules {
                self.w.rule(
                    Some(used.clone()),
                    [pos(GroundAtom::ints("clause_var", [slot, var]))],
                );
            }

            let mut body = vec![pos(used)];
            if var + 1 < self.max_vars {
                body.push(neg(GroundAtom::ints("var_used", [var + 1])));
            }
            self.w.rule(Some(GroundAtom::ints("num_vars", [var + 1])), body);
        }
    }

    /// `var_type/3`: a variable has at most one type.
    fn types(&mut self) {
        let types = &self.bias.types;
        let mut all: BTreeSet<Type> = types.body.values().flatten().cloned().collect();
        all.extend(types.head.iter().flatten().cloned());
        if all.is_empty() {
            return;
        }

        let var_type = |slot: i64, var: i64, ty: &Type| {
            GroundAtom::new(
                "var_type",
                [Value::Int(slot), Value::Int(var), Value::Const(ty.clone())],
            )
        };

        let mut rules = Vec::new();
        for slot in 0..self.max_rules {
            for (i, ty) in types.head.iter().flatten().enumerate() {
                rules.push((var_type(slot, i as i64, ty), pos(clause(slot))));
            }

            for candidate in &self.candidates[slot as usize] {
                let (predicate, _, args) = candidate;
                let predicate = predicate.as_symbol().unwrap_or_else(|| self.bias.head_predicate());
                let positions = match types.body.get(predicate) {
                    Some(positions) => positions.clone(),
                    None if predicate == self.bias.head_predicate() => {
                        types.head.clone().unwrap_or_default()
                    }
                    None => continue,
                };
                for (var, ty) in args.iter().zip(positions.iter()) {
                    rules.push((var_type(slot, *var, ty), pos(body_literal(slot, candidate))));
                }
            }
        }

        for (head, body) in rules {
            self.w.rule(Some(head), [body]);
        }

        for slot in 0..self.max_rules {
            for var in 0..self.max_vars {
                for (t1, t2) in all.iter().tuple_combinations() {
                    self.w
                        .rule(None, [pos(var_type(slot, var, t1)), pos(var_type(slot, var, t2))]);
                }
            }
        }
    }

    /// `body_size/2` through a counting chain over the slot's
    /// candidate literals; counts past `max_body` saturate.
    fn body_sizes(&mut self) {
        let max_body = self.settings.max_body as i64;
        let over = max_body + 1;
        for slot in 0..self.max_rules {
            let count = |j: usize, k: i64| GroundAtom::ints("body_count", [slot, j as i64, k]);
            self.w.rule(Some(count(0, 0)), [pos(clause(slot))]);

            let candidates = self.candidates[slot as usize].clone();
            for (j, candidate) in candidates.iter().enumerate() {
                let literal = body_literal(slot, candidate);
                for k in 0..=over {
                    self.w
                        .rule(Some(count(j + 1, k)), [pos(count(j, k)), neg(literal.clone())]);
                    self.w.rule(
                        Some(count(j + 1, (k + 1).min(over))),
                        [pos(count(j, k)), pos(literal.clone())],
                    );
                }
            }

            let last = candidates.len();
            self.w.rule(None, [pos(count(last, 0))]);
            self.w.rule(None, [pos(count(last, over))]);
            for k in 1..=max_body {
                self.w.rule(
                    Some(GroundAtom::ints("body_size", [slot, k])),
                    [pos(count(last, k))],
                );
            }
        }
    }

    /// No two clauses share a body.
    fn distinct_clauses(&mut self) {
        for (r1, r2) in (0..self.max_rules).tuple_combinations() {
            let differ = GroundAtom::ints("differ", [r1, r2]);
            let mut all: BTreeSet<&Candidate> = self.candidates[r1 as usize].iter().collect();
            all.extend(self.candidates[r2 as usize].iter());

            let mut rules = Vec::new();
            for candidate in all {
                let in_r1 = body_literal(r1, candidate);
                let in_r2 = body_literal(r2, candidate);
                rules.push([pos(in_r1.clone()), neg(in_r2.clone())]);
                rules.push([pos(in_r2), neg(in_r1)]);
            }

            for body in rules {
                self.w.rule(Some(differ.clone()), body);
            }
            self.w.rule(None, [pos(clause(r2)), neg(differ)]);
        }
    }

    /// `size/1`, `num_rules/1` and `num_clauses/2`.
    fn sizes(&mut self) {
        let bound = self.settings.literal_bound() as i64;
        let max_body = self.settings.max_body as i64;
        let partial = |slot: i64, size: i64| GroundAtom::ints("partial_size", [slot, size]);

        self.w.fact(partial(0, 0));
        for slot in 0..self.max_rules {
            for size in 0..=bound {
                self.w
                    .rule(Some(partial(slot + 1, size)), [pos(partial(slot, size)), neg(clause(slot))]);
                for k in 1..=max_body {
                    let body = [
                        pos(partial(slot, size)),
                        pos(GroundAtom::ints("body_size", [slot, k])),
                    ];
                    if size + k + 1 <= bound {
                        self.w.rule(Some(partial(slot + 1, size + k + 1)), body);
                    } else {
                        self.w.rule(None, body);
                    }
                }
            }
        }

        for size in 0..=bound {
            self.w.rule(
                Some(GroundAtom::ints("size", [size])),
                [pos(partial(self.max_rules, size))],
            );
        }

        for rules in 1..=self.max_rules {
            let num_rules = GroundAtom::ints("num_rules", [rules]);
            let mut body = vec![pos(clause(rules - 1))];
            if rules < self.max_rules {
                body.push(neg(clause(rules)));
            }
            self.w.rule(Some(num_rules.clone()), body);
            self.w.rule(
                Some(GroundAtom::new(
                    "num_clauses",
                    [self.head.clone(), Value::Int(rules)],
                )),
                [pos(num_rules)],
            );
        }
    }

    /// `recursive_clause/3` and `num_recursive/2`.
    fn recursion(&mut self) {
        let num_recursive =
            |count: i64, head: &Value| GroundAtom::new("num_recursive", [head.clone(), Value::Int(count)]);
        if !self.settings.recursion_enabled {
            self.w.fact(num_recursive(0, &self.head));
            return;
        }

        for slot in 1..self.max_rules {
            let recursive = self.recursive_clause(slot);
            let candidates = self.candidates[slot as usize].clone();
            for candidate in candidates.iter().filter(|candidate| candidate.0 == self.head) {
                self.w
                    .rule(Some(recursive.clone()), [pos(body_literal(slot, candidate))]);
            }
        }

        // Slot 0 is never recursive.
        let counted = |slot: i64, count: i64| GroundAtom::ints("recursive_count", [slot, count]);
        self.w.fact(counted(1, 0));
        for slot in 1..self.max_rules {
            for count in 0..slot {
                self.w.rule(
                    Some(counted(slot + 1, count)),
                    [pos(counted(slot, count)), neg(self.recursive_clause(slot))],
                );
                self.w.rule(
                    Some(counted(slot + 1, count + 1)),
                    [pos(counted(slot, count)), pos(self.recursive_clause(slot))],
                );
            }
        }

        for count in 0..self.max_rules {
            self.w.rule(
                Some(num_recursive(count, &self.head)),
                [pos(counted(self.max_rules.max(1), count))],
            );
        }
    }

    /// Directions and the `before/2` clause ordering that models carry
    /// when predicate invention is on.
    fn invention(&mut self) {
        if !self.settings.pi_enabled {
            return;
        }

        let mut facts = Vec::new();
        for (predicate, directions) in &self.bias.directions {
            for (i, direction) in directions {
                let token = match direction {
                    Direction::In => "in",
                    Direction::Out => "out",
                };
                facts.push(GroundAtom::new(
                    "direction_",
                    [
                        Value::Const(predicate.clone()),
                        Value::from(*i),
                        Value::constant(token),
                    ],
                ));
            }
        }
        for fact in facts {
            self.w.fact(fact);
        }

        // Base cases come before recursive cases.
        for (r1, r2) in (0..self.max_rules).tuple_combinations() {
            self.w.rule(
                Some(GroundAtom::ints("before", [r1, r2])),
                [
                    pos(clause(r1)),
                    neg(self.recursive_clause(r1)),
                    pos(self.recursive_clause(r2)),
                ],
            );
        }
    }

    fn render(mut self) -> String {
        self.clauses();
        self.variables();
        self.types();
        self.body_sizes();
        self.distinct_clauses();
        self.sizes();
        self.recursion();
        self.invention();
        self.w.directive("#show body_literal/4.");
        self.w.out
    }
}

/// Renders the ground hypothesis space for `bias` under `settings`.
#[must_use]
pub fn render(settings: &Settings, bias: &Bias) -> String {
    let text = Space::new(settings, bias).render();
    log::debug!(
        "rendered hypothesis space for {}/{}: {} lines",
        bias.head_predicate(),
        bias.head_arity(),
        text.lines().count()
    );
    text
}

/// Groups the body literals of a model by slot, for tests and
/// diagnostics.
#[must_use]
pub fn slots(model: &BTreeSet<GroundAtom>) -> BTreeMap<i64, Vec<String>> {
    let mut ret: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for atom in model.iter().filter(|atom| &*atom.predicate == "body_literal") {
        let (Some(slot), Some(predicate), Some(args)) = (
            atom.arguments.first().and_then(Value::as_int),
            atom.arguments.get(1),
            atom.arguments.get(3),
        ) else {
            continue;
        };
        ret.entry(slot)
            .or_default()
            .push(format!("{}{}", predicate, args));
    }

    ret
}

#[cfg(test)]
use crate::backend::AspBackend;
#[cfg(test)]
use crate::backend::SatBackend;

#[cfg(test)]
fn space_models(settings: &Settings, bias: &Bias) -> Vec<BTreeMap<i64, Vec<String>>> {
    let mut backend = SatBackend::new();
    backend
        .add("base", &[], &render(settings, bias))
        .expect("ok");
    backend.ground("base", &[]).expect("ok");

    let mut ret: Vec<_> = std::iter::from_fn(|| backend.next_model())
        .map(|model| slots(&model))
        .collect();
    ret.sort();
    ret
}

#[cfg(test)]
fn small_settings() -> Settings {
    Settings {
        max_rules: 2,
        max_vars: 3,
        max_body: 1,
        ..Settings::default()
    }
}

#[test]
fn test_space_enumeration() {
    let _ = env_logger::builder().is_test(true).try_init();

    // head(A,B) :- body(A,B) and head(A,B) :- body(B,A), alone or
    // together, in either slot order.
    let bias = Bias::new("head", 2).with_body("body", 2);
    let models = space_models(&small_settings(), &bias);

    assert_eq!(models.len(), 4);
    let single: Vec<_> = models.iter().filter(|model| model.len() == 1).collect();
    assert_eq!(
        single
            .iter()
            .map(|model| model[&0].clone())
            .collect::<Vec<_>>(),
        vec![vec!["body(0,1)".to_string()], vec!["body(1,0)".to_string()]]
    );
}

#[test]
fn test_space_types() {
    // The second argument of `colour` is a colour, so it can't stand
    // for a head node.
    let bias = Bias::new("f", 1)
        .with_body("colour", 2)
        .with_head_types(&["node"])
        .with_body_types("colour", &["node", "colour"]);
    let settings = Settings {
        max_rules: 1,
        max_vars: 2,
        max_body: 1,
        ..Settings::default()
    };

    let models = space_models(&settings, &bias);
    assert_eq!(
        models,
        vec![[(0, vec!["colour(0,1)".to_string()])].into_iter().collect()]
    );
}

#[test]
fn test_space_sizes() {
    let bias = Bias::new("f", 1).with_body("p", 1).with_body("q", 1);
    let settings = Settings {
        max_rules: 1,
        max_vars: 1,
        max_body: 2,
        ..Settings::default()
    };

    // f(A) :- p(A).  f(A) :- q(A).  f(A) :- p(A), q(A).
    let mut backend = SatBackend::new();
    backend
        .add(
            "base",
            &[],
            &format!("{}\n#show size/1.", render(&settings, &bias)),
        )
        .expect("ok");
    backend.ground("base", &[]).expect("ok");

    let mut sizes: Vec<i64> = std::iter::from_fn(|| backend.next_model())
        .flat_map(|model| {
            model
                .into_iter()
                .filter(|atom| &*atom.predicate == "size")
                .filter_map(|atom| atom.arguments[0].as_int())
                .collect::<Vec<_>>()
        })
        .collect();
    sizes.sort();
    assert_eq!(sizes, vec![2, 2, 3]);
}

#[test]
fn test_recursion_stays_out_of_slot_zero() {
    let bias = Bias::new("f", 1).with_body("p", 1);
    let settings = Settings {
        max_rules: 2,
        max_vars: 2,
        max_body: 2,
        recursion_enabled: true,
        ..Settings::default()
    };

    let models = space_models(&settings, &bias);
    assert!(!models.is_empty());
    for model in &models {
        assert!(model[&0].iter().all(|literal| !literal.starts_with("f(")));
    }
    assert!(models
        .iter()
        .any(|model| model.get(&1).is_some_and(|body| body.iter().any(|x| x.starts_with("f(")))));
}

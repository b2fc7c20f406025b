//! Abstract constraint bodies, one builder per constraint kind.
//!
//! The `i`th witness rule (in program order) sits at the rule slot
//! placeholder `Ri`.  Bodies mix domain literals over those
//! placeholders with meta literals the grounder interprets.
use super::body_size_literal;
use super::rule_literals;
use super::seen_rule_literal;
use super::Compiler;
use crate::logic::Argument;
use crate::logic::Atom;
use crate::logic::Bound;
use crate::logic::Literal;
use crate::logic::Program;
use crate::logic::Rule;
use crate::logic::RuleOrdering;
use crate::logic::RuleVar;
use crate::logic::Symbol;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Witness rules laid out on rule slot placeholders.
struct Placement {
    literals: Vec<Literal>,
    slots: BTreeMap<Rule, RuleVar>,
    /// Recursive rules and their body sizes.
    recursive: Vec<(usize, Rule)>,
}

fn rule_var(index: usize) -> RuleVar {
    RuleVar(index as u32)
}

fn int(value: usize) -> Argument {
    Argument::Int(value as i64)
}

fn not_clause(count: usize) -> Literal {
    Literal::neg(Atom::new("clause", [int(count)]))
}

fn size_at_least(size: usize) -> Literal {
    Literal::domain("program_size_at_least", [int(size)])
}

/// `R(r1) < R(r2)` for every pair in an explicit ordering.
fn explicit_ordering(slots: &BTreeMap<Rule, RuleVar>, ordering: &RuleOrdering) -> Vec<Literal> {
    let mut literals = Vec::new();
    for (lower, higher) in ordering {
        let Some(r1) = slots.get(lower) else {
            continue;
        };
        for rule in higher {
            if let Some(r2) = slots.get(rule) {
                literals.push(Literal::LessThan(*r1, Bound::Rule(*r2)));
            }
        }
    }

    literals
}

/// Orders rules by an explicit, non-empty ordering if given, else
/// recursive rules by ascending body size.
fn ordering_literals(placement: &Placement, ordering: Option<&RuleOrdering>) -> Vec<Literal> {
    if let Some(ordering) = ordering.filter(|ordering| !ordering.is_empty()) {
        return explicit_ordering(&placement.slots, ordering);
    }

    let mut literals = Vec::new();
    for (k1, r1) in &placement.recursive {
        for (k2, r2) in &placement.recursive {
            if k1 < k2 {
                literals.push(Literal::LessThan(
                    placement.slots[r1],
                    Bound::Rule(placement.slots[r2]),
                ));
            }
        }
    }

    literals
}

impl Compiler {
    /// Refers to `rule` at `slot`: through `seen_rule` once its handle
    /// is flushed, by spelling it out (and queueing its seen rules)
    /// otherwise.
    fn reference(&mut self, rule: &Rule, slot: RuleVar, recursive: bool) -> Vec<Literal> {
        let handle = self.handle(rule);
        if self.seen.contains(&handle) {
            let mut literals = vec![seen_rule_literal(&handle, slot)];
            if recursive {
                literals.push(Literal::AtLeast(slot, 1));
            }
            literals
        } else {
            self.queue_seen_rule(&handle, rule, recursive);
            rule_literals(rule, slot)
        }
    }

    fn place(&mut self, program: &Program) -> Placement {
        let mut placement = Placement {
            literals: Vec::new(),
            slots: BTreeMap::new(),
            recursive: Vec::new(),
        };

        for (i, rule) in program.iter().enumerate() {
            let slot = rule_var(i);
            placement.slots.insert(rule.clone(), slot);

            if self.single_solve {
                placement.literals.extend(rule_literals(rule, slot));
                continue;
            }

            let recursive = rule.is_recursive();
            if recursive {
                placement.recursive.push((rule.body.len(), rule.clone()));
            }
            let literals = self.reference(rule, slot, recursive);
            placement.literals.extend(literals);
        }

        placement
    }

    /// Every rule in a slot below `|program|`, slot `|program|` empty.
    pub(super) fn specialisation(
        &mut self,
        program: &Program,
        ordering: Option<&RuleOrdering>,
        size: Option<usize>,
    ) -> Vec<Literal> {
        let mut placement = self.place(program);
        let count = program.len();
        for slot in placement.slots.values() {
            placement
                .literals
                .push(Literal::LessThan(*slot, Bound::Value(count as i64)));
        }

        placement.literals.push(not_clause(count));
        if let Some(size) = size {
            placement.literals.push(size_at_least(size));
        }

        let extra = ordering_literals(&placement, ordering);
        placement.literals.extend(extra);
        placement.literals
    }

    /// Every rule present with exactly its body size.
    pub(super) fn generalisation(
        &mut self,
        program: &Program,
        ordering: Option<&RuleOrdering>,
        size: Option<usize>,
    ) -> Vec<Literal> {
        let mut placement = self.place(program);
        for (rule, slot) in &placement.slots {
            placement
                .literals
                .push(body_size_literal(*slot, rule.body.len()));
        }

        if let Some(size) = size {
            placement.literals.push(size_at_least(size));
        }

        let extra = ordering_literals(&placement, ordering);
        placement.literals.extend(extra);
        placement.literals
    }

    /// Exactly the witness: every rule with its body size, in a slot
    /// below `|program|`, and nothing in slot `|program|`.
    pub(super) fn banish(
        &mut self,
        program: &Program,
        ordering: Option<&RuleOrdering>,
    ) -> Vec<Literal> {
        let mut placement = self.place(program);
        let count = program.len();
        for (rule, slot) in &placement.slots {
            placement
                .literals
                .push(body_size_literal(*slot, rule.body.len()));
            placement
                .literals
                .push(Literal::LessThan(*slot, Bound::Value(count as i64)));
        }

        placement.literals.push(not_clause(count));
        let extra = ordering_literals(&placement, ordering);
        placement.literals.extend(extra);
        placement.literals
    }

    /// The witness's single rule, in slot 1 or later, as the only
    /// recursive clause of its head.  Its handle turns bad.
    pub(super) fn redundancy1(&mut self, program: &Program) -> Option<Vec<Literal>> {
        let rule = program.iter().next()?;
        let head = rule.head_atom()?;
        let slot = rule_var(0);
        let handle = self.handle(rule);

        let mut literals = Vec::new();
        if self.seen.contains(&handle) {
            literals.push(seen_rule_literal(&handle, slot));
        } else {
            self.queue_seen_rule(&handle, rule, false);
            literals.extend(rule_literals(rule, slot));
        }

        literals.push(Literal::AtLeast(slot, 1));
        literals.push(Literal::domain(
            "recursive_clause",
            [
                slot.into(),
                Argument::Const(head.predicate.clone()),
                int(head.arity()),
            ],
        ));
        literals.push(Literal::domain(
            "num_recursive",
            [Argument::Const(head.predicate.clone()), int(1)],
        ));

        self.bad.insert(handle);
        Some(literals)
    }

    /// One constraint per head predicate that no recursive rule
    /// reaches: the same rules, the same clause counts for the other
    /// heads, and the same number of recursive clauses.
    pub(super) fn redundancy2(
        &mut self,
        program: &Program,
        ordering: Option<&RuleOrdering>,
    ) -> Vec<Vec<Literal>> {
        let mut num_rules: BTreeMap<Symbol, usize> = BTreeMap::new();
        let mut num_recursive: BTreeMap<Symbol, usize> = BTreeMap::new();
        for rule in program {
            if let Some(head) = rule.head_atom() {
                *num_rules.entry(head.predicate.clone()).or_default() += 1;
                if rule.is_recursive() {
                    *num_recursive.entry(head.predicate.clone()).or_default() += 1;
                }
            }
        }

        let called = recursively_called(program, &num_rules);

        let mut bodies = Vec::new();
        for predicate in num_rules.keys().filter(|p| !called.contains(*p)) {
            let mut placement = Placement {
                literals: Vec::new(),
                slots: BTreeMap::new(),
                recursive: Vec::new(),
            };

            for (i, rule) in program.iter().enumerate() {
                let slot = rule_var(i);
                placement.slots.insert(rule.clone(), slot);

                let recursive = rule.is_recursive();
                placement.literals.push(if recursive {
                    Literal::AtLeast(slot, 1)
                } else {
                    Literal::LessThan(slot, Bound::Value(1))
                });

                let handle = self.handle(rule);
                if self.seen.contains(&handle) {
                    placement.literals.push(seen_rule_literal(&handle, slot));
                } else {
                    self.queue_seen_rule(&handle, rule, recursive);
                    placement.literals.extend(rule_literals(rule, slot));
                }
            }

            for (other, count) in &num_rules {
                if other != predicate {
                    placement.literals.push(Literal::domain(
                        "num_clauses",
                        [Argument::Const(other.clone()), int(*count)],
                    ));
                }
            }

            placement.literals.push(Literal::domain(
                "num_recursive",
                [
                    Argument::Const(predicate.clone()),
                    int(num_recursive.get(predicate).copied().unwrap_or(0)),
                ],
            ));

            if let Some(ordering) = ordering {
                let extra = explicit_ordering(&placement.slots, ordering);
                placement.literals.extend(extra);
            }

            bodies.push(placement.literals);
        }

        bodies
    }

    /// A flushed recursive rule may not sit in two slots.
    pub(super) fn tmp_andy(&mut self, program: &Program) -> Vec<Vec<Literal>> {
        let mut bodies = Vec::new();
        for rule in program.iter().filter(|rule| rule.is_recursive()) {
            let handle = self.handle(rule);
            if !self.seen.contains(&handle) {
                continue;
            }

            let r1 = rule_var(1);
            let r2 = rule_var(2);
            bodies.push(vec![
                seen_rule_literal(&handle, r1),
                seen_rule_literal(&handle, r2),
                Literal::LessThan(r1, Bound::Rule(r2)),
                Literal::AtLeast(r1, 1),
                body_size_literal(r1, rule.body.len()),
            ]);
        }

        bodies
    }
}

/// Head predicates called from a recursive rule for another head, and
/// transitively from the predicates so called.
fn recursively_called(program: &Program, heads: &BTreeMap<Symbol, usize>) -> BTreeSet<Symbol> {
    let mut called: BTreeSet<Symbol> = BTreeSet::new();
    loop {
        let mut added = false;
        for rule in program {
            let Some(head) = rule.head_atom() else {
                continue;
            };
            let recursive = rule.is_recursive();
            for atom in rule.body_atoms() {
                if !heads.contains_key(&atom.predicate) {
                    continue;
                }

                if (atom.predicate != head.predicate && recursive)
                    || called.contains(&head.predicate)
                {
                    added |= called.insert(atom.predicate.clone());
                }
            }
        }

        if !added {
            return called;
        }
    }
}

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

#[test]
fn test_recursively_called_fixed_point() {
    // f calls g from a recursive rule, g calls h: both are reached; f
    // is not.
    let program = Program::new([
        Rule::from_atoms(atom("f", &["A"]), [atom("f", &["A"]), atom("g", &["A"])]),
        Rule::from_atoms(atom("g", &["A"]), [atom("h", &["A"])]),
        Rule::from_atoms(atom("h", &["A"]), [atom("e", &["A"])]),
    ]);
    let heads: BTreeMap<Symbol, usize> = ["f", "g", "h"]
        .into_iter()
        .map(|p| (Symbol::from(p), 1))
        .collect();

    let called = recursively_called(&program, &heads);
    let expected: BTreeSet<Symbol> = ["g", "h"].into_iter().map(Symbol::from).collect();
    assert_eq!(called, expected);

    // Without recursion, nothing is reached.
    let flat = Program::new([
        Rule::from_atoms(atom("f", &["A"]), [atom("g", &["A"])]),
        Rule::from_atoms(atom("g", &["A"]), [atom("e", &["A"])]),
    ]);
    assert!(recursively_called(&flat, &heads).is_empty());
}

//! Slot assignments for constraint templates.
//!
//! Each rule placeholder `r` gets one `BindRule(r, v)` atom per value
//! `v` in `[0, max_rules)`, and each variable placeholder `x` one
//! `BindVar(x, v)` per value in `[0, max_vars)`.  Exactly one value per
//! placeholder, at most one rule placeholder per rule value, and at
//! most one variable placeholder per variable value within a rule.
//! Meta literals become nogoods over these atoms.
use crate::ground::Assignment;
use crate::logic::Bound;
use crate::logic::Literal;
use crate::logic::Placeholder;
use crate::logic::RuleVar;
use crate::logic::VarVar;
use satumerator::AtMostOne;
use satumerator::ChoiceConstraint;
use satumerator::Nogood;
use satumerator::Satumerator;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
enum Bind {
    Rule(RuleVar, i64),
    Var(VarVar, i64),
}

fn forbid(state: &mut Satumerator<Bind>, atoms: impl IntoIterator<Item = Bind>) {
    state
        .add_nogood(Nogood::positive(atoms))
        .expect("binding atoms are declared before meta literals");
}

fn translate_meta(
    state: &mut Satumerator<Bind>,
    literal: &Literal,
    max_rules: i64,
    max_vars: i64,
) {
    match literal {
        Literal::Domain { .. } => {}
        Literal::Equals(x, k) => {
            for v in (0..max_vars).filter(|v| v != k) {
                forbid(state, [Bind::Var(*x, v)]);
            }
        }
        Literal::AtLeast(r, k) => {
            for v in 0..(*k).min(max_rules) {
                forbid(state, [Bind::Rule(*r, v)]);
            }
        }
        Literal::LessThan(r, Bound::Value(k)) => {
            for v in (*k).max(0)..max_rules {
                forbid(state, [Bind::Rule(*r, v)]);
            }
        }
        Literal::LessThan(r1, Bound::Rule(r2)) => {
            for v1 in 0..max_rules {
                for v2 in 0..=v1 {
                    forbid(state, [Bind::Rule(*r1, v1), Bind::Rule(*r2, v2)]);
                }
            }
        }
        Literal::AllDifferent(xs) => {
            for (i, x) in xs.iter().enumerate() {
                for y in &xs[i + 1..] {
                    for v in 0..max_vars {
                        forbid(state, [Bind::Var(*x, v), Bind::Var(*y, v)]);
                    }
                }
            }
        }
    }
}

/// Enumerates every assignment of `placeholders` that satisfies the
/// distinctness structure and every literal in `meta`.  Source
/// variables in `placeholders` are ignored.
pub(super) fn enumerate(
    placeholders: &BTreeSet<Placeholder>,
    meta: &BTreeSet<Literal>,
    max_rules: usize,
    max_vars: usize,
) -> Vec<Assignment> {
    let max_rules = max_rules as i64;
    let max_vars = max_vars as i64;

    let mut rules: BTreeSet<RuleVar> = BTreeSet::new();
    let mut slots: BTreeMap<RuleVar, Vec<VarVar>> = BTreeMap::new();
    for placeholder in placeholders {
        match placeholder {
            Placeholder::Rule(r) => {
                rules.insert(*r);
            }
            Placeholder::Slot(x) => {
                rules.insert(x.rule);
                slots.entry(x.rule).or_default().push(*x);
            }
            Placeholder::Source(_) => {}
        }
    }

    let mut state = Satumerator::new();
    for r in &rules {
        state.declare_choice(ChoiceConstraint::new(
            (0..max_rules).map(|v| Bind::Rule(*r, v)),
        ));
    }

    for xs in slots.values() {
        for x in xs {
            state.declare_choice(ChoiceConstraint::new(
                (0..max_vars).map(|v| Bind::Var(*x, v)),
            ));
        }
    }

    if rules.len() > 1 {
        for v in 0..max_rules {
            state.declare_at_most_one(AtMostOne::new(rules.iter().map(|r| Bind::Rule(*r, v))));
        }
    }

    for xs in slots.values().filter(|xs| xs.len() > 1) {
        for v in 0..max_vars {
            state.declare_at_most_one(AtMostOne::new(xs.iter().map(|x| Bind::Var(*x, v))));
        }
    }

    for literal in meta {
        translate_meta(&mut state, literal, max_rules, max_vars);
    }

    state
        .all_models()
        .into_iter()
        .map(|model| {
            model
                .into_iter()
                .map(|atom| match atom {
                    Bind::Rule(r, v) => (Placeholder::Rule(r), v),
                    Bind::Var(x, v) => (Placeholder::Slot(x), v),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
use crate::logic::Var;

#[cfg(test)]
fn rule_placeholders(count: u32) -> BTreeSet<Placeholder> {
    (0..count).map(|i| Placeholder::Rule(RuleVar(i))).collect()
}

#[cfg(test)]
fn total_order(count: u32) -> BTreeSet<Literal> {
    (1..count)
        .map(|i| Literal::LessThan(RuleVar(i - 1), Bound::Rule(RuleVar(i))))
        .collect()
}

#[test]
fn test_ordered_rules_are_combinations() {
    // C(4, 2) = 6, C(4, 3) = 4, C(5, 3) = 10.
    assert_eq!(enumerate(&rule_placeholders(2), &total_order(2), 4, 3).len(), 6);
    assert_eq!(enumerate(&rule_placeholders(3), &total_order(3), 4, 3).len(), 4);
    assert_eq!(enumerate(&rule_placeholders(3), &total_order(3), 5, 3).len(), 10);

    for assignment in enumerate(&rule_placeholders(3), &total_order(3), 5, 3) {
        let values: Vec<i64> = assignment.values().copied().collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]), "{:?}", values);
    }
}

#[test]
fn test_distinctness_without_meta() {
    // Two rule placeholders over 3 values: 3 * 2 ordered pairs.
    assert_eq!(enumerate(&rule_placeholders(2), &BTreeSet::new(), 3, 3).len(), 6);

    // One rule over 2 values, two of its variables over 3 values.
    let r0 = RuleVar(0);
    let a = VarVar::new(r0, Var::new(0));
    let b = VarVar::new(r0, Var::new(1));
    let placeholders: BTreeSet<Placeholder> =
        [Placeholder::Rule(r0), Placeholder::Slot(a), Placeholder::Slot(b)]
            .into_iter()
            .collect();
    assert_eq!(enumerate(&placeholders, &BTreeSet::new(), 2, 3).len(), 12);

    let pinned: BTreeSet<Literal> = [Literal::Equals(a, 0)].into_iter().collect();
    let assignments = enumerate(&placeholders, &pinned, 2, 3);
    assert_eq!(assignments.len(), 4);
    assert!(assignments
        .iter()
        .all(|assignment| assignment[&Placeholder::Slot(a)] == 0));
}

#[test]
fn test_meta_bounds() {
    let r0 = RuleVar(0);
    let placeholders = rule_placeholders(1);

    let at_least: BTreeSet<Literal> = [Literal::AtLeast(r0, 1)].into_iter().collect();
    assert_eq!(enumerate(&placeholders, &at_least, 3, 2).len(), 2);

    let below: BTreeSet<Literal> = [Literal::LessThan(r0, Bound::Value(1))].into_iter().collect();
    let assignments = enumerate(&placeholders, &below, 3, 2);
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0][&Placeholder::Rule(r0)], 0);

    let both: BTreeSet<Literal> = at_least.union(&below).cloned().collect();
    assert!(enumerate(&placeholders, &both, 3, 2).is_empty());
}

#[test]
fn test_equals_out_of_range() {
    let r0 = RuleVar(0);
    let a = VarVar::new(r0, Var::new(0));
    let placeholders: BTreeSet<Placeholder> =
        [Placeholder::Rule(r0), Placeholder::Slot(a)].into_iter().collect();
    let meta: BTreeSet<Literal> = [Literal::Equals(a, 5)].into_iter().collect();

    assert!(enumerate(&placeholders, &meta, 2, 3).is_empty());
}

#[test]
fn test_all_different() {
    let r0 = RuleVar(0);
    let r1 = RuleVar(1);
    let a = VarVar::new(r0, Var::new(0));
    let b = VarVar::new(r1, Var::new(0));
    let placeholders: BTreeSet<Placeholder> = [
        Placeholder::Rule(r0),
        Placeholder::Rule(r1),
        Placeholder::Slot(a),
        Placeholder::Slot(b),
    ]
    .into_iter()
    .collect();

    // 2 orders for the rules, 2 * 2 values for slots in different rules.
    assert_eq!(enumerate(&placeholders, &BTreeSet::new(), 2, 2).len(), 8);
    let meta: BTreeSet<Literal> = [Literal::AllDifferent(vec![a, b])].into_iter().collect();
    assert_eq!(enumerate(&placeholders, &meta, 2, 2).len(), 4);
}

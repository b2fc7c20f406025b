//! Typed, injective variable-to-slot bindings for bare bodies.
//!
//! A body variable may not land on a head position whose type differs
//! from its own, and a variable whose body positions disagree on its
//! type has nowhere to go at all.  A variable is never pruned from the
//! slot that matches its own position.
use crate::bias::Type;
use crate::bias::Types;
use crate::ground::Assignment;
use crate::logic::Literal;
use crate::logic::Placeholder;
use crate::logic::Var;
use satumerator::AtMostOne;
use satumerator::ChoiceConstraint;
use satumerator::Satumerator;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Returns the source variables of `body`, and the set of types each
/// typed variable takes at its body positions.
pub(super) fn variable_types<'a>(
    body: impl IntoIterator<Item = &'a Literal>,
    types: &Types,
) -> (BTreeSet<Var>, BTreeMap<Var, BTreeSet<Type>>) {
    let mut vars = BTreeSet::new();
    let mut typed: BTreeMap<Var, BTreeSet<Type>> = BTreeMap::new();

    for atom in body.into_iter().filter_map(Literal::atom) {
        for (position, arg) in atom.arguments.iter().enumerate() {
            let mut found = BTreeSet::new();
            arg.collect_vars(&mut found);
            if let Some(ty) = types.body_type(&atom.predicate, position) {
                for x in &found {
                    typed.entry(*x).or_default().insert(ty.clone());
                }
            }
            vars.extend(found);
        }
    }

    (vars, typed)
}

fn admissible(
    x: Var,
    slot: usize,
    typed: &BTreeMap<Var, BTreeSet<Type>>,
    head: Option<&[Type]>,
) -> bool {
    let Some(types) = typed.get(&x) else {
        return true;
    };

    if types.len() > 1 {
        return false;
    }

    if x.index() as usize == slot {
        return true;
    }

    match head.and_then(|head| head.get(slot)) {
        Some(head_type) => types.contains(head_type),
        None => true,
    }
}

pub(super) fn enumerate(
    vars: &BTreeSet<Var>,
    typed: &BTreeMap<Var, BTreeSet<Type>>,
    head: Option<&[Type]>,
    max_vars: usize,
) -> Vec<Assignment> {
    let candidates: BTreeMap<Var, Vec<usize>> = vars
        .iter()
        .map(|x| {
            let slots = (0..max_vars)
                .filter(|slot| admissible(*x, *slot, typed, head))
                .collect();
            (*x, slots)
        })
        .collect();

    let mut state = Satumerator::new();
    for (x, slots) in &candidates {
        state.declare_choice(ChoiceConstraint::new(slots.iter().map(|slot| (*x, *slot))));
    }

    for slot in 0..max_vars {
        let users: Vec<(Var, usize)> = candidates
            .iter()
            .filter(|(_, slots)| slots.contains(&slot))
            .map(|(x, _)| (*x, slot))
            .collect();
        if users.len() > 1 {
            state.declare_at_most_one(AtMostOne::new(users));
        }
    }

    state
        .all_models()
        .into_iter()
        .map(|model| {
            model
                .into_iter()
                .map(|(x, slot)| (Placeholder::Source(x), slot as i64))
                .collect()
        })
        .collect()
}

#[cfg(test)]
use super::Grounder;
#[cfg(test)]
use crate::logic::Atom;

#[cfg(test)]
fn body(atoms: &[(&str, &[&str])]) -> Vec<Literal> {
    atoms
        .iter()
        .map(|(predicate, vars)| {
            Literal::pos(Atom::with_vars(
                predicate,
                vars.iter()
                    .map(|name| Var::from_name(name).expect("valid variable name")),
            ))
        })
        .collect()
}

#[test]
fn test_untyped_count_is_falling_factorial() {
    let mut grounder = Grounder::new();
    let types = Types::default();

    // 3 variables into 4 slots: 4!/1! = 24.
    let three = body(&[("p", &["A", "B"]), ("q", &["B", "C"])]);
    assert_eq!(grounder.find_deep_bindings4(&three, 2, 4, &types).len(), 24);

    // 2 variables into 3 slots: 3!/1! = 6.
    let two = body(&[("p", &["A", "B"])]);
    assert_eq!(grounder.find_deep_bindings4(&two, 2, 3, &types).len(), 6);

    // 2 variables into 2 slots: 2!/0! = 2.
    assert_eq!(grounder.find_deep_bindings4(&two, 2, 2, &types).len(), 2);
}

#[test]
fn test_type_clash_reduces_count() {
    let mut grounder = Grounder::new();
    let literals = body(&[("p", &["A", "B"])]);

    let untyped = grounder
        .find_deep_bindings4(&literals, 2, 3, &Types::default())
        .len();

    let mut types = Types::default();
    types.head = Some(vec!["node".into(), "node".into()]);
    types
        .body
        .insert("p".into(), vec!["node".into(), "colour".into()]);
    let typed = grounder.find_deep_bindings4(&literals, 2, 3, &types);

    assert_eq!(untyped, 6);
    assert!(typed.len() < untyped);
    // B (a colour) may not land on head slot 0 (a node).
    assert!(typed
        .iter()
        .all(|assignment| assignment[&Placeholder::Source(Var::new(1))] != 0));
    assert_eq!(typed.len(), 4);
}

#[test]
fn test_conflicting_body_types_have_no_binding() {
    let mut grounder = Grounder::new();
    let mut types = Types::default();
    types.body.insert("p".into(), vec!["node".into()]);
    types.body.insert("q".into(), vec!["colour".into()]);

    let literals = body(&[("p", &["A"]), ("q", &["A"])]);
    assert!(grounder.find_deep_bindings4(&literals, 2, 2, &types).is_empty());
}

#[test]
fn test_deep_cache() {
    let mut grounder = Grounder::new();
    let types = Types::default();

    // Same variables, different predicates: one cache entry.
    let first = grounder.find_deep_bindings4(&body(&[("p", &["A", "B"])]), 2, 3, &types);
    let second = grounder.find_deep_bindings4(&body(&[("q", &["B", "A"])]), 2, 3, &types);
    assert_eq!(first, second);
    assert_eq!(grounder.cached_deep_bindings(), 1);

    let _ = grounder.find_deep_bindings4(&body(&[("p", &["A", "B"])]), 2, 4, &types);
    assert_eq!(grounder.cached_deep_bindings(), 2);

    // Different rule bounds are cached apart, with the same answer.
    let more_rules = grounder.find_deep_bindings4(&body(&[("p", &["A", "B"])]), 3, 3, &types);
    assert_eq!(more_rules, first);
    assert_eq!(grounder.cached_deep_bindings(), 3);
}

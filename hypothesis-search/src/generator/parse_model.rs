//! Reads candidate programs back out of models.
//!
//! A model lists `body_literal(R, P, A, Vars)` atoms and, when rules
//! can differ in their head, `head_literal(R, P, A, Vars)` atoms.  With
//! predicate invention, models also carry argument directions
//! (`direction_/3`) and the clause ordering (`before/2`).
use super::Candidate;
use crate::backend::Model;
use crate::bias::Bias;
use crate::bias::Direction;
use crate::bias::Directions;
use crate::ground::GroundAtom;
use crate::ground::Value;
use crate::logic::Atom;
use crate::logic::Program;
use crate::logic::Rule;
use crate::logic::RuleOrdering;
use crate::logic::Var;
use crate::settings::Settings;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

pub(super) fn parse_model(settings: &Settings, bias: &Bias, model: &Model) -> Candidate {
    if settings.pi_enabled {
        parse_invention(model)
    } else if settings.recursion_enabled {
        parse_recursion(bias, model)
    } else {
        parse_single_rule(bias, model)
    }
}

/// Splits a `head_literal/4` or `body_literal/4` atom into its slot
/// and the literal it stands for.
///
/// # Panics
///
/// Panics on any other shape.
fn slot_atom(atom: &GroundAtom) -> (i64, Atom) {
    match atom.arguments.as_slice() {
        [Value::Int(slot), Value::Const(predicate), _, Value::Tuple(args)] => {
            let vars = args.iter().map(|arg| match arg {
                Value::Int(x) if *x >= 0 => Var::new(*x as u32),
                #[cfg(not(tarpaulin_include))]
                other => panic!("malformed variable {} in {}", other, atom),
            });
            (*slot, Atom::with_vars(predicate, vars))
        }
        #[cfg(not(tarpaulin_include))]
        _ => panic!("malformed {} atom", atom),
    }
}

fn is(atom: &GroundAtom, predicate: &str) -> bool {
    &*atom.predicate == predicate
}

/// Every body literal belongs to the one rule for the bias head.
fn parse_single_rule(bias: &Bias, model: &Model) -> Candidate {
    let body = model
        .iter()
        .filter(|atom| is(atom, "body_literal"))
        .map(|atom| slot_atom(atom).1);

    Candidate {
        program: Program::new([Rule::from_atoms(bias.head.clone(), body)]),
        ordering: RuleOrdering::new(),
        directions: bias.directions.clone(),
    }
}

/// Rules are the slots with a `head_literal`; every head is the bias
/// head.
fn parse_recursion(bias: &Bias, model: &Model) -> Candidate {
    let mut slots: BTreeSet<i64> = BTreeSet::new();
    let mut bodies: BTreeMap<i64, Vec<Atom>> = BTreeMap::new();

    for atom in model {
        if is(atom, "head_literal") {
            slots.insert(slot_atom(atom).0);
        } else if is(atom, "body_literal") {
            let (slot, literal) = slot_atom(atom);
            bodies.entry(slot).or_default().push(literal);
        }
    }

    let program = slots
        .iter()
        .map(|slot| {
            Rule::from_atoms(
                bias.head.clone(),
                bodies.remove(slot).unwrap_or_default(),
            )
        })
        .collect();

    Candidate {
        program,
        ordering: RuleOrdering::new(),
        directions: bias.directions.clone(),
    }
}

/// Heads, directions and ordering all come from the model.
///
/// # Panics
///
/// Panics on a direction other than `in` or `out`.
fn parse_invention(model: &Model) -> Candidate {
    let mut heads: BTreeMap<i64, Atom> = BTreeMap::new();
    let mut bodies: BTreeMap<i64, Vec<Atom>> = BTreeMap::new();
    let mut directions = Directions::new();
    let mut before: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();

    for atom in model {
        match (&*atom.predicate, atom.arguments.as_slice()) {
            ("head_literal", _) => {
                let (slot, head) = slot_atom(atom);
                heads.insert(slot, head);
            }
            ("body_literal", _) => {
                let (slot, literal) = slot_atom(atom);
                bodies.entry(slot).or_default().push(literal);
            }
            ("direction_", [Value::Const(predicate), Value::Int(index), token]) => {
                let token = token.to_string();
                directions
                    .entry(predicate.clone())
                    .or_default()
                    .insert(*index as usize, Direction::from_token(&token));
            }
            ("before", [Value::Int(r1), Value::Int(r2)]) => {
                before.entry(*r1).or_default().insert(*r2);
            }
            _ => {}
        }
    }

    let rules: BTreeMap<i64, Rule> = heads
        .into_iter()
        .map(|(slot, head)| {
            let body = bodies.remove(&slot).unwrap_or_default();
            (slot, Rule::from_atoms(head, body))
        })
        .collect();

    let mut ordering = RuleOrdering::new();
    for (r1, lower) in &before {
        let Some(rule) = rules.get(r1) else {
            continue;
        };
        ordering
            .entry(rule.clone())
            .or_default()
            .extend(lower.iter().filter_map(|r2| rules.get(r2)).cloned());
    }

    Candidate {
        program: rules.into_values().collect(),
        ordering,
        directions,
    }
}

#[cfg(test)]
fn literal_atom(predicate: &str, slot: i64, literal: &str, vars: &[i64]) -> GroundAtom {
    GroundAtom::new(
        predicate,
        [
            Value::Int(slot),
            Value::constant(literal),
            Value::from(vars.len()),
            Value::Tuple(vars.iter().copied().map(Value::Int).collect()),
        ],
    )
}

#[cfg(test)]
fn rendered(program: &Program) -> Vec<String> {
    program.iter().map(ToString::to_string).collect()
}

#[test]
fn test_single_rule() {
    let bias = Bias::new("f", 2)
        .with_body("edge", 2)
        .with_directions("f", &["+", "-"]);
    let model: Model = [
        literal_atom("body_literal", 0, "edge", &[0, 2]),
        literal_atom("body_literal", 0, "edge", &[2, 1]),
    ]
    .into_iter()
    .collect();

    let candidate = parse_model(&Settings::default(), &bias, &model);
    assert_eq!(
        rendered(&candidate.program),
        vec!["f(A,B):- edge(A,C), edge(C,B)."]
    );
    assert!(candidate.ordering.is_empty());
    assert_eq!(candidate.directions, bias.directions);
}

#[test]
fn test_recursion() {
    let bias = Bias::new("f", 1).with_body("p", 1);
    let settings = Settings {
        recursion_enabled: true,
        ..Settings::default()
    };
    let model: Model = [
        literal_atom("head_literal", 0, "f", &[0]),
        literal_atom("head_literal", 1, "f", &[0]),
        literal_atom("body_literal", 0, "p", &[0]),
        literal_atom("body_literal", 1, "p", &[0]),
        literal_atom("body_literal", 1, "f", &[1]),
        literal_atom("body_literal", 1, "p", &[1]),
    ]
    .into_iter()
    .collect();

    let candidate = parse_model(&settings, &bias, &model);
    assert_eq!(candidate.program.len(), 2);
    assert_eq!(
        candidate
            .program
            .iter()
            .filter(|rule| rule.is_recursive())
            .count(),
        1
    );
}

#[test]
fn test_invention() {
    let settings = Settings {
        pi_enabled: true,
        ..Settings::default()
    };
    let model: Model = [
        literal_atom("head_literal", 0, "f", &[0]),
        literal_atom("head_literal", 1, "inv", &[0]),
        literal_atom("body_literal", 0, "inv", &[0]),
        literal_atom("body_literal", 1, "p", &[0]),
        GroundAtom::new(
            "direction_",
            [Value::constant("inv"), Value::Int(0), Value::constant("in")],
        ),
        GroundAtom::new(
            "direction_",
            [Value::constant("p"), Value::Int(0), Value::constant("out")],
        ),
        GroundAtom::ints("before", [1, 0]),
    ]
    .into_iter()
    .collect();

    let candidate = parse_model(&settings, &Bias::new("f", 1), &model);
    assert_eq!(
        rendered(&candidate.program),
        vec!["f(A):- inv(A).", "inv(A):- p(A)."]
    );
    assert_eq!(candidate.directions["inv"][&0], Direction::In);
    assert_eq!(candidate.directions["p"][&0], Direction::Out);

    let (lower, higher) = candidate
        .ordering
        .iter()
        .next()
        .expect("one ordering entry");
    assert_eq!(lower.to_string(), "inv(A):- p(A).");
    assert_eq!(
        higher.iter().map(ToString::to_string).collect::<Vec<_>>(),
        vec!["f(A):- inv(A)."]
    );
}

#[test]
#[should_panic(expected = "Unrecognised argument direction")]
fn test_invention_unknown_direction() {
    let settings = Settings {
        pi_enabled: true,
        ..Settings::default()
    };
    let model: Model = [GroundAtom::new(
        "direction_",
        [Value::constant("p"), Value::Int(0), Value::constant("sideways")],
    )]
    .into_iter()
    .collect();

    let _ = parse_model(&settings, &Bias::new("f", 1), &model);
}

#[test]
#[should_panic(expected = "malformed")]
fn test_malformed_body_literal() {
    let model: Model = [GroundAtom::ints("body_literal", [0, 1])].into_iter().collect();
    let _ = parse_model(&Settings::default(), &Bias::new("f", 1), &model);
}

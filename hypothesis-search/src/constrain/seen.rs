//! Seen rules tie a rule shape to the program slots that realise it.
//!
//! For a rule with handle `h`, the ground rules
//!
//! ```text
//! seen_rule(h, r) :- head_literal(r, p, a, (0, ..., a-1)),
//!                    body_literal(r, q, n, (...)), ...
//! ```
//!
//! cover every slot `r` (bar slot 0 for recursive rules) and every
//! injective placement of the body-only variables onto the variable
//! slots after the head's.  Constraints then mention `seen_rule(h, R)`
//! instead of spelling the rule out.
use crate::ground::GroundAtom;
use crate::ground::GroundLiteral;
use crate::ground::GroundRule;
use crate::ground::Value;
use crate::logic::Argument;
use crate::logic::Atom;
use crate::logic::Handle;
use crate::logic::Literal;
use crate::logic::Rule;
use crate::logic::RuleVar;
use crate::logic::Var;
use crate::logic::VarVar;
use itertools::Itertools;
use std::collections::BTreeMap;

/// A rule whose `seen_rule` grounding has not reached the solver yet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SeenRule {
    pub handle: Handle,
    pub rule: Rule,
    /// Recursive seen rules skip slot 0.
    pub recursive: bool,
}

impl SeenRule {
    #[must_use]
    pub fn new(handle: Handle, rule: Rule, recursive: bool) -> Self {
        Self {
            handle,
            rule,
            recursive,
        }
    }

    /// Lazily enumerates the ground `seen_rule` rules for every slot
    /// and every placement of the body-only variables.
    pub fn ground_rules(
        &self,
        max_rules: usize,
        max_vars: usize,
    ) -> impl Iterator<Item = GroundRule> + '_ {
        let head_vars = self.rule.head_vars();
        let body_only: Vec<Var> = self.rule.body_only_vars().into_iter().collect();
        let base: BTreeMap<Var, i64> = head_vars
            .iter()
            .enumerate()
            .map(|(i, x)| (*x, i as i64))
            .collect();
        let first_free = head_vars.len();
        let skip_zero = self.recursive;

        (0..max_rules as i64)
            .filter(move |slot| !(skip_zero && *slot == 0))
            .flat_map(move |slot| {
                let base = base.clone();
                let body_only = body_only.clone();
                (first_free..max_vars)
                    .permutations(body_only.len())
                    .map(move |placement| {
                        let mut names = base.clone();
                        for (x, value) in body_only.iter().zip(placement) {
                            names.insert(*x, value as i64);
                        }
                        self.instantiate(slot, &names)
                    })
            })
    }

    fn instantiate(&self, slot: i64, names: &BTreeMap<Var, i64>) -> GroundRule {
        let head = GroundAtom::new(
            "seen_rule",
            [Value::Str(self.handle.as_str().into()), Value::Int(slot)],
        );

        let mut body = Vec::new();
        if let Some(atom) = self.rule.head_atom() {
            body.push(GroundLiteral::pos(slot_atom("head_literal", slot, atom, names)));
        }
        for atom in self.rule.body_atoms() {
            body.push(GroundLiteral::pos(slot_atom("body_literal", slot, atom, names)));
        }

        GroundRule::new(Some(head), body)
    }
}

fn slot_value(arg: &Argument, names: &BTreeMap<Var, i64>) -> Value {
    match arg {
        Argument::Var(x) => match names.get(x) {
            Some(value) => Value::Int(*value),
            #[cfg(not(tarpaulin_include))]
            None => panic!("variable {} has no slot", x),
        },
        Argument::Tuple(xs) => Value::Tuple(xs.iter().map(|x| slot_value(x, names)).collect()),
        Argument::Int(x) => Value::Int(*x),
        Argument::Const(x) => Value::Const(x.clone()),
        #[cfg(not(tarpaulin_include))]
        other => panic!("unexpected argument {} in a seen rule", other),
    }
}

/// `predicate(slot, atom.predicate, arity, (slots...))`.
fn slot_atom(predicate: &str, slot: i64, atom: &Atom, names: &BTreeMap<Var, i64>) -> GroundAtom {
    GroundAtom::new(
        predicate,
        [
            Value::Int(slot),
            Value::Const(atom.predicate.clone()),
            Value::Int(atom.arity() as i64),
            Value::Tuple(atom.arguments.iter().map(|x| slot_value(x, names)).collect()),
        ],
    )
}

/// `predicate(R, atom.predicate, arity, (R_VA, ...))`.
fn template_atom(predicate: &str, rule_var: RuleVar, atom: &Atom) -> Literal {
    let slots = atom
        .arguments
        .iter()
        .map(|arg| match arg {
            Argument::Var(x) => VarVar::new(rule_var, *x).into(),
            other => other.clone(),
        })
        .collect();

    Literal::domain(
        predicate,
        [
            rule_var.into(),
            Argument::Const(atom.predicate.clone()),
            Argument::Int(atom.arity() as i64),
            Argument::Tuple(slots),
        ],
    )
}

/// Spells `rule` out at the rule slot `rule_var`: its head and body
/// literals, head variables pinned to their positions, and recursive
/// rules kept out of slot 0.
#[must_use]
pub fn rule_literals(rule: &Rule, rule_var: RuleVar) -> Vec<Literal> {
    let mut literals = Vec::new();
    if let Some(head) = rule.head_atom() {
        literals.push(template_atom("head_literal", rule_var, head));
    }

    for atom in rule.body_atoms() {
        literals.push(template_atom("body_literal", rule_var, atom));
    }

    for (i, x) in rule.head_vars().into_iter().enumerate() {
        literals.push(Literal::Equals(VarVar::new(rule_var, x), i as i64));
    }

    if rule.is_recursive() {
        literals.push(Literal::AtLeast(rule_var, 1));
    }

    literals
}

/// `seen_rule(handle, R)`.
#[must_use]
pub fn seen_rule_literal(handle: &Handle, rule_var: RuleVar) -> Literal {
    Literal::domain(
        "seen_rule",
        [Argument::Handle(handle.clone()), rule_var.into()],
    )
}

/// `body_size(R, size)`.
#[must_use]
pub fn body_size_literal(rule_var: RuleVar, size: usize) -> Literal {
    Literal::domain("body_size", [rule_var.into(), Argument::Int(size as i64)])
}

#[cfg(test)]
fn var(name: &str) -> Var {
    Var::from_name(name).expect("valid variable name")
}

#[cfg(test)]
fn path_rule() -> Rule {
    Rule::from_atoms(
        Atom::with_vars("f", [var("A"), var("B")]),
        [
            Atom::with_vars("edge", [var("A"), var("C")]),
            Atom::with_vars("edge", [var("C"), var("B")]),
        ],
    )
}

#[test]
fn test_seen_rule_count() {
    let rule = path_rule();
    let seen = SeenRule::new(Handle::of(&rule), rule, false);

    // 3 slots, and C ranges over variable slots 2..5.
    assert_eq!(seen.ground_rules(3, 5).count(), 9);

    let recursive = SeenRule::new(seen.handle.clone(), seen.rule.clone(), true);
    assert_eq!(recursive.ground_rules(3, 5).count(), 6);

    // No room for C.
    assert_eq!(seen.ground_rules(3, 2).count(), 0);
}

#[test]
fn test_identity_placement_round_trip() {
    let rule = path_rule();
    let seen = SeenRule::new(Handle::of(&rule), rule.clone(), false);
    let first = seen.ground_rules(1, 3).next().expect("one slot, one placement");

    assert_eq!(
        first.head.as_ref().map(ToString::to_string),
        Some(format!("seen_rule({:?},0)", seen.handle.as_str()))
    );

    // Read the head/body patterns back into atoms over `Var(slot)`.
    let mut head = None;
    let mut body = Vec::new();
    for literal in &first.body {
        let args = &literal.atom.arguments;
        let predicate = args[1].as_symbol().expect("predicate");
        let vars = args[3]
            .as_tuple()
            .expect("tuple")
            .iter()
            .map(|x| Var::new(x.as_int().expect("int") as u32));
        let atom = Atom::with_vars(predicate, vars);
        match &*literal.atom.predicate {
            "head_literal" => head = Some(atom),
            _ => body.push(atom),
        }
    }

    let rebuilt = Rule::from_atoms(head.expect("head"), body);
    assert_eq!(rebuilt, rule);
}

#[test]
fn test_rule_literals() {
    let rule = path_rule();
    let literals = rule_literals(&rule, RuleVar(0));
    let rendered: Vec<String> = literals.iter().map(ToString::to_string).collect();

    assert_eq!(
        rendered,
        vec![
            "head_literal(R0,f,2,(R0_VA,R0_VB))",
            "body_literal(R0,edge,2,(R0_VA,R0_VC))",
            "body_literal(R0,edge,2,(R0_VC,R0_VB))",
            "R0_VA==0",
            "R0_VB==1",
        ]
    );
}

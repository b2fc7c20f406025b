//! Ground values, atoms, rules and nogoods, and the instantiation of
//! abstract literals under an `Assignment`.
//!
//! Instantiation is where placeholders finally meet integers: every
//! `RuleVar`, `VarVar` and source `Var` in an abstract literal must be
//! bound by the assignment.  An unbound placeholder means the caller
//! built a template the grounder did not see, and is a contract
//! violation.
use crate::logic::Argument;
use crate::logic::Atom;
use crate::logic::Literal;
use crate::logic::Placeholder;
use crate::logic::Symbol;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A solver-native value.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Value {
    Int(i64),
    Const(Symbol),
    /// Quoted strings; rule handles travel as strings.
    Str(Arc<str>),
    Tuple(Vec<Value>),
}

impl Value {
    #[must_use]
    pub fn constant(name: &str) -> Self {
        Value::Const(name.into())
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Const(x) => Some(x),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(xs) => Some(xs),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(value as i64)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(x) => write!(f, "{}", x),
            Value::Const(x) => f.write_str(x),
            Value::Str(x) => write!(f, "{:?}", x),
            Value::Tuple(xs) => {
                f.write_str("(")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", x)?;
                }
                // `(a,)` is a 1-tuple, `(a)` is just `a`.
                if xs.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GroundAtom {
    pub predicate: Symbol,
    pub arguments: Vec<Value>,
}

impl GroundAtom {
    #[must_use]
    pub fn new(predicate: &str, arguments: impl IntoIterator<Item = Value>) -> Self {
        Self {
            predicate: predicate.into(),
            arguments: arguments.into_iter().collect(),
        }
    }

    /// Builds `predicate(ints...)`.
    #[must_use]
    pub fn ints(predicate: &str, arguments: impl IntoIterator<Item = i64>) -> Self {
        Self::new(predicate, arguments.into_iter().map(Value::Int))
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arguments.len()
    }
}

impl fmt::Display for GroundAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.predicate)?;
        if !self.arguments.is_empty() {
            f.write_str("(")?;
            for (i, arg) in self.arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", arg)?;
            }
            f.write_str(")")?;
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GroundLiteral {
    pub atom: GroundAtom,
    pub positive: bool,
}

impl GroundLiteral {
    #[must_use]
    pub fn pos(atom: GroundAtom) -> Self {
        Self {
            atom,
            positive: true,
        }
    }

    #[must_use]
    pub fn neg(atom: GroundAtom) -> Self {
        Self {
            atom,
            positive: false,
        }
    }
}

impl fmt::Display for GroundLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.positive {
            f.write_str("not ")?;
        }
        write!(f, "{}", self.atom)
    }
}

/// `head :- body`, or an integrity constraint when `head` is `None`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GroundRule {
    pub head: Option<GroundAtom>,
    pub body: BTreeSet<GroundLiteral>,
}

impl GroundRule {
    #[must_use]
    pub fn new(head: Option<GroundAtom>, body: impl IntoIterator<Item = GroundLiteral>) -> Self {
        Self {
            head,
            body: body.into_iter().collect(),
        }
    }

    /// Builds the integrity constraint that rejects `nogood`.
    #[must_use]
    pub fn constraint(nogood: &Nogood) -> Self {
        Self {
            head: None,
            body: nogood.clone(),
        }
    }
}

impl fmt::Display for GroundRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(head) = &self.head {
            write!(f, "{}", head)?;
            if self.body.is_empty() {
                return f.write_str(".");
            }
            f.write_str(" ")?;
        }
        f.write_str(":- ")?;
        for (i, literal) in self.body.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", literal)?;
        }
        f.write_str(".")
    }
}

/// A set of ground literals that may not all hold simultaneously.
pub type Nogood = BTreeSet<GroundLiteral>;

/// Integer values for placeholders.
pub type Assignment = BTreeMap<Placeholder, i64>;

fn lookup(assignment: &Assignment, placeholder: Placeholder) -> i64 {
    match assignment.get(&placeholder) {
        Some(value) => *value,
        #[cfg(not(tarpaulin_include))]
        None => panic!("placeholder {} left ungrounded", placeholder),
    }
}

/// Instantiates `arg` under `assignment`.
///
/// # Panics
///
/// Panics when `arg` mentions a placeholder or source variable that
/// `assignment` does not bind.
#[must_use]
pub fn ground_argument(arg: &Argument, assignment: &Assignment) -> Value {
    match arg {
        Argument::Var(x) => Value::Int(lookup(assignment, Placeholder::Source(*x))),
        Argument::Rule(x) => Value::Int(lookup(assignment, Placeholder::Rule(*x))),
        Argument::Slot(x) => Value::Int(lookup(assignment, Placeholder::Slot(*x))),
        Argument::Int(x) => Value::Int(*x),
        Argument::Const(x) => Value::Const(x.clone()),
        Argument::Handle(x) => Value::Str(x.as_str().into()),
        Argument::Tuple(xs) => Value::Tuple(
            xs.iter()
                .map(|x| ground_argument(x, assignment))
                .collect(),
        ),
    }
}

#[must_use]
pub fn ground_atom(atom: &Atom, assignment: &Assignment) -> GroundAtom {
    GroundAtom {
        predicate: atom.predicate.clone(),
        arguments: atom
            .arguments
            .iter()
            .map(|arg| ground_argument(arg, assignment))
            .collect(),
    }
}

/// Instantiates a domain literal; meta literals have no ground
/// counterpart and yield `None`.
#[must_use]
pub fn ground_literal(literal: &Literal, assignment: &Assignment) -> Option<GroundLiteral> {
    match literal {
        Literal::Domain { atom, positive } => Some(GroundLiteral {
            atom: ground_atom(atom, assignment),
            positive: *positive,
        }),
        _ => None,
    }
}

/// Instantiates the domain literals of `body` into a nogood.
#[must_use]
pub fn ground_body<'a>(
    body: impl IntoIterator<Item = &'a Literal>,
    assignment: &Assignment,
) -> Nogood {
    body.into_iter()
        .filter_map(|literal| ground_literal(literal, assignment))
        .collect()
}

#[cfg(test)]
use crate::logic::RuleVar;
#[cfg(test)]
use crate::logic::Var;
#[cfg(test)]
use crate::logic::VarVar;

#[test]
fn test_ground_body_drops_meta() {
    let r0 = RuleVar(0);
    let slot = VarVar::new(r0, Var::new(0));
    let body = vec![
        Literal::domain(
            "head_literal",
            [
                r0.into(),
                Argument::constant("f"),
                Argument::Int(1),
                Argument::Tuple(vec![slot.into()]),
            ],
        ),
        Literal::Equals(slot, 0),
        Literal::neg(Atom::new("clause", [Argument::Int(1)])),
    ];

    let assignment: Assignment = [(Placeholder::Rule(r0), 0), (Placeholder::Slot(slot), 0)]
        .into_iter()
        .collect();
    let nogood = ground_body(&body, &assignment);

    let rendered: Vec<String> = nogood.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["not clause(1)", "head_literal(0,f,1,(0,))"]);
}

#[test]
#[should_panic(expected = "left ungrounded")]
fn test_ungrounded_placeholder() {
    let _ = ground_argument(&RuleVar(3).into(), &Assignment::new());
}

#[test]
fn test_value_display() {
    let value = Value::Tuple(vec![
        Value::Int(1),
        Value::constant("a"),
        Value::Str("f/1(0):-".into()),
    ]);
    assert_eq!(value.to_string(), "(1,a,\"f/1(0):-\")");
}

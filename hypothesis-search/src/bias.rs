//! The parts of a language bias the engine consumes once the bias file
//! has been parsed: the head atom, the body predicate signatures,
//! argument types (used to prune deep bindings) and argument
//! directions (carried through to candidates).
use crate::logic::Atom;
use crate::logic::Symbol;
use crate::logic::Var;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

/// Argument types are opaque names; equal names are compatible.
pub type Type = Symbol;

/// Argument types for the head (by position) and for each body
/// predicate (by position).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Types {
    pub head: Option<Vec<Type>>,
    pub body: HashMap<Symbol, Vec<Type>>,
}

impl Types {
    /// Returns the type of `predicate`'s `position`th argument, if
    /// known.
    #[must_use]
    pub fn body_type(&self, predicate: &str, position: usize) -> Option<&Type> {
        self.body.get(predicate).and_then(|types| types.get(position))
    }

    #[must_use]
    pub fn head_type(&self, position: usize) -> Option<&Type> {
        self.head.as_ref().and_then(|types| types.get(position))
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Parses `in`/`+` or `out`/`-`.
    ///
    /// # Panics
    ///
    /// Panics on any other token: a malformed direction is a bias
    /// contract violation, not recoverable input.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        match token {
            "in" | "+" => Direction::In,
            "out" | "-" => Direction::Out,
            #[cfg(not(tarpaulin_include))]
            other => panic!("Unrecognised argument direction {:?}", other),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::In => "+",
            Direction::Out => "-",
        })
    }
}

/// Per-predicate, per-argument directions.
pub type Directions = BTreeMap<Symbol, BTreeMap<usize, Direction>>;

/// A body predicate the hypothesis space may use.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Signature {
    pub predicate: Symbol,
    pub arity: usize,
}

#[derive(Clone, Debug)]
pub struct Bias {
    /// The head atom, with arguments `A, B, ...` by position.
    pub head: Atom,
    pub body: Vec<Signature>,
    pub types: Types,
    pub directions: Directions,
}

impl Bias {
    #[must_use]
    pub fn new(head_predicate: &str, head_arity: usize) -> Self {
        Self {
            head: Atom::with_vars(head_predicate, (0..head_arity as u32).map(Var::new)),
            body: Vec::new(),
            types: Types::default(),
            directions: Directions::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, predicate: &str, arity: usize) -> Self {
        self.body.push(Signature {
            predicate: predicate.into(),
            arity,
        });
        self
    }

    #[must_use]
    pub fn with_head_types(mut self, types: &[&str]) -> Self {
        self.types.head = Some(types.iter().map(|x| Type::from(*x)).collect());
        self
    }

    #[must_use]
    pub fn with_body_types(mut self, predicate: &str, types: &[&str]) -> Self {
        self.types
            .body
            .insert(predicate.into(), types.iter().map(|x| Type::from(*x)).collect());
        self
    }

    /// Records directions for `predicate`, one token per argument.
    ///
    /// # Panics
    ///
    /// Panics on unrecognised tokens, like `Direction::from_token`.
    #[must_use]
    pub fn with_directions(mut self, predicate: &str, tokens: &[&str]) -> Self {
        let entry = self.directions.entry(predicate.into()).or_default();
        for (i, token) in tokens.iter().enumerate() {
            entry.insert(i, Direction::from_token(token));
        }
        self
    }

    #[must_use]
    pub fn head_predicate(&self) -> &str {
        &self.head.predicate
    }

    #[must_use]
    pub fn head_arity(&self) -> usize {
        self.head.arity()
    }

    /// Looks up the arity of a body predicate.
    #[must_use]
    pub fn body_arity(&self, predicate: &str) -> Option<usize> {
        self.body
            .iter()
            .find(|signature| &*signature.predicate == predicate)
            .map(|signature| signature.arity)
    }
}

#[test]
fn test_direction_tokens() {
    assert_eq!(Direction::from_token("in"), Direction::In);
    assert_eq!(Direction::from_token("+"), Direction::In);
    assert_eq!(Direction::from_token("out"), Direction::Out);
    assert_eq!(Direction::from_token("-"), Direction::Out);
}

#[test]
#[should_panic(expected = "Unrecognised argument direction")]
fn test_direction_unknown_token() {
    let _ = Direction::from_token("sideways");
}

#[test]
fn test_bias_builder() {
    let bias = Bias::new("f", 2)
        .with_body("edge", 2)
        .with_head_types(&["node", "node"])
        .with_body_types("edge", &["node", "node"])
        .with_directions("f", &["in", "out"]);

    assert_eq!(bias.head.to_string(), "f(A,B)");
    assert_eq!(bias.body_arity("edge"), Some(2));
    assert_eq!(bias.body_arity("missing"), None);
    assert_eq!(bias.types.head_type(1).map(|x| &**x), Some("node"));
    assert_eq!(bias.types.body_type("edge", 2), None);
    assert_eq!(bias.directions["f"][&1], Direction::Out);
}

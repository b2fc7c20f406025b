//! Literals are either domain literals, which mention predicates of
//! the bias or of the hypothesis-space encoding, or meta literals:
//! order and equality relations over placeholders that the constraint
//! compiler injects, and the grounder interprets.  Only domain
//! literals ever reach the solver.
use super::Argument;
use super::Placeholder;
use super::RuleVar;
use super::Symbol;
use super::Var;
use super::VarVar;
use std::collections::BTreeSet;
use std::fmt;

/// `predicate(arguments...)`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Atom {
    pub predicate: Symbol,
    pub arguments: Vec<Argument>,
}

impl Atom {
    #[must_use]
    pub fn new(predicate: &str, arguments: impl IntoIterator<Item = Argument>) -> Self {
        Self {
            predicate: predicate.into(),
            arguments: arguments.into_iter().collect(),
        }
    }

    /// Builds `predicate(vars...)` over source variables.
    #[must_use]
    pub fn with_vars(predicate: &str, vars: impl IntoIterator<Item = Var>) -> Self {
        Self::new(predicate, vars.into_iter().map(Argument::Var))
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    /// Returns the source variables of `self`, in argument order, when
    /// every argument is a source variable.
    #[must_use]
    pub fn var_arguments(&self) -> Option<Vec<Var>> {
        self.arguments
            .iter()
            .map(|arg| match arg {
                Argument::Var(x) => Some(*x),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for Atom {
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

/// Right-hand side of a `<` meta literal.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Bound {
    Rule(RuleVar),
    Value(i64),
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Literal {
    Domain { atom: Atom, positive: bool },
    /// The rule slot is strictly below another slot, or a constant.
    LessThan(RuleVar, Bound),
    /// The variable slot is pinned to a value.
    Equals(VarVar, i64),
    /// The rule slot is at least a value.
    AtLeast(RuleVar, i64),
    /// The variable slots are pairwise distinct.
    AllDifferent(Vec<VarVar>),
}

impl Literal {
    #[must_use]
    pub fn pos(atom: Atom) -> Self {
        Literal::Domain {
            atom,
            positive: true,
        }
    }

    #[must_use]
    pub fn neg(atom: Atom) -> Self {
        Literal::Domain {
            atom,
            positive: false,
        }
    }

    /// Shorthand for a positive domain literal.
    #[must_use]
    pub fn domain(predicate: &str, arguments: impl IntoIterator<Item = Argument>) -> Self {
        Self::pos(Atom::new(predicate, arguments))
    }

    #[inline]
    #[must_use]
    pub fn is_meta(&self) -> bool {
        !matches!(self, Literal::Domain { .. })
    }

    /// Returns the atom of a domain literal.
    #[must_use]
    pub fn atom(&self) -> Option<&Atom> {
        match self {
            Literal::Domain { atom, .. } => Some(atom),
            _ => None,
        }
    }

    /// Adds every placeholder in `self` to `out`.
    pub fn collect_placeholders(&self, out: &mut BTreeSet<Placeholder>) {
        match self {
            Literal::Domain { atom, .. } => atom
                .arguments
                .iter()
                .for_each(|arg| arg.collect_placeholders(out)),
            Literal::LessThan(x, bound) => {
                out.insert(Placeholder::Rule(*x));
                if let Bound::Rule(y) = bound {
                    out.insert(Placeholder::Rule(*y));
                }
            }
            Literal::Equals(x, _) => {
                out.insert(Placeholder::Rule(x.rule));
                out.insert(Placeholder::Slot(*x));
            }
            Literal::AtLeast(x, _) => {
                out.insert(Placeholder::Rule(*x));
            }
            Literal::AllDifferent(xs) => {
                for x in xs {
                    out.insert(Placeholder::Rule(x.rule));
                    out.insert(Placeholder::Slot(*x));
                }
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Domain { atom, positive } => {
                if !positive {
                    f.write_str("not ")?;
                }
                write!(f, "{}", atom)
            }
            Literal::LessThan(x, Bound::Rule(y)) => write!(f, "{}<{}", x, y),
            Literal::LessThan(x, Bound::Value(y)) => write!(f, "{}<{}", x, y),
            Literal::Equals(x, y) => write!(f, "{}=={}", x, y),
            Literal::AtLeast(x, y) => write!(f, "{}>={}", x, y),
            Literal::AllDifferent(xs) => {
                f.write_str("AllDifferent(")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", x)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[test]
fn test_display() {
    let r0 = RuleVar(0);
    let atom = Atom::with_vars("edge", [Var::new(0), Var::new(2)]);

    assert_eq!(Literal::pos(atom.clone()).to_string(), "edge(A,C)");
    assert_eq!(Literal::neg(atom).to_string(), "not edge(A,C)");
    assert_eq!(Literal::domain("clause", [Argument::Int(1)]).to_string(), "clause(1)");
    assert_eq!(
        Literal::LessThan(r0, Bound::Rule(RuleVar(1))).to_string(),
        "R0<R1"
    );
    assert_eq!(
        Literal::Equals(VarVar::new(r0, Var::new(1)), 1).to_string(),
        "R0_VB==1"
    );
}

#[test]
fn test_meta_placeholders() {
    let r0 = RuleVar(0);
    let mut out = BTreeSet::new();

    Literal::Equals(VarVar::new(r0, Var::new(1)), 1).collect_placeholders(&mut out);
    Literal::LessThan(r0, Bound::Value(2)).collect_placeholders(&mut out);

    assert!(Literal::AtLeast(r0, 1).is_meta());
    assert!(!Literal::domain("p", []).is_meta());
    assert_eq!(
        out,
        [
            Placeholder::Rule(r0),
            Placeholder::Slot(VarVar::new(r0, Var::new(1)))
        ]
        .into_iter()
        .collect()
    );
}

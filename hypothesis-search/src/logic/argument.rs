//! Arguments of literals: source variables, the placeholders that
//! constraint templates introduce for rule slots and variable slots,
//! and constants.
use super::Handle;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Predicate names and symbolic constants.
pub type Symbol = Arc<str>;

/// A source variable in a rule.  Variables are named by position:
/// `Var(0)` is `A`, `Var(1)` is `B`, and so on; the head's `i`th
/// argument is conventionally `Var(i)`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Var(u32);

impl Var {
    #[inline]
    #[must_use]
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub fn index(self) -> u32 {
        self.0
    }

    /// Parses the positional name `A`..`Z`, or `V26`, `V27`, ... past
    /// the alphabet.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        match (chars.next(), chars.as_str()) {
            (Some(c @ 'A'..='Z'), "") => Some(Self(c as u32 - 'A' as u32)),
            (Some('V'), digits) => digits.parse::<u32>().ok().filter(|x| *x >= 26).map(Self),
            _ => None,
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match char::from_u32('A' as u32 + self.0) {
            Some(c) if self.0 < 26 => write!(f, "{}", c),
            _ => write!(f, "V{}", self.0),
        }
    }
}

/// A placeholder for "which program slot does this rule occupy".
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RuleVar(pub u32);

impl fmt::Display for RuleVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// A placeholder for "which variable slot does source variable `var`
/// occupy in the rule at `rule`".
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct VarVar {
    pub rule: RuleVar,
    pub var: Var,
}

impl VarVar {
    #[inline]
    #[must_use]
    pub fn new(rule: RuleVar, var: Var) -> Self {
        Self { rule, var }
    }
}

impl fmt::Display for VarVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_V{}", self.rule, self.var)
    }
}

/// Anything a binding may assign an integer to.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Placeholder {
    Rule(RuleVar),
    Slot(VarVar),
    Source(Var),
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::Rule(x) => write!(f, "{}", x),
            Placeholder::Slot(x) => write!(f, "{}", x),
            Placeholder::Source(x) => write!(f, "{}", x),
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Argument {
    Var(Var),
    Rule(RuleVar),
    Slot(VarVar),
    Int(i64),
    Const(Symbol),
    Handle(Handle),
    Tuple(Vec<Argument>),
}

impl Argument {
    #[must_use]
    pub fn constant(name: &str) -> Self {
        Argument::Const(name.into())
    }

    /// Adds every placeholder (rule slot or variable slot) in `self`
    /// to `out`, looking inside tuples.
    pub fn collect_placeholders(&self, out: &mut BTreeSet<Placeholder>) {
        match self {
            Argument::Rule(x) => {
                out.insert(Placeholder::Rule(*x));
            }
            Argument::Slot(x) => {
                out.insert(Placeholder::Slot(*x));
            }
            Argument::Tuple(xs) => xs.iter().for_each(|x| x.collect_placeholders(out)),
            Argument::Var(_) | Argument::Int(_) | Argument::Const(_) | Argument::Handle(_) => {}
        }
    }

    /// Adds every source variable in `self` to `out`, looking inside
    /// tuples.
    pub fn collect_vars(&self, out: &mut BTreeSet<Var>) {
        match self {
            Argument::Var(x) => {
                out.insert(*x);
            }
            Argument::Tuple(xs) => xs.iter().for_each(|x| x.collect_vars(out)),
            _ => {}
        }
    }
}

impl From<Var> for Argument {
    fn from(var: Var) -> Self {
        Argument::Var(var)
    }
}

impl From<RuleVar> for Argument {
    fn from(rule: RuleVar) -> Self {
        Argument::Rule(rule)
    }
}

impl From<VarVar> for Argument {
    fn from(slot: VarVar) -> Self {
        Argument::Slot(slot)
    }
}

impl From<i64> for Argument {
    fn from(value: i64) -> Self {
        Argument::Int(value)
    }
}

impl From<Handle> for Argument {
    fn from(handle: Handle) -> Self {
        Argument::Handle(handle)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Var(x) => write!(f, "{}", x),
            Argument::Rule(x) => write!(f, "{}", x),
            Argument::Slot(x) => write!(f, "{}", x),
            Argument::Int(x) => write!(f, "{}", x),
            Argument::Const(x) => f.write_str(x),
            Argument::Handle(x) => write!(f, "{:?}", x.as_str()),
            Argument::Tuple(xs) => {
                f.write_str("(")?;
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
fn test_var_names() {
    assert_eq!(Var::new(0).to_string(), "A");
    assert_eq!(Var::new(25).to_string(), "Z");
    assert_eq!(Var::new(26).to_string(), "V26");
    assert_eq!(Var::from_name("C"), Some(Var::new(2)));
    assert_eq!(Var::from_name("V30"), Some(Var::new(30)));
    assert_eq!(Var::from_name("V3"), None);
    assert_eq!(Var::from_name("a"), None);
    assert_eq!(Var::from_name("AB"), None);
}

#[test]
fn test_placeholder_names() {
    let rule = RuleVar(1);
    assert_eq!(rule.to_string(), "R1");
    assert_eq!(VarVar::new(rule, Var::new(2)).to_string(), "R1_VC");
}

#[test]
fn test_collect_placeholders_in_tuples() {
    let r0 = RuleVar(0);
    let arg = Argument::Tuple(vec![
        VarVar::new(r0, Var::new(0)).into(),
        Argument::Tuple(vec![VarVar::new(r0, Var::new(1)).into(), Var::new(3).into()]),
        r0.into(),
        Argument::Int(4),
    ]);

    let mut placeholders = BTreeSet::new();
    arg.collect_placeholders(&mut placeholders);
    assert_eq!(placeholders.len(), 3);

    let mut vars = BTreeSet::new();
    arg.collect_vars(&mut vars);
    assert_eq!(vars, [Var::new(3)].into_iter().collect());
}

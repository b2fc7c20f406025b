use super::Atom;
use super::Literal;
use super::Var;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

/// A rule `head :- body`.  Body order is irrelevant, so the body is a
/// set; constraint templates have no head.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Rule {
    pub head: Option<Literal>,
    pub body: BTreeSet<Literal>,
}

impl Rule {
    #[must_use]
    pub fn new(head: Option<Literal>, body: impl IntoIterator<Item = Literal>) -> Self {
        Self {
            head,
            body: body.into_iter().collect(),
        }
    }

    /// Builds `head :- body` from domain atoms.
    #[must_use]
    pub fn from_atoms(head: Atom, body: impl IntoIterator<Item = Atom>) -> Self {
        Self::new(Some(Literal::pos(head)), body.into_iter().map(Literal::pos))
    }

    #[must_use]
    pub fn head_atom(&self) -> Option<&Atom> {
        self.head.as_ref().and_then(Literal::atom)
    }

    /// Iterates over the atoms of the body's domain literals.
    pub fn body_atoms(&self) -> impl Iterator<Item = &Atom> + '_ {
        self.body.iter().filter_map(Literal::atom)
    }

    /// A rule is recursive when its head predicate appears in its
    /// body.
    #[must_use]
    pub fn is_recursive(&self) -> bool {
        match self.head_atom() {
            Some(head) => self
                .body_atoms()
                .any(|atom| atom.predicate == head.predicate),
            None => false,
        }
    }

    /// Returns the head's source variables, in argument order.
    #[must_use]
    pub fn head_vars(&self) -> Vec<Var> {
        let mut vars = Vec::new();
        if let Some(head) = self.head_atom() {
            for arg in &head.arguments {
                let mut found = BTreeSet::new();
                arg.collect_vars(&mut found);
                for x in found {
                    if !vars.contains(&x) {
                        vars.push(x);
                    }
                }
            }
        }

        vars
    }

    /// Returns the source variables of the body.
    #[must_use]
    pub fn body_vars(&self) -> BTreeSet<Var> {
        let mut vars = BTreeSet::new();
        for atom in self.body_atoms() {
            atom.arguments
                .iter()
                .for_each(|arg| arg.collect_vars(&mut vars));
        }

        vars
    }

    /// Returns the body variables that do not appear in the head.
    #[must_use]
    pub fn body_only_vars(&self) -> BTreeSet<Var> {
        let head = self.head_vars();
        self.body_vars()
            .into_iter()
            .filter(|x| !head.contains(x))
            .collect()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(head) = &self.head {
            write!(f, "{}", head)?;
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

/// A program is an immutable set of rules.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Program(BTreeSet<Rule>);

impl Program {
    #[must_use]
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self(rules.into_iter().collect())
    }

    #[must_use]
    pub fn rules(&self) -> &BTreeSet<Rule> {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Rule> for Program {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Rule;
    type IntoIter = std::collections::btree_set::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", rule)?;
        }

        Ok(())
    }
}

/// Maps each rule to the rules that must occupy strictly higher
/// program slots.
pub type RuleOrdering = BTreeMap<Rule, BTreeSet<Rule>>;

#[cfg(test)]
fn var(name: &str) -> Var {
    Var::from_name(name).expect("valid variable name")
}

#[test]
fn test_recursive() {
    let base = Rule::from_atoms(
        Atom::with_vars("f", [var("A"), var("B")]),
        [Atom::with_vars("edge", [var("A"), var("B")])],
    );
    let step = Rule::from_atoms(
        Atom::with_vars("f", [var("A"), var("B")]),
        [
            Atom::with_vars("edge", [var("A"), var("C")]),
            Atom::with_vars("f", [var("C"), var("B")]),
        ],
    );

    assert!(!base.is_recursive());
    assert!(step.is_recursive());
    assert!(!Rule::new(None, [Literal::pos(Atom::with_vars("f", [var("A")]))]).is_recursive());
}

#[test]
fn test_vars() {
    let rule = Rule::from_atoms(
        Atom::with_vars("f", [var("B"), var("A")]),
        [
            Atom::with_vars("edge", [var("A"), var("D")]),
            Atom::with_vars("edge", [var("D"), var("C")]),
        ],
    );

    assert_eq!(rule.head_vars(), vec![var("B"), var("A")]);
    assert_eq!(
        rule.body_only_vars(),
        [var("C"), var("D")].into_iter().collect()
    );
    assert_eq!(rule.to_string(), "f(B,A):- edge(A,D), edge(D,C).");
}

//! Handles name rules up to variable renaming and body order.
//!
//! A handle is the lexicographically smallest rendering of a rule in
//! which the `i`th head variable is written `i`, and body-only
//! variables take the remaining indices in whichever order minimises
//! the text.  Two rules share a handle iff they are equal modulo a
//! renaming that fixes head positions, and modulo body order.
use super::Argument;
use super::Atom;
use super::Rule;
use super::Var;
use itertools::Itertools;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

/// A cheap, hashable, canonical identity for a rule.
#[derive(Clone, Debug)]
pub struct Handle {
    text: Arc<str>,
    hash: u64,
}

impl Handle {
    /// Computes the canonical handle of `rule`.
    #[must_use]
    pub fn of(rule: &Rule) -> Self {
        Self::from_text(canonical_text(rule))
    }

    fn from_text(text: String) -> Self {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        Self {
            hash: hasher.finish(),
            text: text.into(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.text == other.text
    }
}

impl Eq for Handle {}

impl PartialOrd for Handle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Handle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.text.cmp(&other.text)
    }
}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn render_argument(arg: &Argument, names: &BTreeMap<Var, usize>, out: &mut String) {
    match arg {
        Argument::Var(x) => match names.get(x) {
            Some(index) => out.push_str(&index.to_string()),
            None => out.push_str(&x.to_string()),
        },
        Argument::Tuple(xs) => {
            out.push('(');
            for (i, x) in xs.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                render_argument(x, names, out);
            }
            out.push(')');
        }
        other => out.push_str(&other.to_string()),
    }
}

fn render_atom(atom: &Atom, names: &BTreeMap<Var, usize>) -> String {
    let mut out = format!("{}/{}(", atom.predicate, atom.arity());
    for (i, arg) in atom.arguments.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        render_argument(arg, names, &mut out);
    }
    out.push(')');
    out
}

fn render(rule: &Rule, names: &BTreeMap<Var, usize>) -> String {
    let head = rule
        .head_atom()
        .map(|atom| render_atom(atom, names))
        .unwrap_or_default();
    let body = rule
        .body_atoms()
        .map(|atom| render_atom(atom, names))
        .sorted()
        .join(",");

    format!("{}:-{}", head, body)
}

/// The least rendering of `rule` over every naming of its body-only
/// variables.  That is factorial in their number, which `max_vars`
/// keeps to a handful, and `HandleCache` pays it once per rule.
fn canonical_text(rule: &Rule) -> String {
    let head_vars = rule.head_vars();
    let body_only: Vec<Var> = rule.body_only_vars().into_iter().collect();
    let base: BTreeMap<Var, usize> = head_vars
        .iter()
        .enumerate()
        .map(|(i, x)| (*x, i))
        .collect();

    let offset = head_vars.len();
    let count = body_only.len();
    let mut best: Option<String> = None;
    for perm in (0..count).permutations(count) {
        let mut names = base.clone();
        for (x, slot) in body_only.iter().zip(perm) {
            names.insert(*x, offset + slot);
        }

        let text = render(rule, &names);
        if best.as_ref().map_or(true, |current| text < *current) {
            best = Some(text);
        }
    }

    // `permutations(0)` yields one empty permutation, so `best` is set.
    best.unwrap_or_else(|| render(rule, &base))
}

/// Memoises `Handle::of`.
#[derive(Debug, Default)]
pub struct HandleCache {
    cache: HashMap<Rule, Handle>,
}

impl HandleCache {
    #[must_use]
    pub fn new() -> Self {
        Default::default()
    }

    pub fn handle(&mut self, rule: &Rule) -> Handle {
        if let Some(handle) = self.cache.get(rule) {
            return handle.clone();
        }

        let handle = Handle::of(rule);
        self.cache.insert(rule.clone(), handle.clone());
        handle
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
fn atom(predicate: &str, vars: &[&str]) -> Atom {
    Atom::with_vars(
        predicate,
        vars.iter()
            .map(|name| Var::from_name(name).expect("valid variable name")),
    )
}

#[test]
fn test_renaming_invariance() {
    let left = Rule::from_atoms(
        atom("f", &["A", "B"]),
        [atom("edge", &["A", "C"]), atom("edge", &["C", "D"]), atom("edge", &["D", "B"])],
    );
    let right = Rule::from_atoms(
        atom("f", &["A", "B"]),
        [atom("edge", &["E", "B"]), atom("edge", &["A", "F"]), atom("edge", &["F", "E"])],
    );

    assert_eq!(Handle::of(&left), Handle::of(&right));
    assert_eq!(
        Handle::of(&left).as_str(),
        "f/2(0,1):-edge/2(0,2),edge/2(2,3),edge/2(3,1)"
    );
}

#[test]
fn test_shape_matters() {
    let forward = Rule::from_atoms(atom("f", &["A", "B"]), [atom("edge", &["A", "B"])]);
    let backward = Rule::from_atoms(atom("f", &["A", "B"]), [atom("edge", &["B", "A"])]);
    let longer = Rule::from_atoms(
        atom("f", &["A", "B"]),
        [atom("edge", &["A", "B"]), atom("edge", &["B", "A"])],
    );

    assert_ne!(Handle::of(&forward), Handle::of(&backward));
    assert_ne!(Handle::of(&forward), Handle::of(&longer));
}

#[test]
fn test_head_positions_fixed() {
    // Swapping head variables is not a renaming that fixes positions.
    let left = Rule::from_atoms(atom("f", &["A", "B"]), [atom("edge", &["A", "C"])]);
    let right = Rule::from_atoms(atom("f", &["B", "A"]), [atom("edge", &["A", "C"])]);

    assert_ne!(Handle::of(&left), Handle::of(&right));
}

#[test]
fn test_cache() {
    let rule = Rule::from_atoms(atom("f", &["A"]), [atom("g", &["A", "B"])]);
    let mut cache = HandleCache::new();

    let first = cache.handle(&rule);
    let second = cache.handle(&rule);
    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_long_chain_renaming() {
    // Four body-only variables: every naming is tried.
    let chain = Rule::from_atoms(
        atom("f", &["A"]),
        [
            atom("g", &["A", "B"]),
            atom("g", &["B", "C"]),
            atom("g", &["C", "D"]),
            atom("g", &["D", "E"]),
        ],
    );
    let renamed = Rule::from_atoms(
        atom("f", &["A"]),
        [
            atom("g", &["D", "C"]),
            atom("g", &["A", "E"]),
            atom("g", &["C", "B"]),
            atom("g", &["E", "D"]),
        ],
    );

    assert_eq!(Handle::of(&chain), Handle::of(&renamed));
    assert_eq!(
        Handle::of(&chain).as_str(),
        "f/1(0):-g/2(0,1),g/2(1,2),g/2(2,3),g/2(3,4)"
    );
}

//! The grounder answers the two combinatorial queries that turn
//! abstract constraints into ground ones.
//!
//! `find_bindings` maps the placeholders of a constraint template
//! (rule slots and per-rule variable slots) to integers, subject to
//! distinctness and to the template's meta literals.
//! `find_deep_bindings4` maps the bare source variables of a body to
//! variable slots, injectively and respecting argument types.
//!
//! Both queries are small exact-enumeration problems for a
//! `satumerator::Satumerator`, and both results are memoised: the
//! caches live in the `Grounder`, which the search session owns.
mod bindings;
mod deep;

use crate::bias::Type;
use crate::bias::Types;
use crate::ground::Assignment;
use crate::logic::Literal;
use crate::logic::Placeholder;
use crate::logic::Var;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::rc::Rc;

/// Results only depend on the placeholders and meta literals of a
/// template, not on its domain literals.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct BindingKey {
    placeholders: BTreeSet<Placeholder>,
    meta: BTreeSet<Literal>,
    max_rules: usize,
    max_vars: usize,
}

/// Deep bindings only depend on the body's variables, the types they
/// carry, and the head types they may clash with.  The bounds are
/// part of the key, as for `BindingKey`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct DeepKey {
    vars: BTreeSet<Var>,
    typed: BTreeMap<Var, BTreeSet<Type>>,
    head: Option<Vec<Type>>,
    max_rules: usize,
    max_vars: usize,
}

#[derive(Debug, Default)]
pub struct Grounder {
    bindings: HashMap<BindingKey, Rc<[Assignment]>>,
    deep_bindings: HashMap<DeepKey, Rc<[Assignment]>>,
}

impl Grounder {
    #[must_use]
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns every assignment of the rule-slot and variable-slot
    /// placeholders in `body` such that:
    ///
    /// - each rule slot takes a distinct value in `[0, max_rules)`;
    /// - each variable slot takes a value in `[0, max_vars)`, distinct
    ///   from the other variable slots of the same rule;
    /// - every meta literal in `body` holds.
    pub fn find_bindings<'a>(
        &mut self,
        body: impl IntoIterator<Item = &'a Literal>,
        max_rules: usize,
        max_vars: usize,
    ) -> Rc<[Assignment]> {
        let mut placeholders = BTreeSet::new();
        let mut meta = BTreeSet::new();
        for literal in body {
            literal.collect_placeholders(&mut placeholders);
            if literal.is_meta() {
                meta.insert(literal.clone());
            }
        }

        let key = BindingKey {
            placeholders,
            meta,
            max_rules,
            max_vars,
        };
        if let Some(cached) = self.bindings.get(&key) {
            return cached.clone();
        }

        let result: Rc<[Assignment]> =
            bindings::enumerate(&key.placeholders, &key.meta, max_rules, max_vars).into();
        log::trace!(
            "find_bindings: {} placeholders, {} meta literals -> {} assignments",
            key.placeholders.len(),
            key.meta.len(),
            result.len()
        );
        self.bindings.insert(key, result.clone());
        result
    }

    /// Returns every injective map from the source variables of
    /// `body` to `[0, max_vars)` that never sends a typed variable to
    /// a head position of a different type.  Assignments bind
    /// `Placeholder::Source` values.
    ///
    /// The assignments themselves don't depend on `max_rules`; callers
    /// spread them over every rule slot.
    pub fn find_deep_bindings4<'a>(
        &mut self,
        body: impl IntoIterator<Item = &'a Literal>,
        max_rules: usize,
        max_vars: usize,
        types: &Types,
    ) -> Rc<[Assignment]> {
        let (vars, typed) = deep::variable_types(body, types);
        let key = DeepKey {
            vars,
            typed,
            head: types.head.clone(),
            max_rules,
            max_vars,
        };
        if let Some(cached) = self.deep_bindings.get(&key) {
            return cached.clone();
        }

        let result: Rc<[Assignment]> =
            deep::enumerate(&key.vars, &key.typed, key.head.as_deref(), max_vars).into();
        log::trace!(
            "find_deep_bindings4: {} variables ({} typed) -> {} assignments",
            key.vars.len(),
            key.typed.len(),
            result.len()
        );
        self.deep_bindings.insert(key, result.clone());
        result
    }

    /// Number of memoised `find_bindings` results.
    #[must_use]
    pub fn cached_bindings(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn cached_deep_bindings(&self) -> usize {
        self.deep_bindings.len()
    }
}

//! An `AspBackend` on top of `satumerator`'s tight ground programs.
//!
//! Ground atoms are interned to dense `AtomId`s; the permanent program
//! lives in a `GroundProgram`, and each `solve` translates it into a
//! fresh `ModelStream`, so rules added between solves are always
//! reflected in the next stream.
use super::parse;
use super::parse::Params;
use super::parse::RuleHead;
use super::parse::Statement;
use super::AspBackend;
use super::Model;
use crate::error::Error;
use crate::error::Result;
use crate::ground::GroundAtom;
use crate::ground::Nogood;
use crate::logic::Symbol;
use satumerator::GroundProgram;
use satumerator::Head;
use satumerator::ModelStream;
use satumerator::ProgramRule;
use std::collections::BTreeSet;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AtomId(u32);

struct Fragment {
    params: Vec<String>,
    text: String,
}

#[derive(Default)]
pub struct SatBackend {
    program: GroundProgram<AtomId>,
    fragments: HashMap<String, Fragment>,
    // Empty means every atom is shown.
    shown: BTreeSet<(Symbol, usize)>,
    atoms: Vec<GroundAtom>,
    ids: HashMap<GroundAtom, AtomId>,
    stream: Option<ModelStream<AtomId>>,
}

impl SatBackend {
    #[must_use]
    pub fn new() -> Self {
        Default::default()
    }

    fn intern(&mut self, atom: &GroundAtom) -> AtomId {
        if let Some(id) = self.ids.get(atom) {
            return *id;
        }

        let id = AtomId(self.atoms.len() as u32);
        self.atoms.push(atom.clone());
        self.ids.insert(atom.clone(), id);
        id
    }

    fn is_shown(&self, atom: &GroundAtom) -> bool {
        self.shown.is_empty()
            || self
                .shown
                .contains(&(atom.predicate.clone(), atom.arity()))
    }

    fn apply(&mut self, statement: Statement) {
        match statement {
            Statement::Rule { head, body } => {
                let body: Vec<(AtomId, bool)> = body
                    .iter()
                    .map(|literal| (self.intern(&literal.atom), literal.positive))
                    .collect();
                let head = match head {
                    RuleHead::Atom(atom) => Head::Atom(self.intern(&atom)),
                    RuleHead::Choice(atoms) => {
                        Head::Choice(atoms.iter().map(|atom| self.intern(atom)).collect())
                    }
                    RuleHead::Falsum => Head::Falsum,
                };
                self.program.add_rule(ProgramRule { head, body });
            }
            Statement::Show(predicate, arity) => {
                self.shown.insert((predicate, arity));
            }
            Statement::External(atom) => {
                let id = self.intern(&atom);
                self.program.declare_external(id);
            }
            Statement::Heuristic { atom, weight, sign } => {
                let id = self.intern(&atom);
                self.program.prefer(id, weight, sign);
            }
        }
    }

    /// Returns the number of distinct rules in the permanent program.
    #[must_use]
    pub fn rules(&self) -> usize {
        self.program.len()
    }
}

impl AspBackend for SatBackend {
    type Atom = AtomId;

    fn add(&mut self, name: &str, params: &[&str], text: &str) -> Result<()> {
        parse::check(text)?;

        match self.fragments.get_mut(name) {
            Some(fragment) if fragment.params.len() != params.len() => {
                return Err(Error::FragmentArity {
                    name: name.to_string(),
                    expected: fragment.params.len(),
                    found: params.len(),
                });
            }
            Some(fragment) => {
                fragment.text.push('\n');
                fragment.text.push_str(text);
            }
            None => {
                self.fragments.insert(
                    name.to_string(),
                    Fragment {
                        params: params.iter().map(ToString::to_string).collect(),
                        text: text.to_string(),
                    },
                );
            }
        }

        Ok(())
    }

    fn ground(&mut self, name: &str, args: &[i64]) -> Result<()> {
        let statements = {
            let fragment = self
                .fragments
                .get(name)
                .ok_or_else(|| Error::UnknownFragment(name.to_string()))?;
            if fragment.params.len() != args.len() {
                return Err(Error::FragmentArity {
                    name: name.to_string(),
                    expected: fragment.params.len(),
                    found: args.len(),
                });
            }

            let params: Params<'_> = fragment
                .params
                .iter()
                .map(String::as_str)
                .zip(args.iter().copied())
                .collect();
            parse::parse(&fragment.text, &params)?
        };

        log::debug!(
            "grounding {}{:?}: {} statements",
            name,
            args,
            statements.len()
        );
        for statement in statements {
            self.apply(statement);
        }

        Ok(())
    }

    fn assign_external(&mut self, atom: &GroundAtom, value: bool) {
        let assigned = self
            .ids
            .get(atom)
            .is_some_and(|id| self.program.assign_external(id, value));
        log::trace!("assign_external {} = {}: {}", atom, value, assigned);
    }

    fn release_external(&mut self, atom: &GroundAtom) {
        if let Some(id) = self.ids.get(atom) {
            self.program.release_external(id);
        }
    }

    fn add_atom(&mut self, atom: &GroundAtom) -> AtomId {
        self.intern(atom)
    }

    fn add_rule(&mut self, head: Option<AtomId>, body: &[(AtomId, bool)]) {
        self.program.add_rule(ProgramRule {
            head: head.map_or(Head::Falsum, Head::Atom),
            body: body.to_vec(),
        });
    }

    fn add_nogood(&mut self, nogood: &Nogood) {
        let mut assignment = Vec::with_capacity(nogood.len());
        for literal in nogood {
            match self.ids.get(&literal.atom) {
                Some(id) => assignment.push((*id, literal.positive)),
                // The program never mentions the atom, so it's false.
                None if literal.positive => return,
                None => {}
            }
        }

        let stream = self.stream.get_or_insert_with(|| self.program.solve());
        stream.add_nogood(&satumerator::Nogood::new(assignment));
    }

    fn solve(&mut self) {
        if let Some(stream) = &self.stream {
            log::debug!("restarting model stream after {} models", stream.models());
        }
        self.stream = Some(self.program.solve());
    }

    fn next_model(&mut self) -> Option<Model> {
        let stream = self.stream.get_or_insert_with(|| self.program.solve());
        let model = stream.next_model()?;

        Some(
            model
                .into_iter()
                .map(|id| &self.atoms[id.0 as usize])
                .filter(|atom| self.is_shown(atom))
                .cloned()
                .collect(),
        )
    }
}

#[cfg(test)]
fn models(backend: &mut SatBackend) -> Vec<Vec<String>> {
    let mut ret: Vec<Vec<String>> = std::iter::from_fn(|| backend.next_model())
        .map(|model| model.iter().map(ToString::to_string).collect())
        .collect();
    ret.sort();
    ret
}

#[test]
fn test_fragments_and_show() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut backend = SatBackend::new();
    backend
        .add(
            "base",
            &[],
            "{a; b}. c :- a, not b. :- b. #show a/0. #show c/0.",
        )
        .expect("ok");
    backend.ground("base", &[]).expect("ok");

    assert_eq!(
        models(&mut backend),
        vec![Vec::<String>::new(), vec!["a".to_string(), "c".to_string()]]
    );
}

#[test]
fn test_fragment_errors() {
    let mut backend = SatBackend::new();
    assert!(matches!(
        backend.ground("base", &[]),
        Err(Error::UnknownFragment(name)) if name == "base"
    ));

    backend.add("window", &["n"], "p(n).").expect("ok");
    assert!(matches!(
        backend.ground("window", &[]),
        Err(Error::FragmentArity {
            expected: 1,
            found: 0,
            ..
        })
    ));
    assert!(matches!(
        backend.add("window", &[], "q."),
        Err(Error::FragmentArity { .. })
    ));
    assert!(matches!(
        backend.add("base", &[], "p(X)."),
        Err(Error::Parse(_))
    ));
}

#[test]
fn test_window_externals() {
    let mut backend = SatBackend::new();
    backend
        .add("base", &[], "{size(1); size(2)}. :- size(1), size(2).")
        .expect("ok");
    backend
        .add(
            "window",
            &["n"],
            "#external on(n). :- on(n), not size(n).",
        )
        .expect("ok");
    backend.ground("base", &[]).expect("ok");

    backend.ground("window", &[2]).expect("ok");
    let on2 = GroundAtom::ints("on", [2]);
    backend.assign_external(&on2, true);
    backend.solve();
    assert_eq!(
        models(&mut backend),
        vec![vec!["on(2)".to_string(), "size(2)".to_string()]]
    );

    backend.release_external(&on2);
    backend.ground("window", &[1]).expect("ok");
    backend.assign_external(&GroundAtom::ints("on", [1]), true);
    backend.solve();
    assert_eq!(
        models(&mut backend),
        vec![vec!["on(1)".to_string(), "size(1)".to_string()]]
    );
}

#[test]
fn test_rules_and_stream_nogoods() {
    let mut backend = SatBackend::new();
    backend.add("base", &[], "{a; b}.").expect("ok");
    backend.ground("base", &[]).expect("ok");

    // A nogood only lasts for the current stream.
    let nogood: Nogood = [crate::ground::GroundLiteral::pos(GroundAtom::new("a", []))]
        .into_iter()
        .collect();
    backend.add_nogood(&nogood);
    assert_eq!(models(&mut backend).len(), 2);

    backend.solve();
    assert_eq!(models(&mut backend).len(), 4);

    // A rule lasts.
    let a = backend.add_atom(&GroundAtom::new("a", []));
    let b = backend.add_atom(&GroundAtom::new("b", []));
    backend.add_rule(None, &[(a, true), (b, false)]);
    backend.solve();
    assert_eq!(models(&mut backend).len(), 3);
    assert_eq!(backend.rules(), 2);

    // Unknown positive atoms can never apply.
    backend.solve();
    let ghost: Nogood = [crate::ground::GroundLiteral::pos(GroundAtom::new("ghost", []))]
        .into_iter()
        .collect();
    backend.add_nogood(&ghost);
    assert_eq!(models(&mut backend).len(), 3);
}

#[test]
fn test_heuristics() {
    let mut backend = SatBackend::new();
    backend
        .add(
            "base",
            &[],
            "{size(1); size(2)}. :- size(1), size(2). :- not size(1), not size(2).
             #heuristic size(1). [999, true]
             #heuristic size(2). [998, true]",
        )
        .expect("ok");
    backend.ground("base", &[]).expect("ok");

    assert_eq!(
        backend.next_model().map(|model| model.into_iter().collect::<Vec<_>>()),
        Some(vec![GroundAtom::ints("size", [1])])
    );
    assert_eq!(
        backend.next_model().map(|model| model.into_iter().collect::<Vec<_>>()),
        Some(vec![GroundAtom::ints("size", [2])])
    );
    assert_eq!(backend.next_model(), None);
}

//! Size windows.  Each dimension has one external atom per value, and
//! at most one of them is assigned true at any time: moving a window
//! releases the old value before the new one is assigned.
use crate::backend::AspBackend;
use crate::error::Result;
use crate::ground::GroundAtom;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Dimension {
    /// Program size, in literals.
    Literals,
    Vars,
    Rules,
}

impl Dimension {
    /// The fragment that defines this dimension's external.
    #[must_use]
    pub fn fragment(self) -> &'static str {
        match self {
            Dimension::Literals => "number_of_literals",
            Dimension::Vars => "number_of_vars",
            Dimension::Rules => "number_of_rules",
        }
    }

    fn param(self) -> &'static str {
        match self {
            Dimension::Literals => "n",
            Dimension::Vars => "v",
            Dimension::Rules => "r",
        }
    }

    fn external(self) -> &'static str {
        match self {
            Dimension::Literals => "size_in_literals",
            Dimension::Vars => "size_in_vars",
            Dimension::Rules => "size_in_rules",
        }
    }

    /// The hypothesis-space atom the window pins.
    fn measure(self) -> &'static str {
        match self {
            Dimension::Literals => "size",
            Dimension::Vars => "num_vars",
            Dimension::Rules => "num_rules",
        }
    }

    /// Registers this dimension's fragment with `backend`.
    pub(super) fn register<B: AspBackend>(self, backend: &mut B) -> Result<()> {
        let (external, param, measure) = (self.external(), self.param(), self.measure());
        let text = format!(
            "#external {external}({param}).\n:- {external}({param}), not {measure}({param}).",
        );
        backend.add(self.fragment(), &[param], &text)
    }

    #[must_use]
    pub fn atom(self, value: i64) -> GroundAtom {
        GroundAtom::ints(self.external(), [value])
    }
}

/// The currently assigned value of each window.
#[derive(Debug, Default)]
pub(super) struct Windows {
    assigned: BTreeMap<Dimension, i64>,
}

impl Windows {
    /// Moves `dimension`'s window to `value`: releases a different
    /// assigned value, grounds the fragment for `value` and assigns
    /// its external.
    pub(super) fn update<B: AspBackend>(
        &mut self,
        backend: &mut B,
        dimension: Dimension,
        value: i64,
    ) -> Result<()> {
        if let Some(old) = self.assigned.get(&dimension).copied() {
            if old != value {
                log::trace!("releasing {}", dimension.atom(old));
                backend.release_external(&dimension.atom(old));
            }
        }

        backend.ground(dimension.fragment(), &[value])?;
        backend.assign_external(&dimension.atom(value), true);
        self.assigned.insert(dimension, value);
        Ok(())
    }

    #[must_use]
    pub(super) fn get(&self, dimension: Dimension) -> Option<i64> {
        self.assigned.get(&dimension).copied()
    }
}

#[cfg(test)]
use crate::backend::SatBackend;

#[test]
fn test_window_moves() {
    let mut backend = SatBackend::new();
    backend
        .add(
            "base",
            &[],
            "{size(1); size(2); size(3)}. :- size(1), size(2). :- size(1), size(3). :- size(2), size(3).",
        )
        .expect("ok");
    backend.ground("base", &[]).expect("ok");
    Dimension::Literals.register(&mut backend).expect("ok");

    let mut windows = Windows::default();
    let sizes = |backend: &mut SatBackend| {
        let mut ret: Vec<i64> = std::iter::from_fn(|| backend.next_model())
            .flat_map(|model| {
                model
                    .into_iter()
                    .filter(|atom| &*atom.predicate == "size")
                    .filter_map(|atom| atom.arguments[0].as_int())
                    .collect::<Vec<_>>()
            })
            .collect();
        ret.sort();
        ret
    };

    for value in [2, 3, 1, 2] {
        windows
            .update(&mut backend, Dimension::Literals, value)
            .expect("ok");
        backend.solve();
        assert_eq!(windows.get(Dimension::Literals), Some(value));
        assert_eq!(sizes(&mut backend), vec![value]);
    }
    assert_eq!(windows.get(Dimension::Vars), None);
}

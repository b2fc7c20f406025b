//! In order to represent our search space in CryptoMiniSat, we need a
//! mapping between variable id (u32) and StateAtom.  Auxiliary
//! variables (Tseitin outputs, rule bodies) have no meaning and are
//! only ever referenced by `Lit`.
//!
//! CryptoMiniSat needs us to explicitly register new variables, so
//! every variable goes through `new_var`, which keeps `from_id` in
//! lockstep with the solver's variable count.
use super::StateAtom;
use cryptominisat::Lbool;
use cryptominisat::Lit;
use cryptominisat::Solver;
use std::collections::HashMap;

pub struct SolverState<A: StateAtom> {
    from_id: Vec<Option<A>>,
    to_id: HashMap<A, Lit>,
    solver: Solver,
}

/// A `SolverState` owns a CryptoMiniSat solver, and maintains a
/// mapping between variable id and the atom they stand for, while
/// creating new variables on demand.
impl<A: StateAtom> SolverState<A> {
    /// Returns a fresh `SolverState` instance.
    pub fn new() -> Self {
        Self {
            from_id: Vec::new(),
            to_id: HashMap::new(),
            solver: Solver::new(),
        }
    }

    /// Returns a `Lit`eral for every `Item` in `wanted`.
    pub fn atoms_vars<Iter, Result>(&mut self, wanted: Iter) -> Result
    where
        Iter: IntoIterator<Item = A>,
        Result: std::iter::FromIterator<Lit>,
    {
        wanted
            .into_iter()
            .map(|atom| self.atom_var(atom))
            .collect::<Result>()
    }

    /// Returns the variable for `atom`, creating it if needed.
    pub fn atom_var(&mut self, atom: A) -> Lit {
        if let Some(id) = self.to_id.get(&atom) {
            return *id;
        }

        let var = self.new_var(Some(atom.clone()));
        self.to_id.insert(atom, var);
        var
    }

    /// Returns the variable for `atom`, if it was ever registered.
    pub fn lookup(&self, atom: &A) -> Option<Lit> {
        self.to_id.get(atom).copied()
    }

    /// Returns a fresh auxiliary variable.
    pub fn fresh_var(&mut self) -> Lit {
        self.new_var(None)
    }

    /// Returns the atom associated with `var`, if any.
    pub fn meaning(&self, var: Lit) -> Option<&A> {
        match self.from_id.get(var.var() as usize) {
            Some(Some(ret)) => Some(ret),
            _ => None,
        }
    }

    /// Iterates over every registered atom and its (positive) literal,
    /// in creation order.
    pub fn atoms(&self) -> impl Iterator<Item = (&A, Lit)> + '_ {
        self.from_id
            .iter()
            .filter_map(|meaning| meaning.as_ref())
            .map(move |atom| (atom, self.to_id[atom]))
    }

    /// Returns the solver.
    pub fn solver(&mut self) -> &mut Solver {
        &mut self.solver
    }

    /// Returns whether `lit` holds in the last model found by the
    /// solver.
    pub fn holds(&self, lit: Lit) -> bool {
        let value = match self.solver.get_model().get(lit.var() as usize) {
            Some(Lbool::True) => true,
            Some(Lbool::False) => false,
            #[cfg(not(tarpaulin_include))]
            other => panic!("Undefined value in model for {:?}: {:?}", lit, other),
        };

        value != lit.isneg()
    }

    /// Creates a new variable in the solver, and registers it in
    /// `from_id`.
    fn new_var(&mut self, wanted: Option<A>) -> Lit {
        assert!(self.from_id.len() >= self.to_id.len());
        assert_eq!(self.from_id.len(), self.solver.nvars() as usize);

        let var = self.solver.new_var();
        assert_eq!(var.var() as usize, self.from_id.len());

        self.from_id.push(wanted);
        var
    }
}

impl<A: StateAtom> Default for SolverState<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[test]
fn test_atom_var_stable() {
    let mut state = SolverState::<String>::new();

    let x = state.atom_var("x".into());
    let aux = state.fresh_var();
    let y = state.atom_var("y".into());

    assert_eq!(state.atom_var("x".into()), x);
    assert_ne!(x, y);
    assert_eq!(state.meaning(x), Some(&"x".to_string()));
    assert_eq!(state.meaning(aux), None);
    assert_eq!(state.lookup(&"z".to_string()), None);
}

//! We must translate out high-level constraints (e.g., "at most one
//! of these must be true") to CNF clauses in order to use SAT.  This
//! module handles that translation.
use cryptominisat::Lit;
use cryptominisat::Solver;

/// Add a nogood for `vars`.
pub fn add_nogood(solver: &mut Solver, nogood: &[Lit]) {
    // We don't want solutions where all the literals are satisfied.
    // In other words, at least one of them must be violated, i.e.
    // at least one of their complements must be true.
    solver.add_clause(&nogood.iter().map(|x| !*x).collect::<Vec<_>>());
}

/// At least one of `vars` must be true.  An empty `vars` makes the
/// instance infeasible.
pub fn add_at_least_one_constraint(solver: &mut Solver, vars: &[Lit]) {
    solver.add_clause(vars);
}

/// At most one of `vars` may be true: the pairwise encoding, one
/// binary clause per pair.
pub fn add_at_most_one_constraint(solver: &mut Solver, vars: &[Lit]) {
    for (i, x) in vars.iter().enumerate() {
        for y in &vars[i + 1..] {
            solver.add_clause(&[!*x, !*y]);
        }
    }
}

/// Constrains `output` to be equivalent to the conjunction of
/// `inputs`.
pub fn add_tseitin_and(solver: &mut Solver, output: Lit, inputs: &[Lit]) {
    for input in inputs {
        solver.add_clause(&[!output, *input]);
    }

    let mut clause: Vec<Lit> = inputs.iter().map(|x| !*x).collect();
    clause.push(output);
    solver.add_clause(&clause);
}

/// Adds `lhs -> (rhs[0] | rhs[1] | ...)`.  With an empty `rhs`, that's
/// just `!lhs`.
pub fn add_implies_any(solver: &mut Solver, lhs: Lit, rhs: &[Lit]) {
    let mut clause = Vec::with_capacity(rhs.len() + 1);
    clause.push(!lhs);
    clause.extend_from_slice(rhs);
    solver.add_clause(&clause);
}

#[test]
fn test_nogood() {
    use cryptominisat::Lbool;

    let mut solver = Solver::new();
    let (x, y, z) = (solver.new_var(), solver.new_var(), solver.new_var());

    // Add a nogood for (x, y, z)
    add_nogood(&mut solver, &[x, y, z]);

    // The constraint set is feasible.
    assert_eq!(solver.solve(), Lbool::True);
    // Iterate over the truth value for all 3 variables
    for values in 0..8 {
        let x_value = (values & 1) != 0;
        let y_value = (values & 2) != 0;
        let z_value = (values & 4) != 0;
        let assumptions = [
            Lit::new(x.var(), !x_value).expect("ok"),
            Lit::new(y.var(), !y_value).expect("ok"),
            Lit::new(z.var(), !z_value).expect("ok"),
        ];
        // Should be true if `values != 7` (if variables not all true).
        let expected = if values == 7 {
            Lbool::False
        } else {
            Lbool::True
        };

        assert_eq!(solver.solve_with_assumptions(&assumptions), expected);
    }
}

#[test]
fn test_at_most_one() {
    use cryptominisat::Lbool;

    let mut solver = Solver::new();
    let (x, y, z) = (solver.new_var(), solver.new_var(), solver.new_var());

    add_at_most_one_constraint(&mut solver, &[x, y, z]);

    assert_eq!(solver.solve_with_assumptions(&[x, !y, !z]), Lbool::True);
    assert_eq!(solver.solve_with_assumptions(&[!x, !y, !z]), Lbool::True);
    assert_eq!(solver.solve_with_assumptions(&[x, z]), Lbool::False);
    assert_eq!(solver.solve_with_assumptions(&[y, z]), Lbool::False);
}

#[test]
fn test_tseitin_and() {
    use cryptominisat::Lbool;

    let mut solver = Solver::new();
    let (out, x, y) = (solver.new_var(), solver.new_var(), solver.new_var());

    add_tseitin_and(&mut solver, out, &[x, !y]);

    assert_eq!(solver.solve_with_assumptions(&[x, !y, !out]), Lbool::False);
    assert_eq!(solver.solve_with_assumptions(&[x, y, out]), Lbool::False);
    assert_eq!(solver.solve_with_assumptions(&[x, !y, out]), Lbool::True);
    assert_eq!(solver.solve_with_assumptions(&[!x, !out]), Lbool::True);
}

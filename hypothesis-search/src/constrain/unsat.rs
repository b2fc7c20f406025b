//! Unsatisfiable bodies bypass rule slot placeholders: every typed,
//! injective placement of the body's variables is forbidden in every
//! rule slot.
use super::Compiler;
use crate::ground::ground_argument;
use crate::ground::GroundAtom;
use crate::ground::GroundLiteral;
use crate::ground::Nogood;
use crate::ground::Value;
use crate::logic::Program;

impl Compiler {
    pub(super) fn unsat_nogoods(&mut self, program: &Program) -> Vec<Nogood> {
        let mut nogoods = Vec::new();
        for rule in program {
            let assignments = self.grounder.find_deep_bindings4(
                &rule.body,
                self.max_rules,
                self.max_vars,
                &self.types,
            );

            for slot in 0..self.max_rules as i64 {
                for assignment in assignments.iter() {
                    let nogood: Nogood = rule
                        .body_atoms()
                        .map(|atom| {
                            GroundLiteral::pos(GroundAtom::new(
                                "body_literal",
                                [
                                    Value::Int(slot),
                                    Value::Const(atom.predicate.clone()),
                                    Value::Int(atom.arity() as i64),
                                    Value::Tuple(
                                        atom.arguments
                                            .iter()
                                            .map(|arg| ground_argument(arg, assignment))
                                            .collect(),
                                    ),
                                ],
                            ))
                        })
                        .collect();
                    nogoods.push(nogood);
                }
            }
        }

        log::debug!("unsat: {} nogoods", nogoods.len());
        nogoods
    }
}

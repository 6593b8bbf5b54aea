//! Random formula DAGs for property tests.
use proptest::{prelude::*, test_runner::TestRng, *};

use rand::Rng;

use crate::factory::FormulaFactory;
use crate::formula::{BinaryOp, Comparator, Formula, NaryOp, PbLiteral};

/// One node of a [`FormulaRecipe`], referring to earlier steps by index.
#[derive(Clone, Debug)]
pub enum RecipeStep {
    Const(bool),
    Literal(usize, bool),
    Not(usize),
    Binary(BinaryOp, usize, usize),
    Nary(NaryOp, Vec<usize>),
    PseudoBoolean(Comparator, i64, Vec<(usize, bool, i64)>),
}

/// Factory independent description of a formula DAG with a list of roots.
///
/// Building the same recipe with a caching and a non-caching factory yields structurally equal
/// roots, with shared nodes only in the caching case.
#[derive(Clone, Debug)]
pub struct FormulaRecipe {
    pub steps: Vec<RecipeStep>,
    pub roots: Vec<usize>,
}

impl FormulaRecipe {
    /// Builds all steps and returns the roots.
    pub fn build(&self, factory: &mut FormulaFactory) -> Vec<Formula> {
        let mut built: Vec<Formula> = Vec::with_capacity(self.steps.len());
        for step in self.steps.iter() {
            let formula = match step {
                &RecipeStep::Const(value) => factory.constant(value),
                &RecipeStep::Literal(var, phase) => factory.literal(var_name(var), phase),
                &RecipeStep::Not(operand) => factory.not(built[operand].clone()),
                &RecipeStep::Binary(op, left, right) => {
                    factory.binary(op, built[left].clone(), built[right].clone())
                }
                RecipeStep::Nary(op, operands) => {
                    factory.nary(*op, operands.iter().map(|&index| built[index].clone()))
                }
                RecipeStep::PseudoBoolean(comparator, rhs, terms) => factory.pbc(
                    *comparator,
                    *rhs,
                    terms
                        .iter()
                        .map(|&(var, phase, _)| PbLiteral::new(var_name(var), phase))
                        .collect(),
                    terms.iter().map(|&(_, _, coefficient)| coefficient).collect(),
                ),
            };
            built.push(formula);
        }
        self.roots
            .iter()
            .map(|&index| built[index].clone())
            .collect()
    }
}

pub fn var_name(var: usize) -> String {
    format!("v{}", var)
}

/// Generate a random formula DAG.
///
/// Steps refer to earlier steps, so later steps tend to share many sub-formulas. Roots may repeat.
pub fn formula_recipe(
    vars: impl Strategy<Value = usize>,
    steps: impl Strategy<Value = usize>,
    roots: impl Strategy<Value = usize>,
) -> impl Strategy<Value = FormulaRecipe> {
    (vars, steps, roots).prop_flat_map(|(vars, steps, roots)| {
        let vars = vars.max(1);
        let steps = steps.max(1);
        Just(()).prop_perturb(move |_, mut rng| {
            let mut recipe = FormulaRecipe {
                steps: vec![],
                roots: vec![],
            };

            for index in 0..steps {
                let kind = if index == 0 { 0 } else { rng.gen_range(0, 8) };
                let earlier = |rng: &mut TestRng| rng.gen_range(0, index);
                let step = match kind {
                    0 | 1 => RecipeStep::Literal(rng.gen_range(0, vars), rng.gen()),
                    2 => RecipeStep::Not(earlier(&mut rng)),
                    3 => {
                        let op = if rng.gen() {
                            BinaryOp::Impl
                        } else {
                            BinaryOp::Equiv
                        };
                        RecipeStep::Binary(op, earlier(&mut rng), earlier(&mut rng))
                    }
                    4 | 5 => {
                        let op = if rng.gen() { NaryOp::And } else { NaryOp::Or };
                        let len = rng.gen_range(0, 5);
                        RecipeStep::Nary(op, (0..len).map(|_| earlier(&mut rng)).collect())
                    }
                    6 => {
                        let comparator = [
                            Comparator::Eq,
                            Comparator::Lt,
                            Comparator::Le,
                            Comparator::Gt,
                            Comparator::Ge,
                        ][rng.gen_range(0, 5)];
                        let len = rng.gen_range(0, 4);
                        let terms: Vec<(usize, bool, i64)> = (0..len)
                            .map(|_| (rng.gen_range(0, vars), rng.gen(), rng.gen_range(-5, 6)))
                            .collect();
                        RecipeStep::PseudoBoolean(comparator, rng.gen_range(-10, 11), terms)
                    }
                    _ => RecipeStep::Const(rng.gen()),
                };
                recipe.steps.push(step);
            }

            for _ in 0..roots.max(1) {
                recipe.roots.push(rng.gen_range(0, steps));
            }

            recipe
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn recipes_build_equal_formulas(
            recipe in formula_recipe(1..10usize, 1..50usize, 1..5usize),
        ) {
            let shared = recipe.build(&mut FormulaFactory::caching());
            let unshared = recipe.build(&mut FormulaFactory::non_caching());

            prop_assert_eq!(shared.len(), recipe.roots.len());
            prop_assert_eq!(shared, unshared);
        }
    }
}

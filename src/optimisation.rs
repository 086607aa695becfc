//! Formulation of the sizing and dispatch optimisation.
//!
//! A model is built in two stages. First, every decision variable for a node is allocated (see
//! [`variables`]). Then the constraint builders add rows and accumulate the node's costs, which
//! are combined into the objective (see [`objective`]). The finished [`Problem`] is only handed to
//! the solver in [`solve`].
use crate::financial::ObjectiveFactors;
use crate::scenario::Scenario;

mod constraints;
pub mod objective;
mod problem;
pub mod solve;
pub mod variables;

use constraints::add_node_constraints;
use objective::CostExpressions;
pub use problem::{Column, LinearExpr, Problem, Row, Variable};
use variables::NodeVariables;

/// How costs are counted in the objective
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormulationMode {
    /// Lifecycle costs, discounted and after tax, including capital
    Lifecycle,
    /// Costs over a single horizon with fixed sizes, as for rolling-horizon control
    Control {
        /// Reward per kWh of energy left in storage at the end of the horizon
        soc_preservation_weight: f64,
    },
}

/// Everything the constraint builders need for one node
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    /// The scenario being modelled
    pub scenario: &'a Scenario,
    /// How costs are counted
    pub mode: FormulationMode,
    /// Present-worth factors and tax rates
    pub factors: ObjectiveFactors,
    /// The node's variables
    pub vars: NodeVariables,
    /// Costs accumulated by the constraint builders
    pub costs: CostExpressions,
}

impl<'a> BuildContext<'a> {
    /// Allocate the variables for a node, ready for constraints to be added
    pub fn new(problem: &mut Problem, scenario: &'a Scenario, mode: FormulationMode) -> Self {
        let factors = match mode {
            FormulationMode::Lifecycle => scenario.financial.factors(),
            FormulationMode::Control { .. } => ObjectiveFactors::single_horizon(),
        };

        Self {
            scenario,
            mode,
            factors,
            vars: NodeVariables::allocate(problem, scenario),
            costs: CostExpressions::default(),
        }
    }

    /// The node's contribution to the objective
    pub fn objective(&self) -> LinearExpr {
        let mut objective = self.costs.total(&self.factors);
        if let FormulationMode::Control {
            soc_preservation_weight,
        } = self.mode
        {
            for storage_vars in self.vars.storage.values() {
                if let Some(&final_soc) = storage_vars.soc.last() {
                    objective.add_term(final_soc, -soc_preservation_weight);
                }
            }
        }

        objective
    }
}

/// A problem ready to be solved, with the contexts needed to read its solution
#[derive(Debug, Clone)]
pub struct BuiltModel<'a> {
    /// The problem
    pub problem: Problem,
    /// One context per node, in the order the nodes were given
    pub nodes: Vec<BuildContext<'a>>,
    /// The quantity to minimise: the sum of every node's objective
    pub objective: LinearExpr,
}

/// Build the variables and constraints for one node of a problem
pub fn build_node<'a>(
    problem: &mut Problem,
    scenario: &'a Scenario,
    mode: FormulationMode,
) -> BuildContext<'a> {
    let mut ctx = BuildContext::new(problem, scenario, mode);
    add_node_constraints(problem, &mut ctx);
    ctx
}

/// Build a problem covering one or more nodes, each with its own variables.
///
/// The nodes are independent, so the objective is the sum of their costs.
pub fn build_model<'a>(scenarios: &[&'a Scenario], mode: FormulationMode) -> BuiltModel<'a> {
    let mut problem = Problem::default();
    let nodes: Vec<_> = scenarios
        .iter()
        .map(|&scenario| build_node(&mut problem, scenario, mode))
        .collect();
    let objective = nodes.iter().map(BuildContext::objective).sum();

    BuiltModel {
        problem,
        nodes,
        objective,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::scenario;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_control_mode_ignores_discounting(scenario: Scenario) {
        let mut problem = Problem::default();
        let mode = FormulationMode::Control {
            soc_preservation_weight: 0.0,
        };
        let ctx = BuildContext::new(&mut problem, &scenario, mode);
        assert_approx_eq!(f64, ctx.factors.pwf_e, 1.0);
        assert!(!ctx.factors.include_capital);
    }

    #[rstest]
    fn test_control_mode_rewards_final_soc(scenario: Scenario) {
        let mut problem = Problem::default();
        let mode = FormulationMode::Control {
            soc_preservation_weight: 0.01,
        };
        let ctx = build_node(&mut problem, &scenario, mode);
        let objective = ctx.objective();
        for storage_vars in ctx.vars.storage.values() {
            let final_soc = *storage_vars.soc.last().unwrap();
            assert!(
                objective
                    .terms()
                    .iter()
                    .any(|&(var, coeff)| var == final_soc && coeff == -0.01)
            );
        }
    }

    #[rstest]
    fn test_multi_node_objective_is_sum(scenario: Scenario) {
        let other = scenario.clone();
        let model = build_model(&[&scenario, &other], FormulationMode::Lifecycle);
        assert_eq!(model.nodes.len(), 2);

        // Any assignment of values gives the same total
        let solution = vec![1.0; model.problem.num_cols()];
        let sum: f64 = model
            .nodes
            .iter()
            .map(|ctx| ctx.objective().value(&solution))
            .sum();
        assert_approx_eq!(f64, model.objective.value(&solution), sum, epsilon = 1e-6);
    }
}

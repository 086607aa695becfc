//! Several independent sites optimised as one problem.
use crate::optimisation::solve::{SolveStatus, SolverOptions, solve};
use crate::optimisation::{FormulationMode, build_model};
use crate::results::{self, ResultSet, SOLVER_SECONDS_DECIMAL_PLACES, round_to};
use crate::scenario::{Node, Scenario};
use crate::technology::TechClass;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::info;
use serde::Serialize;

/// The results of a multi-node run
#[derive(Debug, Clone, Serialize)]
pub struct MultiNodeResults {
    /// Termination status of the single solve
    pub status: SolveStatus,
    /// Wall-clock time spent in the solver
    pub solver_seconds: f64,
    /// Results for each node, keyed by node ID
    pub nodes: IndexMap<u32, ResultSet>,
    /// The objective value, which equals the sum of every node's life-cycle cost
    pub total_costs: Option<f64>,
}

/// Check that a node can be included in a multi-node problem
fn check_node(node: &Node) -> Result<()> {
    node.scenario
        .validate()
        .with_context(|| format!("Invalid scenario for node {}", node.id))?;
    ensure!(
        node.scenario.outage.is_none(),
        "Node {}: outages cannot be modelled in multi-node runs",
        node.id
    );
    ensure!(
        !node.scenario.has_class(TechClass::Generator),
        "Node {}: generators cannot be modelled in multi-node runs",
        node.id
    );

    Ok(())
}

/// Size and dispatch several sites with a single solve
pub fn run_multi_node(nodes: &[Node], options: &SolverOptions) -> Result<MultiNodeResults> {
    ensure!(!nodes.is_empty(), "At least one node must be given");
    for node in nodes {
        check_node(node)?;
    }

    let scenarios: Vec<&Scenario> = nodes.iter().map(|node| &node.scenario).collect();
    let model = build_model(&scenarios, FormulationMode::Lifecycle);
    info!(
        "Built multi-node model for {} nodes with {} columns and {} rows",
        nodes.len(),
        model.problem.num_cols(),
        model.problem.num_rows()
    );

    let outcome = solve(model.problem, model.objective, options)
        .context("Failed to solve multi-node model")?;
    info!("Solved multi-node model: {}", outcome.status());

    let node_results = nodes
        .iter()
        .zip(&model.nodes)
        .map(|(node, ctx)| (node.id, results::from_outcome(ctx, &outcome)))
        .collect();
    let total_costs = outcome
        .solution()
        .map(|solved| round_to(solved.objective_value, 2));

    Ok(MultiNodeResults {
        status: outcome.status(),
        solver_seconds: round_to(outcome.solver_seconds(), SOLVER_SECONDS_DECIMAL_PLACES),
        nodes: node_results,
        total_costs,
    })
}

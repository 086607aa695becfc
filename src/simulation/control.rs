//! Dispatch with fixed sizes over an arbitrary horizon, for rolling-horizon control.
use super::group_technology_classes;
use crate::optimisation::solve::{SolverOptions, solve};
use crate::optimisation::{FormulationMode, Problem, build_node};
use crate::results::{self, ResultSet};
use crate::scenario::Scenario;
use anyhow::{Context, Result};
use log::info;

/// Dispatch a site's existing equipment over the scenario's horizon.
///
/// Technology and storage sizes are fixed to existing capacity and costs are not discounted or
/// taxed. Stored energy left at the end of the horizon is rewarded by `soc_preservation_weight`
/// per kWh, so that short horizons don't drain storage. Result keys carry no `year_one_` prefix.
pub fn run_control(
    scenario: &Scenario,
    options: &SolverOptions,
    soc_preservation_weight: f64,
) -> Result<ResultSet> {
    scenario.validate()?;
    let fixed = scenario.with_fixed_sizes(&|_| None, &|_| None);
    let mode = FormulationMode::Control {
        soc_preservation_weight,
    };

    let mut problem = Problem::default();
    let ctx = build_node(&mut problem, &fixed, mode);
    let objective = ctx.objective();
    info!(
        "Built control model over {} time steps",
        fixed.time_index.len()
    );

    let outcome = solve(problem, objective, options).context("Failed to solve control model")?;
    info!("Solved control model: {}", outcome.status());

    let mut results = results::from_outcome(&ctx, &outcome);
    group_technology_classes(&mut results, &fixed);

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::scenario;
    use crate::optimisation::solve::SolveStatus;
    use rstest::rstest;

    #[rstest]
    fn test_run_control(scenario: Scenario) {
        let results = run_control(&scenario, &SolverOptions::default(), 0.0).unwrap();
        assert_eq!(results.status, SolveStatus::Optimal);

        // Keys are unprefixed and sizes stay at existing capacity
        assert!(results.get("ElectricTariff", "bill").is_some());
        assert!(results.get("ElectricTariff", "year_one_bill").is_none());
        assert_eq!(results.scalar("pv", "size_kw"), Some(10.0));
        assert_eq!(results.scalar("generator", "size_kw"), Some(0.0));
    }
}

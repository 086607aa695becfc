//! Microgrid sizing and the cost of outages.
use super::{Metric, ResultSet, round_series, round_to};
use crate::optimisation::BuildContext;
use itertools::Itertools;

/// Comma-separated IDs whose "used" binary is set
fn used_ids<'a>(ids: impl Iterator<Item = (&'a str, f64)>) -> String {
    ids.filter(|(_, used)| *used > 0.5).map(|(id, _)| id).join(",")
}

/// Add the `Outages` category, if outages are modelled
pub(super) fn add_outage_metrics(results: &mut ResultSet, ctx: &BuildContext, values: &[f64]) {
    const CATEGORY: &str = "Outages";
    let scenario = ctx.scenario;
    let (Some(outage), Some(mg)) = (&scenario.outage, &ctx.vars.microgrid) else {
        return;
    };
    let dt = scenario.time_index.step_hours();

    let upgrade_cost: f64 = mg
        .tech_upgrade_cost
        .values()
        .chain(mg.storage_upgrade_cost.values())
        .map(|var| var.value(values))
        .sum();
    let fuel_cost: f64 = mg
        .windows
        .iter()
        .flat_map(|window| {
            window.fuel.iter().map(move |(tech_id, fuel)| {
                let cost_per_unit = scenario.technologies[tech_id]
                    .fuel
                    .map_or(0.0, |params| params.cost_per_unit);
                outage.window_probability(window.scenario) * cost_per_unit * fuel.value(values)
            })
        })
        .sum();
    let unserved_kwh = mg.windows.iter().map(|window| {
        window
            .unserved
            .iter()
            .map(|var| var.value(values))
            .sum::<f64>()
            * dt
    });

    results.insert(
        CATEGORY,
        "expected_outage_cost",
        Metric::Scalar(round_to(mg.expected_outage_cost.value(values), 2)),
    );
    results.insert(
        CATEGORY,
        "microgrid_upgrade_cost",
        Metric::Scalar(round_to(upgrade_cost, 2)),
    );
    results.insert(
        CATEGORY,
        "expected_microgrid_fuel_cost",
        Metric::Scalar(round_to(fuel_cost, 2)),
    );
    results.insert(
        CATEGORY,
        "unserved_load_per_outage_kwh",
        round_series(unserved_kwh),
    );
    results.insert(
        CATEGORY,
        "microgrid_techs",
        Metric::Text(used_ids(
            mg.tech_used
                .iter()
                .map(|(id, var)| (id.0.as_ref(), var.value(values))),
        )),
    );
    results.insert(
        CATEGORY,
        "microgrid_storage",
        Metric::Text(used_ids(
            mg.storage_used
                .iter()
                .map(|(id, var)| (id.0.as_ref(), var.value(values))),
        )),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{outage_scenarios, scenario};
    use crate::optimisation::solve::SolveStatus;
    use crate::optimisation::{FormulationMode, Problem, build_node};
    use crate::scenario::Scenario;
    use rstest::rstest;

    #[rstest]
    fn test_no_outage_category_without_outages(scenario: Scenario) {
        let mut problem = Problem::default();
        let ctx = build_node(&mut problem, &scenario, FormulationMode::Lifecycle);
        let mut results = ResultSet::new(SolveStatus::Optimal, 0.0);
        add_outage_metrics(&mut results, &ctx, &vec![0.0; problem.num_cols()]);
        assert!(!results.categories.contains_key("Outages"));
    }

    #[rstest]
    fn test_outage_metrics(scenario: Scenario) {
        let mut scenario = scenario;
        scenario.outage = Some(outage_scenarios(scenario.time_index.len()));
        let mut problem = Problem::default();
        let ctx = build_node(&mut problem, &scenario, FormulationMode::Lifecycle);

        let mut values = vec![0.0; problem.num_cols()];
        let mg = ctx.vars.microgrid.as_ref().unwrap();
        values[mg.tech_used["generator"].index()] = 1.0;
        let mut results = ResultSet::new(SolveStatus::Optimal, 0.0);
        add_outage_metrics(&mut results, &ctx, &values);

        assert_eq!(
            results.get("Outages", "microgrid_techs"),
            Some(&Metric::Text("generator".into()))
        );
        assert_eq!(
            results
                .series("Outages", "unserved_load_per_outage_kwh")
                .unwrap()
                .len(),
            mg.windows.len()
        );
    }
}

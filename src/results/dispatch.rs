//! Grid, load, technology and storage dispatch.
use super::{Keys, Metric, ResultSet, round_series, round_to};
use crate::optimisation::{BuildContext, Variable};

/// Sum several families of variables at each time step
fn sum_series<'a>(
    families: impl IntoIterator<Item = &'a Vec<Variable>>,
    len: usize,
    values: &[f64],
) -> Vec<f64> {
    let mut total = vec![0.0; len];
    for family in families {
        for (sum, var) in total.iter_mut().zip(family) {
            *sum += var.value(values);
        }
    }
    total
}

/// Add the `ElectricUtility` category
pub(super) fn add_utility_metrics(
    results: &mut ResultSet,
    ctx: &BuildContext,
    values: &[f64],
    keys: Keys,
) {
    const CATEGORY: &str = "ElectricUtility";
    let scenario = ctx.scenario;
    let dt = scenario.time_index.step_hours();

    let purchases: Vec<f64> = ctx
        .vars
        .tariff
        .grid_purchase
        .iter()
        .map(|tiers| tiers.iter().map(|var| var.value(values)).sum())
        .collect();
    let to_battery = sum_series(
        ctx.vars.storage.values().map(|vars| &vars.grid_to_storage),
        purchases.len(),
        values,
    );
    let to_load = purchases.iter().zip(&to_battery).map(|(p, b)| p - b);

    results.insert(
        CATEGORY,
        keys.year_one("energy_supplied_kwh"),
        Metric::Scalar(round_to(purchases.iter().sum::<f64>() * dt, 2)),
    );
    results.insert(
        CATEGORY,
        keys.year_one("to_load_series_kw"),
        round_series(to_load),
    );
    results.insert(
        CATEGORY,
        keys.year_one("to_battery_series_kw"),
        round_series(to_battery),
    );
}

/// Add the `ElectricLoad` category
pub(super) fn add_load_metrics(results: &mut ResultSet, ctx: &BuildContext, keys: Keys) {
    const CATEGORY: &str = "ElectricLoad";
    let scenario = ctx.scenario;
    let dt = scenario.time_index.step_hours();

    results.insert(
        CATEGORY,
        "load_series_kw",
        round_series(scenario.load.loads_kw().iter().copied()),
    );
    if let Some(outage) = &scenario.outage {
        results.insert(
            CATEGORY,
            "critical_load_series_kw",
            round_series(outage.critical_loads_kw.iter().copied()),
        );
    }
    results.insert(
        CATEGORY,
        keys.year_one("annual_calculated_kwh"),
        Metric::Scalar(round_to(scenario.load.annual_kwh(dt), 2)),
    );
    if scenario.load.has_heating_load() {
        results.insert(
            CATEGORY,
            "heating_load_series_kw",
            round_series(scenario.load.heating_loads_kw().iter().copied()),
        );
    }
}

/// Add a category for each technology, named by its ID
pub(super) fn add_technology_metrics(
    results: &mut ResultSet,
    ctx: &BuildContext,
    values: &[f64],
    keys: Keys,
) {
    let scenario = ctx.scenario;
    let n = scenario.time_index.len();
    let dt = scenario.time_index.step_hours();

    for (id, tech) in &scenario.technologies {
        let category = id.0.as_ref();
        let vars = &ctx.vars.techs[id];
        let value_series = |family: &[Variable]| -> Vec<f64> {
            family.iter().map(|var| var.value(values)).collect()
        };

        let production = value_series(&vars.production);
        let curtailed = value_series(&vars.curtailment);
        let to_grid = sum_series(vars.export.values(), n, values);
        let to_battery = sum_series(
            ctx.vars
                .storage
                .values()
                .filter_map(|storage_vars| storage_vars.tech_to_storage.get(id)),
            n,
            values,
        );
        let to_load: Vec<f64> = (0..n)
            .map(|t| {
                if tech.is_electric() {
                    production[t] - curtailed[t] - to_grid[t] - to_battery[t]
                } else {
                    0.0
                }
            })
            .collect();
        let size = vars.size.value(values);
        let produced_kwh = (production.iter().sum::<f64>() - curtailed.iter().sum::<f64>()) * dt;
        let om_cost = tech.om_cost_per_kw.value() * size
            + tech.om_cost_per_kwh.value() * production.iter().sum::<f64>() * dt;

        results.insert(category, "class", Metric::Text(tech.class.to_string()));
        results.insert(category, "size_kw", Metric::Scalar(round_to(size, 2)));
        results.insert(
            category,
            keys.year_one("energy_produced_kwh"),
            Metric::Scalar(round_to(produced_kwh, 2)),
        );
        results.insert(
            category,
            keys.year_one("to_load_series_kw"),
            round_series(to_load),
        );
        results.insert(
            category,
            keys.year_one("to_battery_series_kw"),
            round_series(to_battery),
        );
        results.insert(
            category,
            keys.year_one("to_grid_series_kw"),
            round_series(to_grid),
        );
        results.insert(
            category,
            keys.year_one("curtailed_production_series_kw"),
            round_series(curtailed),
        );
        results.insert(
            category,
            keys.year_one("om_cost"),
            Metric::Scalar(round_to(om_cost, 2)),
        );

        if let (Some(fuel), Some(params)) = (&vars.fuel, tech.fuel) {
            let fuel_used: f64 = fuel.iter().map(|var| var.value(values)).sum();
            results.insert(
                category,
                keys.year_one("fuel_used"),
                Metric::Scalar(round_to(fuel_used, 2)),
            );
            results.insert(
                category,
                keys.year_one("fuel_cost"),
                Metric::Scalar(round_to(fuel_used * params.cost_per_unit, 2)),
            );
        }
        if let Some(thermal) = &vars.thermal_production {
            results.insert(
                category,
                keys.year_one("thermal_production_series_kw"),
                round_series(value_series(thermal)),
            );
        }
        if let Some(incentive) = vars.incentive {
            results.insert(
                category,
                keys.year_one("production_incentive"),
                Metric::Scalar(round_to(incentive.value(values), 2)),
            );
        }
    }
}

/// Add a category for each storage device, named by its ID
pub(super) fn add_storage_metrics(
    results: &mut ResultSet,
    ctx: &BuildContext,
    values: &[f64],
    keys: Keys,
) {
    for (id, storage) in &ctx.scenario.storage {
        let category = id.0.as_ref();
        let vars = &ctx.vars.storage[id];
        let kwh = vars.kwh.value(values);

        // State of charge at the end of each time step, as a fraction of capacity
        let soc = vars.soc[1..].iter().map(|var| {
            if kwh > 0.0 {
                var.value(values) / kwh
            } else {
                0.0
            }
        });

        results.insert(category, "kind", Metric::Text(storage.kind.to_string()));
        results.insert(
            category,
            "size_kw",
            Metric::Scalar(round_to(vars.kw.value(values), 2)),
        );
        results.insert(category, "size_kwh", Metric::Scalar(round_to(kwh, 2)));
        results.insert(category, keys.year_one("soc_series_pct"), round_series(soc));
        results.insert(
            category,
            keys.year_one("discharge_series_kw"),
            round_series(vars.discharge.iter().map(|var| var.value(values))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::scenario;
    use crate::optimisation::solve::SolveStatus;
    use crate::optimisation::{FormulationMode, Problem, build_node};
    use crate::scenario::Scenario;
    use rstest::rstest;

    #[rstest]
    fn test_no_storage_gives_zero_to_battery_series(scenario: Scenario) {
        let mut scenario = scenario;
        scenario.storage.clear();
        let mut problem = Problem::default();
        let ctx = build_node(&mut problem, &scenario, FormulationMode::Lifecycle);

        let values = vec![1.0; problem.num_cols()];
        let mut results = ResultSet::new(SolveStatus::Optimal, 0.0);
        add_utility_metrics(&mut results, &ctx, &values, Keys::new(ctx.mode));

        let to_battery = results
            .series("ElectricUtility", "year_one_to_battery_series_kw")
            .unwrap();
        assert_eq!(to_battery.len(), scenario.time_index.len());
        assert!(to_battery.iter().all(|&value| value == 0.0));
    }

    #[rstest]
    fn test_control_keys_unprefixed(scenario: Scenario) {
        let mut problem = Problem::default();
        let mode = FormulationMode::Control {
            soc_preservation_weight: 0.0,
        };
        let ctx = build_node(&mut problem, &scenario, mode);

        let values = vec![0.0; problem.num_cols()];
        let mut results = ResultSet::new(SolveStatus::Optimal, 0.0);
        add_technology_metrics(&mut results, &ctx, &values, Keys::new(ctx.mode));
        assert!(results.get("pv", "to_load_series_kw").is_some());
        assert!(results.get("pv", "year_one_to_load_series_kw").is_none());
    }
}

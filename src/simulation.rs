//! Running scenarios: business as usual against optimal, rolling-horizon control and multi-node.
use crate::finance::{ProformaInputs, proforma};
use crate::optimisation::solve::{SolverOptions, solve};
use crate::optimisation::{FormulationMode, Problem, build_node};
use crate::results::{self, Metric, MetricMap, ResultSet, YearOneSummary, round_series, round_to};
use crate::scenario::Scenario;
use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use log::info;
use std::thread;

pub mod control;
pub mod multi_node;

/// Categories whose scalar metrics are repeated with a `_bau` suffix
const BAU_CATEGORIES: [&str; 3] = ["Financial", "ElectricTariff", "ElectricUtility"];

/// The results of one case, plus the figures needed for a pro-forma comparison
#[derive(Debug, Clone)]
struct CaseResult {
    results: ResultSet,
    summary: Option<YearOneSummary>,
}

/// Build and solve one lifecycle case
fn solve_case(scenario: &Scenario, options: &SolverOptions, name: &str) -> Result<CaseResult> {
    let mut problem = Problem::default();
    let ctx = build_node(&mut problem, scenario, FormulationMode::Lifecycle);
    let objective = ctx.objective();
    info!(
        "Built {name} model with {} columns and {} rows",
        problem.num_cols(),
        problem.num_rows()
    );

    let outcome = solve(problem, objective, options)
        .with_context(|| format!("Failed to solve {name} model"))?;
    info!("Solved {name} model: {}", outcome.status());

    let summary = outcome
        .solution()
        .map(|solved| YearOneSummary::from_solution(&ctx, &solved.values));

    Ok(CaseResult {
        results: results::from_outcome(&ctx, &outcome),
        summary,
    })
}

/// Wait for a solver thread to finish
fn join_case(handle: thread::ScopedJoinHandle<'_, Result<CaseResult>>) -> Result<CaseResult> {
    handle
        .join()
        .map_err(|_| anyhow!("Solver thread panicked"))?
}

/// Size and dispatch a site, comparing the result with business as usual.
///
/// The business-as-usual and optimal models are solved on their own threads. The optimal results
/// are returned, with business-as-usual metrics attached under `_bau` keys and a pro-forma
/// comparison of the two.
pub fn run_scenario(scenario: &Scenario, options: &SolverOptions, with_bau: bool) -> Result<ResultSet> {
    scenario.validate()?;
    let bau_scenario = scenario.business_as_usual();

    let (optimal, bau) = thread::scope(|s| {
        let optimal = s.spawn(|| solve_case(scenario, options, "optimal"));
        let bau = with_bau.then(|| s.spawn(|| solve_case(&bau_scenario, options, "business-as-usual")));

        let optimal = join_case(optimal);
        let bau = bau.map(join_case).transpose();
        (optimal, bau)
    });
    let CaseResult {
        mut results,
        summary,
    } = optimal?;

    if let Some(bau) = bau? {
        merge_bau(&mut results, &bau.results);
        if let (Some(optimal), Some(bau)) = (summary, bau.summary) {
            add_proforma(&mut results, scenario, &optimal, &bau);
        }
    }
    group_technology_classes(&mut results, scenario);

    Ok(results)
}

/// Attach business-as-usual scalars to the optimal results
fn merge_bau(results: &mut ResultSet, bau: &ResultSet) {
    results.insert(
        "Financial",
        "status_bau",
        Metric::Text(bau.status.to_string()),
    );
    for category in BAU_CATEGORIES {
        let Some(metrics) = bau.categories.get(category) else {
            continue;
        };

        for (key, metric) in metrics {
            if let Metric::Scalar(value) = metric {
                results.insert(category, format!("{key}_bau"), Metric::Scalar(*value));
            }
        }
    }
}

/// Add the net present value, payback period and cash flows of the optimal case relative to
/// business as usual
fn add_proforma(
    results: &mut ResultSet,
    scenario: &Scenario,
    optimal: &YearOneSummary,
    bau: &YearOneSummary,
) {
    let financial = &scenario.financial;
    let inputs = ProformaInputs {
        capital_cost: optimal.capital_cost - bau.capital_cost,
        year_one_bill_savings: bau.bill - optimal.bill,
        year_one_fuel_savings: bau.fuel_cost - optimal.fuel_cost,
        year_one_om_increase: optimal.om_cost - bau.om_cost,
        year_one_incentive: optimal.incentive - bau.incentive,
        analysis_years: financial.analysis_years,
        elec_escalation_rate: financial.elec_cost_escalation_rate,
        fuel_escalation_rate: financial.fuel_cost_escalation_rate,
        om_escalation_rate: financial.om_cost_escalation_rate,
        discount_rate: financial.offtaker_discount_rate,
        tax_rate: financial.offtaker_tax_rate,
    };
    let proforma = proforma(&inputs);

    results.insert("Financial", "npv", Metric::Scalar(round_to(proforma.npv, 2)));
    if let Some(years) = proforma.simple_payback_years {
        results.insert(
            "Financial",
            "simple_payback_years",
            Metric::Scalar(round_to(years, 2)),
        );
    }
    results.insert(
        "Financial",
        "net_annual_cash_flows",
        round_series(proforma.net_cash_flows),
    );
}

/// Sum two metrics of the same shape
fn sum_metrics(total: &mut Metric, other: &Metric) {
    match (total, other) {
        (Metric::Scalar(total), Metric::Scalar(value)) => {
            *total = round_to(*total + value, 2);
        }
        (Metric::Series(total), Metric::Series(values)) => {
            for (total, value) in total.iter_mut().zip(values) {
                *total = round_to(*total + value, results::SERIES_DECIMAL_PLACES);
            }
        }
        _ => {}
    }
}

/// Replace the categories of technologies whose class has several instances with a single
/// category for the class.
///
/// The class category holds the summed metrics plus an `instances` breakdown of the originals.
pub fn group_technology_classes(results: &mut ResultSet, scenario: &Scenario) {
    let mut by_class: IndexMap<String, Vec<&str>> = IndexMap::new();
    for tech in scenario.technologies.values() {
        by_class
            .entry(tech.class.to_string())
            .or_default()
            .push(tech.id.0.as_ref());
    }

    for (class, ids) in by_class {
        if ids.len() < 2 {
            continue;
        }

        let instances: IndexMap<String, MetricMap> = ids
            .into_iter()
            .filter_map(|id| {
                results
                    .categories
                    .shift_remove(id)
                    .map(|metrics| (id.to_string(), metrics))
            })
            .collect();

        let mut grouped = MetricMap::new();
        for metrics in instances.values() {
            for (key, metric) in metrics {
                match grouped.get_mut(key) {
                    Some(total) => sum_metrics(total, metric),
                    None => {
                        grouped.insert(key.clone(), metric.clone());
                    }
                }
            }
        }
        grouped.insert("instances".to_string(), Metric::Breakdown(instances));
        results.categories.insert(class, grouped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{pv, scenario};
    use crate::optimisation::solve::SolveStatus;
    use crate::technology::Technology;
    use rstest::rstest;

    #[test]
    fn test_merge_bau() {
        let mut results = ResultSet::new(SolveStatus::Optimal, 0.0);
        results.insert("Financial", "lcc", Metric::Scalar(100.0));
        let mut bau = ResultSet::new(SolveStatus::Optimal, 0.0);
        bau.insert("Financial", "lcc", Metric::Scalar(150.0));
        bau.insert("pv", "size_kw", Metric::Scalar(10.0));

        merge_bau(&mut results, &bau);
        assert_eq!(results.scalar("Financial", "lcc_bau"), Some(150.0));
        assert_eq!(results.scalar("Financial", "lcc"), Some(100.0));
        assert!(results.get("pv", "size_kw_bau").is_none());
    }

    #[rstest]
    fn test_group_technology_classes(scenario: Scenario, pv: Technology) {
        let mut scenario = scenario;
        let second = Technology {
            id: "pv_roof".into(),
            ..pv
        };
        scenario.technologies.insert(second.id.clone(), second);

        let mut results = ResultSet::new(SolveStatus::Optimal, 0.0);
        for id in ["pv", "pv_roof"] {
            results.insert(id, "size_kw", Metric::Scalar(10.0));
            results.insert(id, "year_one_to_load_series_kw", Metric::Series(vec![1.0, 2.0]));
        }
        results.insert("generator", "size_kw", Metric::Scalar(5.0));

        group_technology_classes(&mut results, &scenario);

        assert!(!results.categories.contains_key("pv"));
        assert_eq!(results.scalar("PV", "size_kw"), Some(20.0));
        assert_eq!(
            results.series("PV", "year_one_to_load_series_kw"),
            Some(&[2.0, 4.0][..])
        );
        let Some(Metric::Breakdown(instances)) = results.get("PV", "instances") else {
            panic!("Expected instances breakdown");
        };
        assert_eq!(instances.len(), 2);

        // A class with one instance keeps its own category
        assert_eq!(results.scalar("generator", "size_kw"), Some(5.0));
    }
}

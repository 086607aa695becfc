//! Properties which every solved scenario should have.
use deropt::financial::Financial;
use deropt::input::{load_control_scenario, load_nodes};
use deropt::optimisation::solve::SolverOptions;
use deropt::results::{Metric, ResultSet};
use deropt::scenario::Scenario;
use deropt::simulation::multi_node::run_multi_node;
use deropt::simulation::run_scenario;
use float_cmp::assert_approx_eq;
use rstest::rstest;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const LOAD: &str = "[
    40, 40, 40, 40, 40, 40, 50, 70, 90, 100, 100, 100,
    100, 100, 100, 100, 90, 70, 50, 40, 40, 40, 40, 40,
]";

const PV: &str = r#"
[[technologies]]
id = "pv"
class = "PV"
max_kw = 200.0
installed_cost_per_kw = 1000.0
production_factor = [
    0, 0, 0, 0, 0, 0.05, 0.2, 0.4, 0.58, 0.72, 0.8, 0.84,
    0.84, 0.8, 0.72, 0.58, 0.4, 0.2, 0.05, 0, 0, 0, 0, 0,
]
"#;

/// Load a one-day scenario from the given tables, with no taxes
fn scenario(tables: &str) -> Scenario {
    scenario_with("num_time_steps = 24", LOAD, tables)
}

/// Load a scenario with the given `[site]` keys and loads, with no taxes
fn scenario_with(site: &str, loads_kw: &str, tables: &str) -> Scenario {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("scenario.toml");
    let toml_str = format!(
        "[site]\n{site}\n\n[load]\nloads_kw = {loads_kw}\n\n\
        [financial]\nofftaker_tax_rate = 0.0\n\n{tables}"
    );
    fs::write(&file_path, toml_str).unwrap();

    load_control_scenario(&file_path).unwrap()
}

fn run(scenario: &Scenario) -> ResultSet {
    let results = run_scenario(scenario, &SolverOptions::default(), false).unwrap();
    assert_eq!(results.status.to_string(), "optimal");
    results
}

fn scalar(results: &ResultSet, category: &str, key: &str) -> f64 {
    results
        .scalar(category, key)
        .unwrap_or_else(|| panic!("Missing {category}.{key}"))
}

#[test]
fn test_zero_capacity_storage() {
    let scenario = scenario(
        "[tariff]\nenergy_rates = [0.2]\n\n\
        [[storage]]\nid = \"battery\"\nmax_kw = 0.0\nmax_kwh = 100.0\n\
        installed_cost_per_kwh = 100.0\n",
    );
    let results = run(&scenario);

    let to_battery = results
        .series("ElectricUtility", "year_one_to_battery_series_kw")
        .unwrap();
    assert_eq!(to_battery, [0.0; 24]);
    assert!(
        results
            .series("battery", "year_one_discharge_series_kw")
            .unwrap()
            .iter()
            .all(|&kw| kw == 0.0)
    );
    assert!(
        results
            .series("battery", "year_one_soc_series_pct")
            .unwrap()
            .iter()
            .all(|&soc| soc == 0.0)
    );
    assert_eq!(scalar(&results, "battery", "size_kw"), 0.0);
}

#[test]
fn test_bill_is_sum_of_components() {
    let scenario = scenario(&format!(
        "[tariff]\nenergy_rates = [0.137]\nmonthly_demand_rates = [[12.34]]\n\
        fixed_monthly_charge = 20.5\n\n\
        [[tariff.coincident_peaks]]\ntime_steps = [17]\nrate_per_kw = 5.0\n{PV}"
    ));
    let results = run(&scenario);

    let get = |key| scalar(&results, "ElectricTariff", key);
    assert_approx_eq!(
        f64,
        get("year_one_bill"),
        get("year_one_energy_cost")
            + get("year_one_demand_cost")
            + get("year_one_fixed_cost")
            + get("year_one_min_charge_adder"),
        epsilon = 1e-9
    );
    // The coincident peak charge is reported but not part of the bill
    assert!(get("year_one_coincident_peak_cost") > 0.0);
}

#[test]
fn test_lifecycle_is_year_one_times_pwf() {
    let scenario = scenario(
        "[tariff]\nenergy_rates = [0.1]\nmonthly_demand_rates = [[10.0]]\n\
        fixed_monthly_charge = 20.0\n",
    );
    let pwf_e = Financial::factors(&scenario.financial).pwf_e;
    let results = run(&scenario);

    for name in ["energy_cost", "demand_cost", "fixed_cost"] {
        let year_one = scalar(&results, "ElectricTariff", &format!("year_one_{name}"));
        let lifecycle = scalar(
            &results,
            "ElectricTariff",
            &format!("lifecycle_{name}_after_tax"),
        );
        assert_approx_eq!(f64, lifecycle, year_one * pwf_e, epsilon = 0.01);
    }
    assert_approx_eq!(
        f64,
        scalar(&results, "ElectricTariff", "year_one_energy_cost"),
        1560.0 * 0.1,
        epsilon = 1e-6
    );
}

#[test]
fn test_energy_balance() {
    let scenario = scenario(&format!(
        "[tariff]\nenergy_rates = [0.25]\nmonthly_demand_rates = [[20.0]]\n{PV}\n\
        [[storage]]\nid = \"battery\"\nmax_kw = 50.0\nmax_kwh = 200.0\n\
        installed_cost_per_kw = 200.0\ninstalled_cost_per_kwh = 100.0\n"
    ));
    let results = run(&scenario);

    let grid = results
        .series("ElectricUtility", "year_one_to_load_series_kw")
        .unwrap();
    let pv = results.series("pv", "year_one_to_load_series_kw").unwrap();
    let battery = results
        .series("battery", "year_one_discharge_series_kw")
        .unwrap();
    for (t, load) in scenario.load.loads_kw().iter().enumerate() {
        assert_approx_eq!(f64, grid[t] + pv[t] + battery[t], *load, epsilon = 0.01);
    }
}

#[test]
fn test_energy_tier_limit() {
    // The second tier is cheaper, so tiers must be filled in order with binaries
    let scenario = scenario(
        "[tariff]\nenergy_rates = [0.15, 0.10]\nenergy_tier_limits_kwh = [1000.0, inf]\n",
    );
    let results = run(&scenario);

    let tier_1 = results
        .series("ElectricTariff", "year_one_monthly_energy_tier_1_kwh")
        .unwrap();
    let tier_2 = results
        .series("ElectricTariff", "year_one_monthly_energy_tier_2_kwh")
        .unwrap();
    assert!(tier_1[0] <= 1000.0 + 1e-6);
    assert_approx_eq!(f64, tier_1[0] + tier_2[0], 1560.0, epsilon = 0.01);
}

#[test]
fn test_multi_node_total() {
    let nodes = load_nodes(Path::new("demos/multi_node/nodes.toml")).unwrap();
    let results = run_multi_node(&nodes, &SolverOptions::default()).unwrap();
    assert_eq!(results.status.to_string(), "optimal");

    let sum: f64 = results
        .nodes
        .values()
        .map(|node| scalar(node, "Financial", "lcc"))
        .sum();
    assert_approx_eq!(f64, results.total_costs.unwrap(), sum, epsilon = 0.02);
}

fn demand_cost(results: &ResultSet) -> f64 {
    scalar(results, "ElectricTariff", "year_one_demand_cost")
}

#[test]
fn test_tiered_monthly_demand() {
    // The second tier is cheaper, so the first 50 kW of the 100 kW peak must be charged at 20
    let scenario = scenario(
        "[tariff]\nenergy_rates = [0.1]\nmonthly_demand_rates = [[20.0, 5.0]]\n\
        monthly_demand_tier_limits_kw = [50.0, inf]\n",
    );
    let results = run(&scenario);
    assert_approx_eq!(f64, demand_cost(&results), 50.0 * 20.0 + 50.0 * 5.0, epsilon = 0.01);
}

#[test]
fn test_tiered_ratchet() {
    let scenario = scenario(
        "[tariff]\nenergy_rates = [0.1]\n\n\
        [[tariff.ratchets]]\ntime_steps = [9, 10, 11, 12, 13, 14, 15]\nrates = [20.0, 5.0]\n\
        tier_limits_kw = [50.0, inf]\n",
    );
    let results = run(&scenario);
    assert_approx_eq!(f64, demand_cost(&results), 50.0 * 20.0 + 50.0 * 5.0, epsilon = 0.01);
}

#[test]
fn test_ratchet_only_covers_its_time_steps() {
    // The load is 40 kW overnight and peaks at 100 kW during the day
    let scenario = scenario(
        "[tariff]\nenergy_rates = [0.1]\n\n\
        [[tariff.ratchets]]\ntime_steps = [0, 1, 2, 3]\nrates = [10.0]\n",
    );
    let results = run(&scenario);
    assert_approx_eq!(f64, demand_cost(&results), 40.0 * 10.0, epsilon = 0.01);
}

/// Twelve hours at the end of January at 100 kW, then twelve hours of February at 40 kW
const JAN_FEB_LOAD: &str = "[
    100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 100,
    40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40,
]";

#[rstest]
#[case::fixed_months("months = [0]")]
#[case::preceding_months("range = 1")]
fn test_lookback_floor(#[case] lookback: &str) {
    let scenario = scenario_with(
        "num_time_steps = 24\nstart_time_step = 732",
        JAN_FEB_LOAD,
        &format!(
            "[tariff]\nenergy_rates = [0.1]\nmonthly_demand_rates = [[10.0]]\n\n\
            [tariff.lookback]\nfraction = 0.8\n{lookback}\n"
        ),
    );
    let results = run(&scenario);

    // February's 40 kW peak is lifted to 80% of January's
    assert_approx_eq!(f64, demand_cost(&results), 100.0 * 10.0 + 80.0 * 10.0, epsilon = 0.01);
    assert_eq!(
        results
            .series("ElectricTariff", "year_one_monthly_peak_demand_kw")
            .unwrap(),
        [100.0, 40.0]
    );
}

#[test]
fn test_cost_curve_segment_selection() {
    // The second segment's fixed cost is never worth paying, so PV stays on the first
    let scenario = scenario(&format!(
        "[tariff]\nenergy_rates = [0.25]\n{}\
        cost_curve = [\n\
            {{ min_kw = 0.0, max_kw = 50.0, slope = 1.0, intercept = 0.0 }},\n\
            {{ min_kw = 50.0, max_kw = 200.0, slope = 1.0, intercept = 1.0e9 }},\n\
        ]\n",
        PV.replace("installed_cost_per_kw = 1000.0\n", "")
    ));
    let results = run(&scenario);

    assert_approx_eq!(f64, scalar(&results, "pv", "size_kw"), 50.0, epsilon = 0.01);
    assert_approx_eq!(
        f64,
        scalar(&results, "Financial", "initial_capital_costs"),
        50.0,
        epsilon = 0.01
    );
}

const GENERATOR: &str = r#"
[[technologies]]
id = "generator"
class = "Generator"
max_kw = 100.0
installed_cost_per_kw = 50.0
fuel_burn_slope = 0.07
fuel_cost_per_unit = 3.0
"#;

#[test]
fn test_upgrade_cost_charged_once() {
    // Four outage windows, each needing the generator
    let scenario = scenario(&format!(
        "[tariff]\nenergy_rates = [0.1]\n{GENERATOR}\n\
        [outage]\ndurations = [2, 3]\nprobabilities = [0.5, 0.5]\nstart_time_steps = [3, 12]\n\
        value_of_lost_load_per_kwh = 1000.0\nmg_upgrade_cost_fraction = 0.1\n"
    ));
    let results = run(&scenario);

    // Sized for the 50 kW critical load at midday
    let size = scalar(&results, "generator", "size_kw");
    assert_approx_eq!(f64, size, 50.0, epsilon = 0.01);
    assert_eq!(
        results.get("Outages", "microgrid_techs"),
        Some(&Metric::Text("generator".into()))
    );
    assert_approx_eq!(
        f64,
        scalar(&results, "Outages", "microgrid_upgrade_cost"),
        0.1 * 50.0 * size,
        epsilon = 0.05
    );
    assert_approx_eq!(
        f64,
        scalar(&results, "Outages", "expected_outage_cost"),
        0.0,
        epsilon = 1e-6
    );
}

#[rstest]
#[case::required(true, "", 100.0)]
#[case::not_required(false, "pv", 0.0)]
fn test_dispatchable_requirement(
    #[case] require_dispatchable: bool,
    #[case] microgrid_techs: &str,
    #[case] unserved_kwh: f64,
) {
    // A midday outage which PV alone could ride through
    let scenario = scenario(&format!(
        "[tariff]\nenergy_rates = [0.1]\n{PV}\n\
        [outage]\ndurations = [2]\nprobabilities = [1.0]\nstart_time_steps = [11]\n\
        value_of_lost_load_per_kwh = 10000.0\nrequire_dispatchable = {require_dispatchable}\n"
    ));
    let results = run(&scenario);

    assert_eq!(
        results.get("Outages", "microgrid_techs"),
        Some(&Metric::Text(microgrid_techs.into()))
    );
    let unserved = results
        .series("Outages", "unserved_load_per_outage_kwh")
        .unwrap();
    assert_approx_eq!(f64, unserved[0], unserved_kwh, epsilon = 0.01);
}

#[rstest]
#[case::expected("expected", 0.9 * 20.0 * 10.0 + 0.1 * 60.0 * 10.0)]
#[case::worst_duration("worst_duration", 60.0 * 10.0)]
fn test_outage_cost_policy(#[case] cost_policy: &str, #[case] expected_cost: f64) {
    // Nothing can serve the 20 kW critical load, so every outage is fully unserved
    let scenario = scenario(&format!(
        "[tariff]\nenergy_rates = [0.1]\n\n\
        [outage]\ndurations = [1, 3]\nprobabilities = [0.9, 0.1]\nstart_time_steps = [0]\n\
        value_of_lost_load_per_kwh = 10.0\ncost_policy = \"{cost_policy}\"\n"
    ));
    let results = run(&scenario);
    assert_approx_eq!(
        f64,
        scalar(&results, "Outages", "expected_outage_cost"),
        expected_cost,
        epsilon = 0.01
    );
}

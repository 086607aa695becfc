//! Costs, the bill and its components.
use super::{Keys, Metric, ResultSet, round_to};
use crate::optimisation::BuildContext;

/// Divide a lifecycle value by its present-worth factor
fn per_year(value: f64, pwf: f64) -> f64 {
    if pwf > 0.0 { value / pwf } else { 0.0 }
}

/// Year-one quantities used to compare an optimal case with business as usual
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct YearOneSummary {
    /// Up-front installed cost of new capacity, before incentives
    pub capital_cost: f64,
    /// Electricity bill, net of export credit
    pub bill: f64,
    /// Fuel cost
    pub fuel_cost: f64,
    /// O&M cost
    pub om_cost: f64,
    /// Production incentives earned
    pub incentive: f64,
}

impl YearOneSummary {
    /// Read the summary from a solution
    pub fn from_solution(ctx: &BuildContext, values: &[f64]) -> Self {
        let costs = &ctx.costs;
        let factors = &ctx.factors;

        Self {
            capital_cost: installed_capital_cost(ctx, values),
            bill: per_year(costs.bill().value(values), factors.pwf_e),
            fuel_cost: per_year(costs.fuel.value(values), factors.pwf_fuel),
            om_cost: per_year(costs.om().value(values), factors.pwf_om),
            incentive: ctx
                .vars
                .techs
                .values()
                .filter_map(|vars| vars.incentive)
                .map(|var| var.value(values))
                .sum(),
        }
    }
}

/// Installed cost of new capacity, before tax incentives
fn installed_capital_cost(ctx: &BuildContext, values: &[f64]) -> f64 {
    let scenario = ctx.scenario;
    let mut total = 0.0;
    for (id, tech) in &scenario.technologies {
        let vars = &ctx.vars.techs[id];
        total += match (&tech.cost_curve, &vars.segments) {
            (Some(curve), Some(segments)) => curve
                .iter()
                .zip(segments)
                .map(|(segment, seg_vars)| {
                    segment.slope.value() * seg_vars.size.value(values)
                        + segment.intercept * seg_vars.active.value(values)
                })
                .sum(),
            _ => tech.installed_cost_per_kw.value() * vars.purchase_size.value(values),
        };
    }
    for (id, storage) in &scenario.storage {
        let vars = &ctx.vars.storage[id];
        let new_kw = (vars.kw.value(values) - storage.existing_kw.value()).max(0.0);
        let new_kwh = (vars.kwh.value(values) - storage.existing_kwh.value()).max(0.0);
        total += storage.installed_cost_per_kw.value() * new_kw
            + storage.installed_cost_per_kwh.value() * new_kwh;
    }

    total
}

/// Add the `Financial` category
pub(super) fn add_financial_metrics(
    results: &mut ResultSet,
    ctx: &BuildContext,
    values: &[f64],
    keys: Keys,
) {
    const CATEGORY: &str = "Financial";
    let costs = &ctx.costs;
    let factors = &ctx.factors;
    let mut insert = |key: &str, value: f64| {
        results.insert(CATEGORY, key, Metric::Scalar(round_to(value, 2)));
    };

    let om = costs.om().value(values);
    let fuel = costs.fuel.value(values);
    if !keys.is_lifecycle() {
        insert("total_cost", ctx.objective().value(values));
        insert("om_cost", om);
        insert("fuel_cost", fuel);
        return;
    }

    let capital = if factors.include_capital {
        costs.capital.value(values) * factors.third_party_factor
    } else {
        0.0
    };
    let summary = YearOneSummary::from_solution(ctx, values);
    let after_owner_tax = 1.0 - factors.owner_tax_rate;
    let after_offtaker_tax = 1.0 - factors.offtaker_tax_rate;

    insert("lcc", costs.total(factors).value(values));
    insert("lifecycle_capital_costs", capital);
    insert("initial_capital_costs", summary.capital_cost);
    insert("lifecycle_om_costs_before_tax", om);
    insert("lifecycle_om_costs_after_tax", om * after_owner_tax);
    insert("year_one_om_costs_before_tax", summary.om_cost);
    insert("lifecycle_fuel_costs_after_tax", fuel * after_offtaker_tax);
    insert("year_one_fuel_cost_before_tax", summary.fuel_cost);
    insert(
        "lifecycle_chp_standby_cost_after_tax",
        costs.standby.value(values) * after_offtaker_tax,
    );
    insert(
        "lifecycle_production_incentive_after_tax",
        costs.incentive.value(values) * after_owner_tax,
    );
    insert(
        "lifecycle_elecbill_after_tax",
        costs.bill().value(values) * after_offtaker_tax,
    );
    if ctx.scenario.outage.is_some() {
        insert("lifecycle_outage_cost", costs.outage.value(values));
    }
}

/// Add the `ElectricTariff` category.
///
/// The year-one bill is the sum of the rounded energy, demand, fixed and minimum charges. The
/// coincident peak charge and export benefit are reported separately.
pub(super) fn add_tariff_metrics(
    results: &mut ResultSet,
    ctx: &BuildContext,
    values: &[f64],
    keys: Keys,
) {
    const CATEGORY: &str = "ElectricTariff";
    let costs = &ctx.costs;
    let pwf_e = ctx.factors.pwf_e;
    let after_tax = 1.0 - ctx.factors.offtaker_tax_rate;

    let components = [
        ("energy_cost", &costs.energy, 2),
        ("demand_cost", &costs.demand, 2),
        ("fixed_cost", &costs.fixed, 0),
        ("min_charge_adder", &costs.min_charge_adder, 2),
        ("coincident_peak_cost", &costs.coincident_peak, 2),
        ("export_benefit", &costs.export_benefit, 0),
    ];

    let mut bill = 0.0;
    for (name, expr, decimal_places) in components {
        let lifecycle = expr.value(values);
        let year_one = round_to(per_year(lifecycle, pwf_e), decimal_places);
        if !matches!(name, "coincident_peak_cost" | "export_benefit") {
            bill += year_one;
        }

        results.insert(CATEGORY, keys.year_one(name), Metric::Scalar(year_one));
        if keys.is_lifecycle() {
            results.insert(
                CATEGORY,
                format!("lifecycle_{name}_after_tax"),
                Metric::Scalar(round_to(lifecycle * after_tax, 2)),
            );
        }
    }
    results.insert(
        CATEGORY,
        keys.year_one("bill"),
        Metric::Scalar(round_to(bill, 2)),
    );

    // Peak grid draw in each month
    let scenario = ctx.scenario;
    let purchases = &ctx.vars.tariff.grid_purchase;
    let monthly_peaks = scenario.time_index.months().into_iter().map(|month| {
        scenario
            .time_index
            .steps_in_month(month)
            .map(|t| purchases[t].iter().map(|var| var.value(values)).sum::<f64>())
            .fold(0.0, f64::max)
    });
    results.insert(
        CATEGORY,
        keys.year_one("monthly_peak_demand_kw"),
        super::round_series(monthly_peaks),
    );

    // Energy bought in each tier, by month
    let step_hours = scenario.time_index.step_hours();
    for tier in 0..scenario.tariff.num_energy_tiers() {
        let monthly_energy = scenario.time_index.months().into_iter().map(|month| {
            scenario
                .time_index
                .steps_in_month(month)
                .map(|t| purchases[t][tier].value(values) * step_hours)
                .sum::<f64>()
        });
        results.insert(
            CATEGORY,
            keys.year_one(&format!("monthly_energy_tier_{}_kwh", tier + 1)),
            super::round_series(monthly_energy),
        );
    }
}

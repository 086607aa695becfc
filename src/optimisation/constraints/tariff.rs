//! Energy tiers, demand charges and the minimum charge.
use crate::optimisation::BuildContext;
use crate::optimisation::problem::{LinearExpr, Problem, Variable};
use crate::tariff::tier_sizes;

/// Add the tariff constraints and accumulate the bill's cost expressions
pub fn add_tariff_constraints(problem: &mut Problem, ctx: &mut BuildContext) {
    add_energy_tier_constraints(problem, ctx);
    add_demand_constraints(problem, ctx);
    add_coincident_peak_constraints(problem, ctx);
    add_energy_and_fixed_costs(ctx);
}

/// The largest power which could be bought from the grid at a time step
fn max_purchase_kw(ctx: &BuildContext, t: usize) -> f64 {
    let storage_kw: f64 = ctx
        .scenario
        .storage
        .values()
        .filter(|storage| storage.can_grid_charge && storage.is_electric())
        .map(|storage| storage.max_kw.value())
        .sum();

    ctx.scenario.load.loads_kw()[t] + storage_kw
}

/// Cap each energy tier per month, filling tiers in order if the rates require it
fn add_energy_tier_constraints(problem: &mut Problem, ctx: &BuildContext) {
    let scenario = ctx.scenario;
    let tariff = &scenario.tariff;
    let dt = scenario.time_index.step_hours();
    let purchase = &ctx.vars.tariff.grid_purchase;
    let sizes = tier_sizes(&tariff.energy_tier_limits);
    let mut terms = Vec::new();

    for (month_idx, month) in scenario.time_index.months().into_iter().enumerate() {
        for (tier, &size) in sizes.iter().enumerate() {
            if !size.is_finite() {
                continue;
            }

            for t in scenario.time_index.steps_in_month(month) {
                terms.push((purchase[t][tier], dt));
            }
            problem.add_row(..=size, terms.drain(..));
        }

        let Some(tier_active) = &ctx.vars.tariff.tier_active else {
            continue;
        };
        let big_m: f64 = scenario
            .time_index
            .steps_in_month(month)
            .map(|t| max_purchase_kw(ctx, t) * dt)
            .sum();
        for tier in 1..tariff.num_energy_tiers() {
            let active = tier_active[month_idx][tier - 1];
            if !sizes[tier - 1].is_finite() {
                // Nothing can be bought above an unlimited tier
                problem.fix(active, 0.0);
                continue;
            }

            // The previous tier must be full before this one is used
            for t in scenario.time_index.steps_in_month(month) {
                terms.push((purchase[t][tier - 1], dt));
            }
            terms.push((active, -sizes[tier - 1]));
            problem.add_row(0.0.., terms.drain(..));

            for t in scenario.time_index.steps_in_month(month) {
                terms.push((purchase[t][tier], dt));
            }
            terms.push((active, -big_m));
            problem.add_row(..=0.0, terms.drain(..));
        }
    }
}

/// Constrain tiered peaks to be at least the grid purchase at each of the given steps
fn add_peak_rows(
    problem: &mut Problem,
    peaks: &[Variable],
    grid_purchase: &[Vec<Variable>],
    steps: impl Iterator<Item = usize>,
) {
    let mut terms = Vec::new();
    for t in steps {
        terms.extend(peaks.iter().map(|&peak| (peak, 1.0)));
        terms.extend(grid_purchase[t].iter().map(|&purchase| (purchase, -1.0)));
        problem.add_row(0.0.., terms.drain(..));
    }
}

/// Fill tiered peaks in order: a tier may only be used once the tier before it is full.
///
/// `active[tier - 1]` is the binary for `tier`, and `big_m` bounds the total peak.
fn add_peak_tier_order_rows(
    problem: &mut Problem,
    peaks: &[Variable],
    active: &[Variable],
    limits: &[f64],
    big_m: f64,
) {
    let sizes = tier_sizes(limits);
    for tier in 1..peaks.len() {
        let active = active[tier - 1];
        if !sizes[tier - 1].is_finite() {
            // Nothing can be above an unlimited tier
            problem.fix(active, 0.0);
            problem.fix(peaks[tier], 0.0);
            continue;
        }

        problem.add_row(0.0.., [(peaks[tier - 1], 1.0), (active, -sizes[tier - 1])]);
        problem.add_row(..=0.0, [(peaks[tier], 1.0), (active, -big_m)]);
    }
}

/// The largest grid draw at any of the given steps
fn max_peak_kw(ctx: &BuildContext, steps: impl Iterator<Item = usize>) -> f64 {
    steps
        .map(|t| max_purchase_kw(ctx, t))
        .fold(0.0, f64::max)
}

/// Constrain `peak` to be at least the sum of the tiered peaks in `month_peaks`
fn add_at_least_month_row(problem: &mut Problem, peak: Variable, month_peaks: &[Variable]) {
    let terms = std::iter::once((peak, 1.0)).chain(month_peaks.iter().map(|&var| (var, -1.0)));
    problem.add_row(0.0.., terms);
}

/// Monthly and time-of-use demand peaks, plus the lookback floor
fn add_demand_constraints(problem: &mut Problem, ctx: &mut BuildContext) {
    let scenario = ctx.scenario;
    let tariff = &scenario.tariff;
    let pwf_e = ctx.factors.pwf_e;
    let vars = &ctx.vars.tariff;

    let months = scenario.time_index.months();
    // The lookback floor can lift a month's peak above its own draw, so bound by the whole horizon
    let month_big_m = max_peak_kw(ctx, scenario.time_index.iter());
    for (month_idx, (&month, peaks)) in months.iter().zip(&vars.month_peaks).enumerate() {
        add_peak_rows(
            problem,
            peaks,
            &vars.grid_purchase,
            scenario.time_index.steps_in_month(month),
        );
        if let Some(month_tier_active) = &vars.month_tier_active {
            add_peak_tier_order_rows(
                problem,
                peaks,
                &month_tier_active[month_idx],
                &tariff.monthly_demand_tier_limits,
                month_big_m,
            );
        }
        for (&rate, &peak) in tariff.monthly_demand_rates[month].iter().zip(peaks) {
            ctx.costs.demand.add_term(peak, rate * pwf_e);
        }
    }

    for ((ratchet, peaks), active) in tariff
        .ratchets
        .iter()
        .zip(&vars.ratchet_peaks)
        .zip(&vars.ratchet_tier_active)
    {
        add_peak_rows(
            problem,
            peaks,
            &vars.grid_purchase,
            ratchet.time_steps.iter().copied(),
        );
        if let Some(active) = active {
            add_peak_tier_order_rows(
                problem,
                peaks,
                active,
                &ratchet.tier_limits,
                max_peak_kw(ctx, ratchet.time_steps.iter().copied()),
            );
        }
        for (&rate, &peak) in ratchet.rates.iter().zip(peaks) {
            ctx.costs.demand.add_term(peak, rate * pwf_e);
        }
    }

    let Some(lookback) = &tariff.lookback else {
        return;
    };
    if vars.lookback_peaks.is_empty() {
        return;
    }
    let month_position = |month: usize| months.iter().position(|&m| m == month);
    let mut terms = Vec::new();
    for (month_idx, &month) in months.iter().enumerate() {
        let lookback_peak = if lookback.range > 0 {
            // The floor is set by the preceding months, wrapping around the year
            let lookback_peak = vars.lookback_peaks[month_idx];
            for offset in 1..=lookback.range {
                let earlier = (month + 12 - offset % 12) % 12;
                if let Some(earlier_idx) = month_position(earlier) {
                    add_at_least_month_row(problem, lookback_peak, &vars.month_peaks[earlier_idx]);
                }
            }
            lookback_peak
        } else {
            vars.lookback_peaks[0]
        };

        // This month's peak is at least a fraction of the lookback peak
        terms.extend(vars.month_peaks[month_idx].iter().map(|&peak| (peak, 1.0)));
        terms.push((lookback_peak, -lookback.fraction));
        problem.add_row(0.0.., terms.drain(..));
    }
    if lookback.range == 0 {
        for &month in &lookback.months {
            if let Some(month_idx) = month_position(month) {
                add_at_least_month_row(problem, vars.lookback_peaks[0], &vars.month_peaks[month_idx]);
            }
        }
    }
}

/// Peaks during coincident peak periods, charged separately from other demand charges
fn add_coincident_peak_constraints(problem: &mut Problem, ctx: &mut BuildContext) {
    let scenario = ctx.scenario;
    let vars = &ctx.vars.tariff;

    for (period, &peak) in scenario.tariff.coincident_peaks.iter().zip(&vars.coincident_peaks) {
        add_peak_rows(
            problem,
            &[peak],
            &vars.grid_purchase,
            period.time_steps.iter().copied(),
        );
        ctx.costs
            .coincident_peak
            .add_term(peak, period.rate_per_kw * ctx.factors.pwf_e);
    }
}

/// Energy charges and fixed charges
fn add_energy_and_fixed_costs(ctx: &mut BuildContext) {
    let scenario = ctx.scenario;
    let tariff = &scenario.tariff;
    let dt = scenario.time_index.step_hours();
    let pwf_e = ctx.factors.pwf_e;

    let energy: LinearExpr = ctx
        .vars
        .tariff
        .grid_purchase
        .iter()
        .enumerate()
        .flat_map(|(t, tiers)| {
            tiers
                .iter()
                .enumerate()
                .map(move |(tier, &purchase)| (purchase, tariff.energy_rates[tier][t] * dt * pwf_e))
        })
        .collect();
    ctx.costs.energy += &energy;

    let num_months = scenario.time_index.months().len() as f64;
    ctx.costs
        .fixed
        .add_constant(tariff.fixed_monthly_charge * num_months * pwf_e);
}

/// Add the minimum charge adder.
///
/// The annual minimum is prorated over horizons shorter than a year. This must be called after
/// every other part of the bill has been accumulated.
pub fn add_min_charge_constraint(problem: &mut Problem, ctx: &mut BuildContext) {
    let adder = ctx.vars.tariff.min_charge_adder;
    let scenario = ctx.scenario;
    let min_charge = scenario.tariff.annual_min_charge * scenario.time_index.year_fraction();
    if min_charge > 0.0 {
        // adder >= minimum charge - (energy + demand + fixed - export benefit)
        let mut expr = LinearExpr::from(adder);
        expr += &ctx.costs.energy;
        expr += &ctx.costs.demand;
        expr += &ctx.costs.fixed;
        expr -= &ctx.costs.export_benefit;
        problem.add_constraint(&expr, min_charge * ctx.factors.pwf_e..);
    }

    ctx.costs.min_charge_adder.add_term(adder, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::scenario;
    use crate::optimisation::FormulationMode;
    use crate::scenario::Scenario;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_min_charge_prorated_over_horizon(scenario: Scenario) {
        let mut scenario = scenario;
        scenario.tariff.annual_min_charge = 3650.0;

        let mut problem = Problem::default();
        let mut ctx = BuildContext::new(&mut problem, &scenario, FormulationMode::Lifecycle);
        let rows_before = problem.num_rows();
        add_min_charge_constraint(&mut problem, &mut ctx);

        // One day of a 3650 per year minimum
        assert_eq!(problem.num_rows(), rows_before + 1);
        let row = &problem.rows()[rows_before];
        assert_approx_eq!(f64, row.lower, 10.0 * ctx.factors.pwf_e, epsilon = 1e-9);
    }

    #[rstest]
    fn test_no_min_charge_row_without_min_charge(scenario: Scenario) {
        let mut problem = Problem::default();
        let mut ctx = BuildContext::new(&mut problem, &scenario, FormulationMode::Lifecycle);
        let rows_before = problem.num_rows();
        add_min_charge_constraint(&mut problem, &mut ctx);
        assert_eq!(problem.num_rows(), rows_before);
        assert_eq!(ctx.costs.min_charge_adder.terms().len(), 1);
    }
}

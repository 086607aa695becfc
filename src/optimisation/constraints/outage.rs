//! Microgrid operation during grid outages.
//!
//! Each (duration, start) outage window has its own dispatch, independent of grid-connected
//! dispatch except that storage can start the outage with no more energy than it holds at the
//! start time step. Whether a technology or storage device is part of the microgrid is decided
//! once, and shared by every window.
use crate::optimisation::BuildContext;
use crate::optimisation::problem::{LinearExpr, Problem};
use crate::optimisation::variables::{
    MicrogridVariables, MicrogridWindow, microgrid_storage, microgrid_techs,
};
use crate::outage::{OutageCostPolicy, OutageScenarios};

/// Add the microgrid constraints and accumulate outage costs, if outages are modelled
pub fn add_outage_constraints(problem: &mut Problem, ctx: &mut BuildContext) {
    let scenario = ctx.scenario;
    let Some(outage) = &scenario.outage else {
        return;
    };

    let outage_cost = {
        let ctx = &*ctx;
        let Some(mg) = &ctx.vars.microgrid else {
            return;
        };
        for window in &mg.windows {
            add_window_constraints(problem, ctx, outage, mg, window);
        }
        if outage.require_dispatchable {
            add_dispatchable_requirement(problem, ctx, mg);
        }
        add_upgrade_costs(problem, ctx, outage, mg);
        add_outage_cost(problem, ctx, outage, mg)
    };
    ctx.costs.outage += &outage_cost;
}

/// Balance, production, fuel and storage constraints for one outage window
fn add_window_constraints(
    problem: &mut Problem,
    ctx: &BuildContext,
    outage: &OutageScenarios,
    mg: &MicrogridVariables,
    window: &MicrogridWindow,
) {
    let scenario = ctx.scenario;
    let n = scenario.time_index.len();
    let dt = scenario.time_index.step_hours();
    let start = outage.start_time_steps[window.start_index];
    let duration = outage.durations[window.scenario];
    let mut terms = Vec::new();

    for ts in 0..duration {
        let t = outage.time_step(start, ts, n);

        // Critical load is met by production, storage and unserved load
        for production in window.production.values() {
            terms.push((production[ts], 1.0));
        }
        for storage_vars in window.storage.values() {
            terms.push((storage_vars.discharge[ts], 1.0));
            for charge in storage_vars.tech_to_storage.values() {
                terms.push((charge[ts], -1.0));
            }
        }
        terms.push((window.unserved[ts], 1.0));
        let critical_load = outage.critical_loads_kw[t];
        problem.add_row(critical_load..=critical_load, terms.drain(..));
    }

    for tech in microgrid_techs(scenario) {
        let tech_vars = &ctx.vars.techs[&tech.id];
        let production = &window.production[&tech.id];
        let used = mg.tech_used[&tech.id];
        let max_kw = tech.max_kw.value();
        let on = window.on.get(&tech.id);

        for ts in 0..duration {
            let pf = tech.production_factor[outage.time_step(start, ts, n)];
            problem.add_row(..=0.0, [(production[ts], 1.0), (tech_vars.size, -pf)]);
            problem.add_row(..=0.0, [(production[ts], 1.0), (used, -max_kw * pf)]);

            // Output sent to storage can't exceed production
            terms.push((production[ts], -1.0));
            for storage_vars in window.storage.values() {
                terms.push((storage_vars.tech_to_storage[&tech.id][ts], 1.0));
            }
            problem.add_row(..=0.0, terms.drain(..));

            if let Some(on) = on {
                let big_m = tech.min_turndown_fraction * max_kw;
                problem.add_row(..=0.0, [(on[ts], 1.0), (used, -1.0)]);
                problem.add_row(..=0.0, [(production[ts], 1.0), (on[ts], -max_kw * pf)]);
                problem.add_row(
                    -big_m..,
                    [
                        (production[ts], 1.0),
                        (tech_vars.size, -tech.min_turndown_fraction),
                        (on[ts], -big_m),
                    ],
                );
            }
        }

        if let (Some(&fuel), Some(params), Some(fuel_per_kwh)) =
            (window.fuel.get(&tech.id), tech.fuel, tech.fuel_per_kwh())
        {
            terms.push((fuel, 1.0));
            for ts in 0..duration {
                terms.push((production[ts], -fuel_per_kwh * dt));
                if let Some(on) = on {
                    terms.push((on[ts], -params.burn_intercept * dt));
                }
            }
            problem.add_row(0.0..=0.0, terms.drain(..));
        }
    }

    for storage in microgrid_storage(scenario) {
        let storage_vars = &ctx.vars.storage[&storage.id];
        let mg_vars = &window.storage[&storage.id];
        let used = mg.storage_used[&storage.id];

        // Storage can't start the outage with more energy than it holds
        problem.add_row(..=0.0, [(mg_vars.soc[0], 1.0), (storage_vars.soc[start], -1.0)]);

        for ts in 0..duration {
            terms.push((mg_vars.soc[ts + 1], 1.0));
            terms.push((mg_vars.soc[ts], -1.0));
            for charge in mg_vars.tech_to_storage.values() {
                terms.push((charge[ts], -dt * storage.charge_efficiency));
            }
            terms.push((mg_vars.discharge[ts], dt / storage.discharge_efficiency));
            problem.add_row(0.0..=0.0, terms.drain(..));

            problem.add_row(
                0.0..,
                [(mg_vars.soc[ts + 1], 1.0), (storage_vars.kwh, -storage.soc_min_fraction)],
            );
            problem.add_row(..=0.0, [(mg_vars.soc[ts + 1], 1.0), (storage_vars.kwh, -1.0)]);
            problem.add_row(..=0.0, [(mg_vars.discharge[ts], 1.0), (storage_vars.kw, -1.0)]);
            problem.add_row(
                ..=0.0,
                [(mg_vars.discharge[ts], 1.0), (used, -storage.max_kw.value())],
            );

            for charge in mg_vars.tech_to_storage.values() {
                terms.push((charge[ts], 1.0));
            }
            terms.push((storage_vars.kw, -1.0));
            problem.add_row(..=0.0, terms.drain(..));
        }
    }
}

/// Weather-dependent technologies can only be in the microgrid alongside a dispatchable
/// technology or storage
fn add_dispatchable_requirement(problem: &mut Problem, ctx: &BuildContext, mg: &MicrogridVariables) {
    let scenario = ctx.scenario;
    let mut terms = Vec::new();
    for tech in microgrid_techs(scenario).filter(|tech| !tech.is_dispatchable()) {
        terms.push((mg.tech_used[&tech.id], 1.0));
        for other in microgrid_techs(scenario).filter(|other| other.is_dispatchable()) {
            terms.push((mg.tech_used[&other.id], -1.0));
        }
        for &storage_used in mg.storage_used.values() {
            terms.push((storage_used, -1.0));
        }
        problem.add_row(..=0.0, terms.drain(..));
    }
}

/// Upgrade costs, charged once for each technology and storage device in the microgrid
fn add_upgrade_costs(
    problem: &mut Problem,
    ctx: &BuildContext,
    outage: &OutageScenarios,
    mg: &MicrogridVariables,
) {
    let scenario = ctx.scenario;
    let fraction = outage.mg_upgrade_cost_fraction;
    if fraction == 0.0 {
        return;
    }

    for tech in microgrid_techs(scenario) {
        // cost >= fraction * cost_per_kw * size, relaxed when the technology isn't used
        let cost_per_kw = fraction * tech.installed_cost_per_kw.value();
        let big_m = cost_per_kw * tech.max_kw.value();
        problem.add_row(
            -big_m..,
            [
                (mg.tech_upgrade_cost[&tech.id], 1.0),
                (ctx.vars.techs[&tech.id].size, -cost_per_kw),
                (mg.tech_used[&tech.id], -big_m),
            ],
        );
    }

    for storage in microgrid_storage(scenario) {
        let storage_vars = &ctx.vars.storage[&storage.id];
        let cost_per_kw = fraction * storage.installed_cost_per_kw.value();
        let cost_per_kwh = fraction * storage.installed_cost_per_kwh.value();
        let big_m =
            cost_per_kw * storage.max_kw.value() + cost_per_kwh * storage.max_kwh.value();
        problem.add_row(
            -big_m..,
            [
                (mg.storage_upgrade_cost[&storage.id], 1.0),
                (storage_vars.kw, -cost_per_kw),
                (storage_vars.kwh, -cost_per_kwh),
                (mg.storage_used[&storage.id], -big_m),
            ],
        );
    }
}

/// Add the cost of unserved load and microgrid fuel, plus upgrade costs, returning the total.
///
/// Outage costs are not discounted.
fn add_outage_cost(
    problem: &mut Problem,
    ctx: &BuildContext,
    outage: &OutageScenarios,
    mg: &MicrogridVariables,
) -> LinearExpr {
    let scenario = ctx.scenario;
    let dt = scenario.time_index.step_hours();
    let voll = outage.value_of_lost_load_per_kwh;
    let num_starts = outage.start_time_steps.len() as f64;
    let mut terms = Vec::new();

    match outage.cost_policy {
        OutageCostPolicy::Expected => {
            terms.push((mg.expected_outage_cost, 1.0));
            for window in &mg.windows {
                let weight = outage.window_probability(window.scenario) * voll * dt;
                terms.extend(window.unserved.iter().map(|&var| (var, -weight)));
            }
            problem.add_row(0.0..=0.0, terms.drain(..));
        }
        OutageCostPolicy::WorstDuration => {
            // At least the average cost over start times, for every duration
            for scenario_idx in 0..outage.num_scenarios() {
                terms.push((mg.expected_outage_cost, 1.0));
                for window in mg.windows.iter().filter(|w| w.scenario == scenario_idx) {
                    let weight = voll * dt / num_starts;
                    terms.extend(window.unserved.iter().map(|&var| (var, -weight)));
                }
                problem.add_row(0.0.., terms.drain(..));
            }
        }
    }

    let mut cost = LinearExpr::from(mg.expected_outage_cost);
    for &upgrade_cost in mg.tech_upgrade_cost.values().chain(mg.storage_upgrade_cost.values()) {
        cost.add_term(upgrade_cost, 1.0);
    }
    for window in &mg.windows {
        let probability = outage.window_probability(window.scenario);
        for (tech_id, &fuel) in &window.fuel {
            if let Some(params) = scenario.technologies[tech_id].fuel {
                cost.add_term(fuel, probability * params.cost_per_unit);
            }
        }
    }

    cost
}

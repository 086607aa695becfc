//! Electric and thermal energy balances.
use crate::id::TechID;
use crate::optimisation::BuildContext;
use crate::optimisation::problem::{Problem, Variable};

/// Charging variables from a technology into storage holding electricity (or heat)
fn charging_from<'a>(
    ctx: &'a BuildContext,
    tech_id: &'a TechID,
    electric: bool,
) -> impl Iterator<Item = &'a Vec<Variable>> + 'a {
    ctx.scenario
        .storage
        .iter()
        .filter(move |(_, storage)| storage.is_electric() == electric)
        .filter_map(move |(storage_id, _)| ctx.vars.storage[storage_id].tech_to_storage.get(tech_id))
}

/// Add the electric balance and output routing for every time step.
///
/// At each step, technology output (less curtailment, storage charging and export) plus storage
/// discharge plus grid purchases, less grid power sent to storage, equals the load.
pub fn add_electric_balance(problem: &mut Problem, ctx: &BuildContext) {
    let scenario = ctx.scenario;
    let vars = &ctx.vars;
    let mut terms = Vec::new();

    for t in scenario.time_index.iter() {
        for (id, tech) in &scenario.technologies {
            if !tech.is_electric() {
                continue;
            }

            let tech_vars = &vars.techs[id];
            terms.push((tech_vars.production[t], 1.0));
            terms.push((tech_vars.curtailment[t], -1.0));
            for export in tech_vars.export.values() {
                terms.push((export[t], -1.0));
            }
            for charge in charging_from(ctx, id, true) {
                terms.push((charge[t], -1.0));
            }
        }
        for (storage_id, storage) in &scenario.storage {
            if storage.is_electric() {
                let storage_vars = &vars.storage[storage_id];
                terms.push((storage_vars.discharge[t], 1.0));
                terms.push((storage_vars.grid_to_storage[t], -1.0));
            }
        }
        for &purchase in &vars.tariff.grid_purchase[t] {
            terms.push((purchase, 1.0));
        }
        let load = scenario.load.loads_kw()[t];
        problem.add_row(load..=load, terms.drain(..));

        // Grid power sent to storage can't exceed grid purchases
        for &purchase in &vars.tariff.grid_purchase[t] {
            terms.push((purchase, 1.0));
        }
        for storage_vars in vars.storage.values() {
            terms.push((storage_vars.grid_to_storage[t], -1.0));
        }
        problem.add_row(0.0.., terms.drain(..));
    }

    add_output_routing(problem, ctx);
}

/// Output sent to storage, export and curtailment can't exceed production
fn add_output_routing(problem: &mut Problem, ctx: &BuildContext) {
    let scenario = ctx.scenario;
    let mut terms = Vec::new();

    for (id, tech) in &scenario.technologies {
        if !tech.is_electric() {
            continue;
        }

        let tech_vars = &ctx.vars.techs[id];
        for t in scenario.time_index.iter() {
            terms.push((tech_vars.production[t], -1.0));
            terms.push((tech_vars.curtailment[t], 1.0));
            for export in tech_vars.export.values() {
                terms.push((export[t], 1.0));
            }
            for charge in charging_from(ctx, id, true) {
                terms.push((charge[t], 1.0));
            }
            problem.add_row(..=0.0, terms.drain(..));
        }
    }
}

/// Add the heat balance, if any heat is produced, stored or needed
pub fn add_thermal_balance(problem: &mut Problem, ctx: &BuildContext) {
    let scenario = ctx.scenario;
    if !scenario.has_thermal() {
        return;
    }

    let vars = &ctx.vars;
    let mut terms = Vec::new();
    for t in scenario.time_index.iter() {
        for (id, tech_vars) in &vars.techs {
            let Some(thermal) = &tech_vars.thermal_production else {
                continue;
            };

            terms.push((thermal[t], 1.0));
            for charge in charging_from(ctx, id, false) {
                terms.push((charge[t], -1.0));
            }
        }
        for (storage_id, storage) in &scenario.storage {
            if !storage.is_electric() {
                terms.push((vars.storage[storage_id].discharge[t], 1.0));
            }
        }
        let load = scenario.load.heating_loads_kw()[t];
        problem.add_row(load..=load, terms.drain(..));

        // Heat sent to storage can't exceed heat produced
        for (id, tech_vars) in &vars.techs {
            let Some(thermal) = &tech_vars.thermal_production else {
                continue;
            };

            terms.push((thermal[t], -1.0));
            for charge in charging_from(ctx, id, false) {
                terms.push((charge[t], 1.0));
            }
            problem.add_row(..=0.0, terms.drain(..));
        }
    }
}

//! Export limits and compensation.
use crate::optimisation::BuildContext;
use crate::optimisation::problem::{LinearExpr, Problem, Variable};

/// Export variables for every technology in the given bin
fn bin_exports<'a>(ctx: &'a BuildContext, bin_idx: usize) -> impl Iterator<Item = &'a Vec<Variable>> + 'a {
    ctx.vars
        .techs
        .values()
        .filter_map(move |tech_vars| tech_vars.export.get(&bin_idx))
}

/// Add annual export limits and exclusivity of import and export, and accumulate the export
/// benefit
pub fn add_export_constraints(problem: &mut Problem, ctx: &mut BuildContext) {
    let scenario = ctx.scenario;
    let dt = scenario.time_index.step_hours();
    let mut terms = Vec::new();
    let mut benefit = LinearExpr::default();

    for (bin_idx, bin) in scenario.tariff.export_bins.iter().enumerate() {
        if let Some(max_kwh) = bin.max_kwh {
            for export in bin_exports(ctx, bin_idx) {
                terms.extend(export.iter().map(|&var| (var, dt)));
            }
            problem.add_row(..=max_kwh, terms.drain(..));
        }

        if bin.limit_to_purchases {
            // Annual export can't exceed annual purchases
            for export in bin_exports(ctx, bin_idx) {
                terms.extend(export.iter().map(|&var| (var, dt)));
            }
            for purchases in &ctx.vars.tariff.grid_purchase {
                terms.extend(purchases.iter().map(|&var| (var, -dt)));
            }
            problem.add_row(..=0.0, terms.drain(..));
        }

        for export in bin_exports(ctx, bin_idx) {
            for (t, &var) in export.iter().enumerate() {
                benefit.add_term(var, bin.rates[t] * dt * ctx.factors.pwf_e);
            }
        }
    }
    ctx.costs.export_benefit += &benefit;

    let Some(importing) = &ctx.vars.tariff.importing else {
        return;
    };
    for t in scenario.time_index.iter() {
        let big_m = import_export_big_m(ctx, t);

        // purchase <= M * importing
        terms.extend(ctx.vars.tariff.grid_purchase[t].iter().map(|&var| (var, 1.0)));
        terms.push((importing[t], -big_m));
        problem.add_row(..=0.0, terms.drain(..));

        // export <= M * (1 - importing)
        for bin_idx in 0..scenario.tariff.export_bins.len() {
            for export in bin_exports(ctx, bin_idx) {
                terms.push((export[t], 1.0));
            }
        }
        terms.push((importing[t], big_m));
        problem.add_row(..=big_m, terms.drain(..));
    }
}

/// A bound on both grid purchases and export at a time step
fn import_export_big_m(ctx: &BuildContext, t: usize) -> f64 {
    let scenario = ctx.scenario;
    let max_export: f64 = scenario
        .technologies
        .values()
        .filter(|tech| tech.can_export)
        .map(|tech| tech.max_kw.value() * tech.production_factor[t])
        .sum();
    let max_storage: f64 = scenario
        .storage
        .values()
        .filter(|storage| storage.is_electric())
        .map(|storage| storage.max_kw.value())
        .sum();

    scenario.load.loads_kw()[t] + max_export + max_storage
}

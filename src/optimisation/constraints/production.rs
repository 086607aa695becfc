//! Production limits, fuel use and heat recovery for technologies.
use crate::optimisation::BuildContext;
use crate::optimisation::problem::{LinearExpr, Problem};
use crate::technology::TechClass;

/// Add sizing and production constraints for every technology
pub fn add_production_constraints(problem: &mut Problem, ctx: &mut BuildContext) {
    let scenario = ctx.scenario;
    let dt = scenario.time_index.step_hours();
    let mut terms = Vec::new();

    for (id, tech) in &scenario.technologies {
        let vars = &ctx.vars.techs[id];

        // size = existing + purchase
        problem.add_row(
            tech.existing_kw.value()..=tech.existing_kw.value(),
            [(vars.size, 1.0), (vars.purchase_size, -1.0)],
        );

        let must_produce_available = !tech.is_dispatchable() || tech.no_turndown;
        for (t, &pf) in tech.production_factor.iter().enumerate() {
            let row = [(vars.production[t], 1.0), (vars.size, -pf)];
            if must_produce_available {
                problem.add_row(0.0..=0.0, row);
            } else {
                problem.add_row(..=0.0, row);
            }
        }

        if let Some(on) = &vars.on {
            // Output is zero when off and at least the minimum turndown when on
            let big_m = tech.min_turndown_fraction * tech.max_kw.value();
            for (t, &pf) in tech.production_factor.iter().enumerate() {
                problem.add_row(
                    ..=0.0,
                    [(vars.production[t], 1.0), (on[t], -tech.max_kw.value() * pf)],
                );
                problem.add_row(
                    -big_m..,
                    [
                        (vars.production[t], 1.0),
                        (vars.size, -tech.min_turndown_fraction),
                        (on[t], -big_m),
                    ],
                );
            }
        }

        if let (Some(fuel), Some(params), Some(fuel_per_kwh)) =
            (&vars.fuel, tech.fuel, tech.fuel_per_kwh())
        {
            for t in scenario.time_index.iter() {
                terms.push((fuel[t], 1.0));
                terms.push((vars.production[t], -fuel_per_kwh * dt));
                if let Some(on) = &vars.on {
                    terms.push((on[t], -params.burn_intercept * dt));
                }
                problem.add_row(0.0..=0.0, terms.drain(..));
            }
            problem.add_row(..=params.available, fuel.iter().map(|&var| (var, 1.0)));

            let fuel_cost: LinearExpr = fuel
                .iter()
                .map(|&var| (var, params.cost_per_unit * ctx.factors.pwf_fuel))
                .collect();
            ctx.costs.fuel += &fuel_cost;
        }

        if let Some(thermal) = &vars.thermal_production {
            for t in scenario.time_index.iter() {
                if tech.class == TechClass::Boiler {
                    // A boiler's output is all heat
                    problem.add_row(0.0..=0.0, [(thermal[t], 1.0), (vars.production[t], -1.0)]);
                } else {
                    problem.add_row(
                        ..=0.0,
                        [(thermal[t], 1.0), (vars.production[t], -tech.thermal_ratio)],
                    );
                }
            }
        }

        if let (Some(incentive), Some(params)) = (vars.incentive, tech.production_incentive) {
            // incentive <= rate * net production (the annual cap is a column bound)
            terms.push((incentive, 1.0));
            for t in scenario.time_index.iter() {
                terms.push((vars.production[t], -params.per_kwh.value() * dt));
                terms.push((vars.curtailment[t], params.per_kwh.value() * dt));
            }
            problem.add_row(..=0.0, terms.drain(..));

            let pwf = ctx
                .factors
                .pwf_incentive(params.years, scenario.financial.analysis_years);
            ctx.costs.incentive.add_term(incentive, pwf);
        }

        // O&M
        ctx.costs
            .fixed_om
            .add_term(vars.size, tech.om_cost_per_kw.value() * ctx.factors.pwf_om);
        let variable_om: LinearExpr = vars
            .production
            .iter()
            .map(|&var| (var, tech.om_cost_per_kwh.value() * dt * ctx.factors.pwf_om))
            .collect();
        ctx.costs.variable_om += &variable_om;

        // CHP standby charge, paid with the bill
        if tech.standby_charge_per_kw_month.value() > 0.0 {
            let months = scenario.time_index.months().len() as f64;
            ctx.costs.standby.add_term(
                vars.size,
                tech.standby_charge_per_kw_month.value() * months * ctx.factors.pwf_e,
            );
        }
    }
}

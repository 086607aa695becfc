//! Capital costs of new technology and storage capacity.
use super::cost_curve::add_cost_curve_constraints;
use crate::finance::effective_cost;
use crate::optimisation::BuildContext;
use crate::optimisation::problem::Problem;

/// Accumulate the capital cost of everything which may be purchased.
///
/// Costs are effective costs: installed cost less the present value of tax incentives, plus the
/// present value of any replacements.
pub fn add_capital_costs(problem: &mut Problem, ctx: &mut BuildContext) {
    let scenario = ctx.scenario;
    let discount_rate = ctx.factors.owner_discount_rate;
    let tax_rate = ctx.factors.owner_tax_rate;

    for (id, tech) in &scenario.technologies {
        let vars = &ctx.vars.techs[id];
        match (&tech.cost_curve, &vars.segments) {
            (Some(curve), Some(segments)) => {
                let capital = add_cost_curve_constraints(problem, ctx, tech, curve, segments);
                ctx.costs.capital += &capital;
            }
            _ => {
                let cost_per_kw = effective_cost(
                    tech.installed_cost_per_kw.value(),
                    &tech.incentives,
                    None,
                    discount_rate,
                    tax_rate,
                );
                let purchase_size = vars.purchase_size;
                ctx.costs.capital.add_term(purchase_size, cost_per_kw);
            }
        }
    }

    for (id, storage) in &scenario.storage {
        let vars = &ctx.vars.storage[id];
        let cost_per_kw = effective_cost(
            storage.installed_cost_per_kw.value(),
            &storage.incentives,
            storage.replace_kw,
            discount_rate,
            tax_rate,
        );
        let cost_per_kwh = effective_cost(
            storage.installed_cost_per_kwh.value(),
            &storage.incentives,
            storage.replace_kwh,
            discount_rate,
            tax_rate,
        );

        // Only capacity above what is already installed is paid for
        let (kw, kwh) = (vars.kw, vars.kwh);
        ctx.costs.capital.add_term(kw, cost_per_kw);
        ctx.costs.capital.add_term(kwh, cost_per_kwh);
        ctx.costs.capital.add_constant(
            -cost_per_kw * storage.existing_kw.value() - cost_per_kwh * storage.existing_kwh.value(),
        );
    }
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
    fn test_no_capital_cost_for_existing_capacity(scenario: Scenario) {
        let bau = scenario.business_as_usual();
        let mut problem = Problem::default();
        let mut ctx = BuildContext::new(&mut problem, &bau, FormulationMode::Lifecycle);
        add_capital_costs(&mut problem, &mut ctx);

        // Fix every size to existing capacity; the capital cost must be zero
        let mut solution = vec![0.0; problem.num_cols()];
        for (id, tech) in &bau.technologies {
            solution[ctx.vars.techs[id].size.index()] = tech.existing_kw.value();
        }
        for (id, storage) in &bau.storage {
            solution[ctx.vars.storage[id].kw.index()] = storage.existing_kw.value();
            solution[ctx.vars.storage[id].kwh.index()] = storage.existing_kwh.value();
        }
        assert_approx_eq!(f64, ctx.costs.capital.value(&solution), 0.0);
    }
}

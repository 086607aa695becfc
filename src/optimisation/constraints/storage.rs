//! Storage dynamics.
use crate::optimisation::BuildContext;
use crate::optimisation::problem::Problem;

/// Add state-of-charge and power constraints for every storage device.
///
/// A device which can never hold any energy has all of its variables fixed to zero instead.
pub fn add_storage_constraints(problem: &mut Problem, ctx: &BuildContext) {
    let dt = ctx.scenario.time_index.step_hours();
    let mut terms = Vec::new();

    for (id, storage) in &ctx.scenario.storage {
        let vars = &ctx.vars.storage[id];
        if storage.is_zero_capacity() {
            for var in vars.iter_all() {
                problem.fix(var, 0.0);
            }
            continue;
        }

        // Initial state of charge
        problem.add_row(
            0.0..=0.0,
            [(vars.soc[0], 1.0), (vars.kwh, -storage.soc_init_fraction)],
        );

        for t in ctx.scenario.time_index.iter() {
            // soc[t + 1] = soc[t] + dt * (charge_efficiency * charge - discharge / discharge_efficiency)
            terms.push((vars.soc[t + 1], 1.0));
            terms.push((vars.soc[t], -1.0));
            terms.push((vars.grid_to_storage[t], -dt * storage.charge_efficiency));
            for charge in vars.tech_to_storage.values() {
                terms.push((charge[t], -dt * storage.charge_efficiency));
            }
            terms.push((vars.discharge[t], dt / storage.discharge_efficiency));
            problem.add_row(0.0..=0.0, terms.drain(..));

            // Bounds on state of charge
            problem.add_row(
                0.0..,
                [(vars.soc[t + 1], 1.0), (vars.kwh, -storage.soc_min_fraction)],
            );
            problem.add_row(..=0.0, [(vars.soc[t + 1], 1.0), (vars.kwh, -1.0)]);

            // Power limits on discharging and charging
            problem.add_row(..=0.0, [(vars.discharge[t], 1.0), (vars.kw, -1.0)]);
            terms.push((vars.grid_to_storage[t], 1.0));
            for charge in vars.tech_to_storage.values() {
                terms.push((charge[t], 1.0));
            }
            terms.push((vars.kw, -1.0));
            problem.add_row(..=0.0, terms.drain(..));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::scenario;
    use crate::optimisation::{BuildContext, FormulationMode};
    use crate::scenario::Scenario;
    use crate::units::{Energy, Power};
    use rstest::rstest;

    #[rstest]
    fn test_zero_capacity_storage_is_fixed(scenario: Scenario) {
        let mut scenario = scenario;
        for storage in scenario.storage.values_mut() {
            *storage = storage.with_fixed_size(Power(0.0), Energy(0.0));
        }

        let mut problem = Problem::default();
        let ctx = BuildContext::new(&mut problem, &scenario, FormulationMode::Lifecycle);
        let rows_before = problem.num_rows();
        add_storage_constraints(&mut problem, &ctx);
        assert_eq!(problem.num_rows(), rows_before);

        for vars in ctx.vars.storage.values() {
            for var in vars.iter_all() {
                let column = &problem.columns()[var.index()];
                assert_eq!((column.lower, column.upper), (0.0, 0.0));
            }
        }
    }

    #[rstest]
    fn test_storage_rows(scenario: Scenario) {
        let mut problem = Problem::default();
        let ctx = BuildContext::new(&mut problem, &scenario, FormulationMode::Lifecycle);
        let rows_before = problem.num_rows();
        add_storage_constraints(&mut problem, &ctx);

        // One initial row plus five rows per time step for each device
        let n = scenario.time_index.len();
        assert_eq!(
            problem.num_rows() - rows_before,
            scenario.storage.len() * (1 + 5 * n)
        );
    }
}

//! Constraints for one node, one module per subsystem.
//!
//! Each builder adds rows to the shared [`Problem`] using the variables in the node's
//! [`BuildContext`], and builders which produce costs accumulate them on the context.
use super::BuildContext;
use super::problem::Problem;

mod balance;
mod capital;
mod cost_curve;
mod export;
mod outage;
mod production;
mod storage;
mod tariff;

/// Add every constraint for a node
pub fn add_node_constraints(problem: &mut Problem, ctx: &mut BuildContext) {
    storage::add_storage_constraints(problem, ctx);
    production::add_production_constraints(problem, ctx);
    balance::add_electric_balance(problem, ctx);
    balance::add_thermal_balance(problem, ctx);
    tariff::add_tariff_constraints(problem, ctx);
    export::add_export_constraints(problem, ctx);

    // The minimum charge depends on the rest of the bill
    tariff::add_min_charge_constraint(problem, ctx);

    outage::add_outage_constraints(problem, ctx);
    capital::add_capital_costs(problem, ctx);
}

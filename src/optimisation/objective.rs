//! Assembly of the objective from the cost expressions accumulated while building constraints.
//!
//! Every cost expression is a lifecycle present value before tax: year-one costs have already
//! been multiplied by the relevant present-worth factor. Taxes and ownership are applied here.
use super::problem::LinearExpr;
use crate::financial::ObjectiveFactors;

/// Named cost expressions for one node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostExpressions {
    /// Effective capital cost of new capacity
    pub capital: LinearExpr,
    /// Fixed O&M
    pub fixed_om: LinearExpr,
    /// Variable O&M
    pub variable_om: LinearExpr,
    /// Fuel burned while grid-connected
    pub fuel: LinearExpr,
    /// CHP standby charges
    pub standby: LinearExpr,
    /// Production incentives earned
    pub incentive: LinearExpr,
    /// Energy charges
    pub energy: LinearExpr,
    /// Monthly and time-of-use demand charges
    pub demand: LinearExpr,
    /// Fixed monthly charges
    pub fixed: LinearExpr,
    /// Coincident peak charges
    pub coincident_peak: LinearExpr,
    /// Amount added to the bill to reach the minimum charge
    pub min_charge_adder: LinearExpr,
    /// Credit for exported electricity
    pub export_benefit: LinearExpr,
    /// Outage costs: unserved load, microgrid upgrades and microgrid fuel
    pub outage: LinearExpr,
}

impl CostExpressions {
    /// The electricity bill, net of export credit
    pub fn bill(&self) -> LinearExpr {
        let mut bill = self.energy.clone();
        bill += &self.demand;
        bill += &self.fixed;
        bill += &self.coincident_peak;
        bill += &self.min_charge_adder;
        bill -= &self.export_benefit;
        bill
    }

    /// Total O&M
    pub fn om(&self) -> LinearExpr {
        self.fixed_om.clone() + self.variable_om.clone()
    }

    /// The after-tax lifecycle cost to be minimised
    pub fn total(&self, factors: &ObjectiveFactors) -> LinearExpr {
        let mut total = LinearExpr::default();
        if factors.include_capital {
            total.add_scaled(&self.capital, factors.third_party_factor);
        }
        total.add_scaled(&self.om(), 1.0 - factors.owner_tax_rate);

        let mut offtaker_costs = self.fuel.clone();
        offtaker_costs += &self.standby;
        offtaker_costs += &self.bill();
        total.add_scaled(&offtaker_costs, 1.0 - factors.offtaker_tax_rate);

        total.add_scaled(&self.incentive, -(1.0 - factors.owner_tax_rate));
        total += &self.outage;

        total
    }
}

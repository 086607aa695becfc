//! Financial assumptions and the present-worth factors derived from them.
use crate::finance::{annuity, third_party_factor};

/// Financial assumptions for a scenario
#[derive(Debug, Clone, PartialEq)]
pub struct Financial {
    /// Length of the analysis period in years
    pub analysis_years: u32,
    /// Discount rate of the site owner (host)
    pub offtaker_discount_rate: f64,
    /// Discount rate of the system owner, if different from the offtaker
    pub owner_discount_rate: f64,
    /// Tax rate of the site owner
    pub offtaker_tax_rate: f64,
    /// Tax rate of the system owner
    pub owner_tax_rate: f64,
    /// Whether a third party owns the system
    pub third_party_ownership: bool,
    /// Annual escalation of electricity costs
    pub elec_cost_escalation_rate: f64,
    /// Annual escalation of O&M costs
    pub om_cost_escalation_rate: f64,
    /// Annual escalation of fuel costs
    pub fuel_cost_escalation_rate: f64,
}

impl Default for Financial {
    fn default() -> Self {
        Self {
            analysis_years: 25,
            offtaker_discount_rate: 0.0638,
            owner_discount_rate: 0.0638,
            offtaker_tax_rate: 0.26,
            owner_tax_rate: 0.26,
            third_party_ownership: false,
            elec_cost_escalation_rate: 0.017,
            om_cost_escalation_rate: 0.025,
            fuel_cost_escalation_rate: 0.015,
        }
    }
}

/// Multipliers applied to cost terms when assembling the objective
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveFactors {
    /// Present-worth factor for electricity costs
    pub pwf_e: f64,
    /// Present-worth factor for O&M costs
    pub pwf_om: f64,
    /// Present-worth factor for fuel costs
    pub pwf_fuel: f64,
    /// Present-worth factor for the offtaker
    pub pwf_offtaker: f64,
    /// Present-worth factor for the owner
    pub pwf_owner: f64,
    /// Multiplier on capital costs
    pub third_party_factor: f64,
    /// Tax rate applied to bill and fuel costs
    pub offtaker_tax_rate: f64,
    /// Tax rate applied to O&M costs and incentives
    pub owner_tax_rate: f64,
    /// Discount rate used for effective capital costs
    pub owner_discount_rate: f64,
    /// Whether capital costs are included
    pub include_capital: bool,
}

impl ObjectiveFactors {
    /// Factors for a single horizon with no discounting, no taxes and no capital costs
    pub fn single_horizon() -> Self {
        Self {
            pwf_e: 1.0,
            pwf_om: 1.0,
            pwf_fuel: 1.0,
            pwf_offtaker: 1.0,
            pwf_owner: 1.0,
            third_party_factor: 1.0,
            offtaker_tax_rate: 0.0,
            owner_tax_rate: 0.0,
            owner_discount_rate: 0.0,
            include_capital: false,
        }
    }

    /// Present-worth factor for a production incentive lasting `years`
    pub fn pwf_incentive(&self, years: u32, analysis_years: u32) -> f64 {
        if !self.include_capital {
            return 1.0;
        }

        annuity(years.min(analysis_years), 0.0, self.owner_discount_rate)
    }
}

impl Financial {
    /// Discount rate of whichever party owns the system
    fn system_owner_discount_rate(&self) -> f64 {
        if self.third_party_ownership {
            self.owner_discount_rate
        } else {
            self.offtaker_discount_rate
        }
    }

    /// Tax rate of whichever party owns the system
    pub fn system_owner_tax_rate(&self) -> f64 {
        if self.third_party_ownership {
            self.owner_tax_rate
        } else {
            self.offtaker_tax_rate
        }
    }

    /// Calculate the lifecycle factors for the objective
    pub fn factors(&self) -> ObjectiveFactors {
        let owner_discount_rate = self.system_owner_discount_rate();
        let third_party_factor = if self.third_party_ownership {
            third_party_factor(
                self.analysis_years,
                self.offtaker_discount_rate,
                self.offtaker_tax_rate,
                self.owner_discount_rate,
                self.owner_tax_rate,
            )
        } else {
            1.0
        };

        ObjectiveFactors {
            pwf_e: annuity(
                self.analysis_years,
                self.elec_cost_escalation_rate,
                self.offtaker_discount_rate,
            ),
            pwf_om: annuity(
                self.analysis_years,
                self.om_cost_escalation_rate,
                owner_discount_rate,
            ),
            pwf_fuel: annuity(
                self.analysis_years,
                self.fuel_cost_escalation_rate,
                self.offtaker_discount_rate,
            ),
            pwf_offtaker: annuity(self.analysis_years, 0.0, self.offtaker_discount_rate),
            pwf_owner: annuity(self.analysis_years, 0.0, owner_discount_rate),
            third_party_factor,
            offtaker_tax_rate: self.offtaker_tax_rate,
            owner_tax_rate: self.system_owner_tax_rate(),
            owner_discount_rate,
            include_capital: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_factors_no_discounting() {
        let financial = Financial {
            analysis_years: 20,
            offtaker_discount_rate: 0.0,
            owner_discount_rate: 0.0,
            elec_cost_escalation_rate: 0.0,
            om_cost_escalation_rate: 0.0,
            fuel_cost_escalation_rate: 0.0,
            ..Default::default()
        };
        let factors = financial.factors();
        assert_approx_eq!(f64, factors.pwf_e, 20.0);
        assert_approx_eq!(f64, factors.pwf_om, 20.0);
        assert_approx_eq!(f64, factors.third_party_factor, 1.0);
        assert_approx_eq!(f64, factors.pwf_incentive(10, 20), 10.0);
    }

    #[test]
    fn test_third_party_uses_owner_rates() {
        let financial = Financial {
            third_party_ownership: true,
            owner_discount_rate: 0.1,
            owner_tax_rate: 0.0,
            ..Default::default()
        };
        let factors = financial.factors();
        assert_approx_eq!(f64, factors.owner_tax_rate, 0.0);
        assert!(factors.third_party_factor != 1.0);
    }

    #[test]
    fn test_single_horizon() {
        let factors = ObjectiveFactors::single_horizon();
        assert!(!factors.include_capital);
        assert_approx_eq!(f64, factors.pwf_incentive(10, 20), 1.0);
    }
}

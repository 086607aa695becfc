//! Technologies which produce electricity or heat at a site.
use crate::finance::CapitalIncentives;
use crate::id::TechID;
use crate::units::{MoneyPerEnergy, MoneyPerPower, Power};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A map of technologies, keyed by ID
pub type TechnologyMap = IndexMap<TechID, Technology>;

/// The class of a technology, which determines how it is modelled
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
pub enum TechClass {
    /// Solar photovoltaic array
    #[serde(rename = "PV")]
    #[strum(serialize = "PV")]
    Pv,
    /// Wind turbine
    Wind,
    /// Fuel-burning electric generator
    Generator,
    /// Combined heat and power
    #[serde(rename = "CHP")]
    #[strum(serialize = "CHP")]
    Chp,
    /// Fuel-burning boiler producing heat only
    Boiler,
}

/// A straight-line piece of a capital cost curve, valid over a range of purchased sizes
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CostSegment {
    /// Smallest purchased size covered by this segment
    pub min_kw: Power,
    /// Largest purchased size covered by this segment
    pub max_kw: Power,
    /// Marginal cost within the segment
    pub slope: MoneyPerPower,
    /// Fixed cost incurred if this segment is chosen
    pub intercept: f64,
}

/// Fuel consumption and availability for fuel-burning technologies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelParams {
    /// Fuel burned per kWh of energy converted (electricity for generators and CHP, fuel energy
    /// input for boilers)
    pub burn_slope: f64,
    /// Fuel burned per hour while running, regardless of output
    pub burn_intercept: f64,
    /// Cost per unit of fuel
    pub cost_per_unit: f64,
    /// Total fuel available over the year (or during an outage)
    pub available: f64,
}

/// A payment for each kWh produced, for a limited number of years
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductionIncentive {
    /// Incentive per kWh produced
    pub per_kwh: MoneyPerEnergy,
    /// Maximum incentive paid per year
    pub max_per_year: f64,
    /// Number of years for which the incentive is paid
    pub years: u32,
}

/// A technology which may be sized and dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct Technology {
    /// Unique identifier
    pub id: TechID,
    /// How the technology is modelled
    pub class: TechClass,
    /// Minimum total size
    pub min_kw: Power,
    /// Maximum total size (must be finite)
    pub max_kw: Power,
    /// Capacity already installed at the site
    pub existing_kw: Power,
    /// Cost per kW of new capacity, before incentives
    pub installed_cost_per_kw: MoneyPerPower,
    /// Piecewise-linear capital cost, used instead of `installed_cost_per_kw` if present
    pub cost_curve: Option<Vec<CostSegment>>,
    /// Tax incentives reducing capital cost
    pub incentives: CapitalIncentives,
    /// Fixed O&M cost per kW per year
    pub om_cost_per_kw: MoneyPerPower,
    /// Variable O&M cost per kWh produced
    pub om_cost_per_kwh: MoneyPerEnergy,
    /// Whether output can be curtailed
    pub can_curtail: bool,
    /// Whether output can be exported
    pub can_export: bool,
    /// Whether the technology can run during a grid outage
    pub can_serve_outage: bool,
    /// Whether the technology must produce at its full rating
    pub no_turndown: bool,
    /// Minimum output while running, as a fraction of size
    pub min_turndown_fraction: f64,
    /// Available output per kW of size at each time step
    pub production_factor: Vec<f64>,
    /// Fuel parameters, for fuel-burning technologies
    pub fuel: Option<FuelParams>,
    /// Heat recovered per kWh of electricity (CHP only)
    pub thermal_ratio: f64,
    /// Conversion efficiency of fuel to heat (boilers only)
    pub efficiency: f64,
    /// Standby charge per kW of size per month (CHP only)
    pub standby_charge_per_kw_month: MoneyPerPower,
    /// Production-based incentive
    pub production_incentive: Option<ProductionIncentive>,
}

impl Technology {
    /// Whether the technology burns fuel
    pub fn is_fuel_burning(&self) -> bool {
        self.fuel.is_some()
    }

    /// Whether the technology produces heat
    pub fn is_thermal(&self) -> bool {
        matches!(self.class, TechClass::Chp | TechClass::Boiler)
    }

    /// Whether the technology produces electricity
    pub fn is_electric(&self) -> bool {
        self.class != TechClass::Boiler
    }

    /// Whether output can be controlled, i.e. the technology is not weather-dependent
    pub fn is_dispatchable(&self) -> bool {
        !matches!(self.class, TechClass::Pv | TechClass::Wind)
    }

    /// Whether capital cost is described by a cost curve
    pub fn has_segmented_cost(&self) -> bool {
        self.cost_curve.is_some()
    }

    /// Whether the technology needs on/off binaries to enforce a minimum turndown
    pub fn has_turndown(&self) -> bool {
        self.min_turndown_fraction > 0.0 && !self.no_turndown
    }

    /// Fuel burned per kWh of output, if the technology burns fuel.
    ///
    /// A boiler burns more fuel than the heat it delivers, in proportion to its efficiency.
    pub fn fuel_per_kwh(&self) -> Option<f64> {
        let fuel = self.fuel?;
        if self.class == TechClass::Boiler {
            Some(fuel.burn_slope / self.efficiency)
        } else {
            Some(fuel.burn_slope)
        }
    }

    /// A copy of the technology whose size is fixed to the given value.
    ///
    /// The capacity is treated as existing so that no capital cost is incurred.
    pub fn with_fixed_size(&self, size: Power) -> Self {
        Self {
            min_kw: size,
            max_kw: size,
            existing_kw: size,
            cost_curve: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{generator, pv};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    fn test_pv_predicates(pv: Technology) {
        assert!(!pv.is_fuel_burning());
        assert!(!pv.is_thermal());
        assert!(pv.is_electric());
        assert!(!pv.is_dispatchable());
        assert!(!pv.has_turndown());
    }

    #[rstest]
    fn test_generator_predicates(generator: Technology) {
        assert!(generator.is_fuel_burning());
        assert!(generator.is_dispatchable());
        assert!(generator.has_turndown());
    }

    #[rstest]
    fn test_fuel_per_kwh(pv: Technology, generator: Technology) {
        assert_eq!(pv.fuel_per_kwh(), None);
        assert_approx_eq!(f64, generator.fuel_per_kwh().unwrap(), 0.07);

        // The same fuel curve burns more per kWh of heat in a less efficient boiler
        let boiler = Technology {
            id: "boiler".into(),
            class: TechClass::Boiler,
            efficiency: 0.8,
            ..generator
        };
        assert_approx_eq!(f64, boiler.fuel_per_kwh().unwrap(), 0.07 / 0.8);
    }

    #[test]
    fn test_tech_class_strings() {
        assert_eq!(TechClass::from_str("PV").unwrap(), TechClass::Pv);
        assert_eq!(TechClass::Chp.to_string(), "CHP");
        assert_eq!(TechClass::Generator.to_string(), "Generator");
    }

    #[rstest]
    fn test_with_fixed_size(pv: Technology) {
        let fixed = pv.with_fixed_size(Power(50.0));
        assert_eq!(fixed.min_kw, Power(50.0));
        assert_eq!(fixed.max_kw, Power(50.0));
        assert_eq!(fixed.existing_kw, Power(50.0));
    }
}

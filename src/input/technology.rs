//! Technologies as given in a scenario file.
use super::{TimeSeriesInput, Violations};
use crate::finance::CapitalIncentives;
use crate::technology::{CostSegment, FuelParams, ProductionIncentive, TechClass, Technology};
use crate::units::{MoneyPerEnergy, MoneyPerPower, Power};
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

/// Fuel-to-heat efficiency of a boiler, if none is given
const DEFAULT_BOILER_EFFICIENCY: f64 = 0.8;

fn default_true() -> bool {
    true
}

/// One `[[technologies]]` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TechnologyParams {
    id: String,
    class: TechClass,
    #[serde(default)]
    min_kw: f64,
    max_kw: f64,
    #[serde(default)]
    existing_kw: f64,
    #[serde(default)]
    installed_cost_per_kw: f64,
    cost_curve: Option<Vec<CostSegment>>,
    #[serde(default)]
    itc_fraction: f64,
    #[serde(default)]
    macrs_schedule: Vec<f64>,
    #[serde(default)]
    macrs_bonus_fraction: f64,
    #[serde(default)]
    om_cost_per_kw: f64,
    #[serde(default)]
    om_cost_per_kwh: f64,
    #[serde(default = "default_true")]
    can_curtail: bool,
    #[serde(default = "default_true")]
    can_export: bool,
    #[serde(default = "default_true")]
    can_serve_outage: bool,
    #[serde(default)]
    no_turndown: bool,
    #[serde(default)]
    min_turndown_fraction: f64,
    /// Required for weather-dependent technologies, otherwise always 1
    production_factor: Option<TimeSeriesInput>,
    fuel_burn_slope: Option<f64>,
    #[serde(default)]
    fuel_burn_intercept: f64,
    #[serde(default)]
    fuel_cost_per_unit: f64,
    fuel_available: Option<f64>,
    #[serde(default)]
    thermal_ratio: f64,
    efficiency: Option<f64>,
    #[serde(default)]
    chp_standby_charge_per_kw_month: f64,
    incentive_per_kwh: Option<f64>,
    incentive_max_per_year: Option<f64>,
    incentive_years: Option<u32>,
}

impl TechnologyParams {
    /// Check every field and build the technology.
    ///
    /// # Arguments
    ///
    /// * `base_dir` - Directory against which CSV paths are resolved
    /// * `len` - Number of time steps modelled
    pub fn into_technology(self, base_dir: &Path, len: usize) -> Result<Technology> {
        let mut violations = Violations::new(format!("technology {}", self.id));
        let weather_dependent = matches!(self.class, TechClass::Pv | TechClass::Wind);
        let production_factor = match &self.production_factor {
            Some(series) => series.resolve(base_dir, len)?,
            None => {
                violations.check(!weather_dependent, || {
                    format!("production_factor must be given for {} technologies", self.class)
                });
                vec![1.0; len]
            }
        };

        let burns_fuel = matches!(
            self.class,
            TechClass::Generator | TechClass::Chp | TechClass::Boiler
        );
        violations.check(!burns_fuel || self.fuel_burn_slope.is_some(), || {
            format!("fuel_burn_slope must be given for {} technologies", self.class)
        });
        let fuel = match self.fuel_burn_slope {
            Some(burn_slope) if burns_fuel => Some(FuelParams {
                burn_slope,
                burn_intercept: self.fuel_burn_intercept,
                cost_per_unit: self.fuel_cost_per_unit,
                available: self.fuel_available.unwrap_or(f64::INFINITY),
            }),
            _ => None,
        };

        let production_incentive = self.incentive_per_kwh.map(|per_kwh| ProductionIncentive {
            per_kwh: MoneyPerEnergy(per_kwh),
            max_per_year: self.incentive_max_per_year.unwrap_or(f64::INFINITY),
            years: self.incentive_years.unwrap_or(u32::MAX),
        });
        let efficiency = self.efficiency.unwrap_or(if self.class == TechClass::Boiler {
            DEFAULT_BOILER_EFFICIENCY
        } else {
            1.0
        });

        let tech = Technology {
            id: self.id.as_str().into(),
            class: self.class,
            min_kw: Power(self.min_kw),
            max_kw: Power(self.max_kw),
            existing_kw: Power(self.existing_kw),
            installed_cost_per_kw: MoneyPerPower(self.installed_cost_per_kw),
            cost_curve: self.cost_curve,
            incentives: CapitalIncentives {
                itc_fraction: self.itc_fraction,
                macrs_schedule: self.macrs_schedule,
                macrs_bonus_fraction: self.macrs_bonus_fraction,
            },
            om_cost_per_kw: MoneyPerPower(self.om_cost_per_kw),
            om_cost_per_kwh: MoneyPerEnergy(self.om_cost_per_kwh),
            can_curtail: self.can_curtail,
            can_export: self.can_export,
            can_serve_outage: self.can_serve_outage,
            no_turndown: self.no_turndown,
            min_turndown_fraction: self.min_turndown_fraction,
            production_factor,
            fuel,
            thermal_ratio: self.thermal_ratio,
            efficiency,
            standby_charge_per_kw_month: MoneyPerPower(self.chp_standby_charge_per_kw_month),
            production_incentive,
        };
        validate(&tech, &mut violations);
        violations.finish()?;

        Ok(tech)
    }
}

fn validate(tech: &Technology, violations: &mut Violations) {
    violations.non_negative("min_kw", tech.min_kw.value());
    violations.non_negative("max_kw", tech.max_kw.value());
    violations.non_negative("existing_kw", tech.existing_kw.value());
    violations.ordered("min_kw", tech.min_kw.value(), "max_kw", tech.max_kw.value());
    violations.ordered(
        "existing_kw",
        tech.existing_kw.value(),
        "max_kw",
        tech.max_kw.value(),
    );
    violations.non_negative("installed_cost_per_kw", tech.installed_cost_per_kw.value());
    violations.non_negative("om_cost_per_kw", tech.om_cost_per_kw.value());
    violations.non_negative("om_cost_per_kwh", tech.om_cost_per_kwh.value());
    violations.fraction("itc_fraction", tech.incentives.itc_fraction);
    violations.fraction("macrs_bonus_fraction", tech.incentives.macrs_bonus_fraction);
    violations.fraction("min_turndown_fraction", tech.min_turndown_fraction);
    violations.non_negative("thermal_ratio", tech.thermal_ratio);
    violations.efficiency("efficiency", tech.efficiency);
    violations.non_negative(
        "chp_standby_charge_per_kw_month",
        tech.standby_charge_per_kw_month.value(),
    );
    violations.check(
        tech.production_factor
            .iter()
            .all(|pf| (0.0..=1.0).contains(pf)),
        || "production_factor values must be between 0 and 1".to_string(),
    );

    if let Some(fuel) = &tech.fuel {
        violations.non_negative("fuel_burn_slope", fuel.burn_slope);
        violations.non_negative("fuel_burn_intercept", fuel.burn_intercept);
        violations.non_negative("fuel_cost_per_unit", fuel.cost_per_unit);
        violations.check(fuel.available >= 0.0, || {
            format!("fuel_available must be non-negative (got {})", fuel.available)
        });
    }

    if let Some(incentive) = &tech.production_incentive {
        violations.non_negative("incentive_per_kwh", incentive.per_kwh.value());
        violations.check(incentive.max_per_year >= 0.0, || {
            "incentive_max_per_year must be non-negative".to_string()
        });
    }

    violations.check(
        !tech.has_segmented_cost() || tech.installed_cost_per_kw.value() == 0.0,
        || "only one of installed_cost_per_kw and cost_curve may be given".to_string(),
    );
    if let Some(segments) = &tech.cost_curve {
        violations.check(!segments.is_empty(), || {
            "cost_curve must have at least one segment".to_string()
        });
        for (i, segment) in segments.iter().enumerate() {
            violations.ordered(
                &format!("cost_curve[{i}].min_kw"),
                segment.min_kw.value(),
                &format!("cost_curve[{i}].max_kw"),
                segment.max_kw.value(),
            );
            violations.check(segment.max_kw.is_finite(), || {
                format!("cost_curve[{i}].max_kw must be finite")
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ValidationError;
    use float_cmp::assert_approx_eq;

    fn parse(toml_str: &str) -> TechnologyParams {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_pv() {
        let tech = parse(
            "id = \"pv\"\nclass = \"PV\"\nmax_kw = 100.0\nproduction_factor = [0.0, 0.5]\n\
            itc_fraction = 0.3",
        )
        .into_technology(Path::new("."), 4)
        .unwrap();
        assert_eq!(tech.class, TechClass::Pv);
        assert_eq!(tech.production_factor, [0.0, 0.0, 0.5, 0.5]);
        assert!(tech.can_curtail);
        assert!(tech.fuel.is_none());
        assert_approx_eq!(f64, tech.incentives.itc_fraction, 0.3);
    }

    #[test]
    fn test_generator_defaults() {
        let tech = parse(
            "id = \"diesel\"\nclass = \"Generator\"\nmax_kw = 50.0\nfuel_burn_slope = 0.07\n\
            fuel_cost_per_unit = 3.0",
        )
        .into_technology(Path::new("."), 2)
        .unwrap();
        assert_eq!(tech.production_factor, [1.0, 1.0]);
        let fuel = tech.fuel.unwrap();
        assert_eq!(fuel.available, f64::INFINITY);
        assert_eq!(fuel.burn_intercept, 0.0);
    }

    #[test]
    fn test_boiler_efficiency() {
        let tech = parse(
            "id = \"boiler\"\nclass = \"Boiler\"\nmax_kw = 50.0\nfuel_burn_slope = 1.0",
        )
        .into_technology(Path::new("."), 2)
        .unwrap();
        assert_approx_eq!(f64, tech.efficiency, DEFAULT_BOILER_EFFICIENCY);
        assert!(tech.is_thermal());
    }

    #[test]
    fn test_all_violations_reported() {
        let err = parse("id = \"wind\"\nclass = \"Wind\"\nmax_kw = inf\nitc_fraction = 2.0")
            .into_technology(Path::new("."), 2)
            .unwrap_err();
        let err = err.downcast_ref::<ValidationError>().unwrap();
        assert_eq!(err.object, "technology wind");
        assert_eq!(
            err.violations,
            [
                "production_factor must be given for Wind technologies",
                "max_kw must be a non-negative number (got inf)",
                "itc_fraction must be between 0 and 1 (got 2)",
            ]
        );
    }

    #[test]
    fn test_cost_curve_replaces_linear_cost() {
        let pv = "id = \"pv\"\nclass = \"PV\"\nmax_kw = 100.0\nproduction_factor = [0.5, 0.5]\n\
            cost_curve = [{ min_kw = 0.0, max_kw = 100.0, slope = 900.0, intercept = 5000.0 }]\n";
        let tech = parse(pv).into_technology(Path::new("."), 2).unwrap();
        assert!(tech.has_segmented_cost());

        let err = parse(&format!("{pv}installed_cost_per_kw = 1000.0"))
            .into_technology(Path::new("."), 2)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>().unwrap().violations,
            ["only one of installed_cost_per_kw and cost_curve may be given"]
        );
    }
}

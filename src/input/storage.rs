//! Storage devices as given in a scenario file.
use super::Violations;
use crate::finance::{CapitalIncentives, Replacement};
use crate::storage::{StorageType, storage_defaults};
use crate::units::{Energy, MoneyPerEnergy, MoneyPerPower, Power};
use anyhow::{Context, Result};
use serde::Deserialize;

fn default_kind() -> String {
    "ElectricStorage".to_string()
}

/// One `[[storage]]` entry.
///
/// Efficiencies, state-of-charge fractions and the grid-charging and outage flags default to the
/// values for the storage kind.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageParams {
    id: String,
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(default)]
    min_kw: f64,
    max_kw: f64,
    #[serde(default)]
    min_kwh: f64,
    max_kwh: f64,
    #[serde(default)]
    existing_kw: f64,
    #[serde(default)]
    existing_kwh: f64,
    charge_efficiency: Option<f64>,
    discharge_efficiency: Option<f64>,
    soc_min_fraction: Option<f64>,
    soc_init_fraction: Option<f64>,
    can_grid_charge: Option<bool>,
    can_serve_outage: Option<bool>,
    #[serde(default)]
    installed_cost_per_kw: f64,
    #[serde(default)]
    installed_cost_per_kwh: f64,
    replace_cost_per_kw: Option<f64>,
    replace_year_kw: Option<u32>,
    replace_cost_per_kwh: Option<f64>,
    replace_year_kwh: Option<u32>,
    #[serde(default)]
    itc_fraction: f64,
    #[serde(default)]
    macrs_schedule: Vec<f64>,
    #[serde(default)]
    macrs_bonus_fraction: f64,
}

/// A replacement is only made if both its cost and year are given
fn replacement(cost: Option<f64>, year: Option<u32>) -> Option<Replacement> {
    Some(Replacement {
        cost: cost?,
        year: year?,
    })
}

impl StorageParams {
    /// Check every field and build the storage device
    pub fn into_storage(self) -> Result<StorageType> {
        let defaults = storage_defaults(&self.kind)
            .with_context(|| format!("Invalid kind for storage {}", self.id))?;
        let storage = StorageType {
            id: self.id.as_str().into(),
            kind: defaults.kind,
            min_kw: Power(self.min_kw),
            max_kw: Power(self.max_kw),
            min_kwh: Energy(self.min_kwh),
            max_kwh: Energy(self.max_kwh),
            existing_kw: Power(self.existing_kw),
            existing_kwh: Energy(self.existing_kwh),
            charge_efficiency: self.charge_efficiency.unwrap_or(defaults.charge_efficiency),
            discharge_efficiency: self
                .discharge_efficiency
                .unwrap_or(defaults.discharge_efficiency),
            soc_min_fraction: self.soc_min_fraction.unwrap_or(defaults.soc_min_fraction),
            soc_init_fraction: self.soc_init_fraction.unwrap_or(defaults.soc_init_fraction),
            can_grid_charge: self.can_grid_charge.unwrap_or(defaults.can_grid_charge),
            can_serve_outage: self.can_serve_outage.unwrap_or(defaults.can_serve_outage),
            installed_cost_per_kw: MoneyPerPower(self.installed_cost_per_kw),
            installed_cost_per_kwh: MoneyPerEnergy(self.installed_cost_per_kwh),
            replace_kw: replacement(self.replace_cost_per_kw, self.replace_year_kw),
            replace_kwh: replacement(self.replace_cost_per_kwh, self.replace_year_kwh),
            incentives: CapitalIncentives {
                itc_fraction: self.itc_fraction,
                macrs_schedule: self.macrs_schedule,
                macrs_bonus_fraction: self.macrs_bonus_fraction,
            },
        };
        validate(&storage)?;

        Ok(storage)
    }
}

fn validate(storage: &StorageType) -> Result<()> {
    let mut violations = Violations::new(format!("storage {}", storage.id));
    violations.non_negative("min_kw", storage.min_kw.value());
    violations.non_negative("max_kw", storage.max_kw.value());
    violations.non_negative("min_kwh", storage.min_kwh.value());
    violations.non_negative("max_kwh", storage.max_kwh.value());
    violations.non_negative("existing_kw", storage.existing_kw.value());
    violations.non_negative("existing_kwh", storage.existing_kwh.value());
    violations.ordered(
        "min_kw",
        storage.min_kw.value(),
        "max_kw",
        storage.max_kw.value(),
    );
    violations.ordered(
        "min_kwh",
        storage.min_kwh.value(),
        "max_kwh",
        storage.max_kwh.value(),
    );
    violations.ordered(
        "existing_kw",
        storage.existing_kw.value(),
        "max_kw",
        storage.max_kw.value(),
    );
    violations.ordered(
        "existing_kwh",
        storage.existing_kwh.value(),
        "max_kwh",
        storage.max_kwh.value(),
    );
    violations.efficiency("charge_efficiency", storage.charge_efficiency);
    violations.efficiency("discharge_efficiency", storage.discharge_efficiency);
    violations.fraction("soc_min_fraction", storage.soc_min_fraction);
    violations.fraction("soc_init_fraction", storage.soc_init_fraction);
    violations.ordered(
        "soc_min_fraction",
        storage.soc_min_fraction,
        "soc_init_fraction",
        storage.soc_init_fraction,
    );
    violations.non_negative("installed_cost_per_kw", storage.installed_cost_per_kw.value());
    violations.non_negative(
        "installed_cost_per_kwh",
        storage.installed_cost_per_kwh.value(),
    );
    violations.fraction("itc_fraction", storage.incentives.itc_fraction);
    violations.fraction("macrs_bonus_fraction", storage.incentives.macrs_bonus_fraction);
    violations.finish()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ValidationError;
    use crate::storage::StorageKind;

    #[test]
    fn test_kind_defaults() {
        let params: StorageParams = toml::from_str(
            "id = \"tes\"\nkind = \"HotThermalStorage\"\nmax_kw = 50.0\nmax_kwh = 200.0",
        )
        .unwrap();
        let storage = params.into_storage().unwrap();
        assert_eq!(storage.kind, StorageKind::HotThermalStorage);
        assert_eq!(storage.charge_efficiency, 0.95);
        assert!(!storage.can_grid_charge);
        assert!(storage.replace_kw.is_none());
    }

    #[test]
    fn test_replacement_needs_cost_and_year() {
        let params: StorageParams = toml::from_str(
            "id = \"battery\"\nmax_kw = 50.0\nmax_kwh = 200.0\nreplace_cost_per_kw = 410.0\n\
            replace_year_kw = 10\nreplace_cost_per_kwh = 200.0",
        )
        .unwrap();
        let storage = params.into_storage().unwrap();
        assert_eq!(
            storage.replace_kw,
            Some(Replacement {
                cost: 410.0,
                year: 10
            })
        );
        assert!(storage.replace_kwh.is_none());
    }

    #[test]
    fn test_all_violations_reported() {
        let params: StorageParams = toml::from_str(
            "id = \"battery\"\nmax_kw = -5.0\nmax_kwh = 200.0\ncharge_efficiency = 0.0\n\
            soc_min_fraction = 0.8",
        )
        .unwrap();
        let err = params.into_storage().unwrap_err();
        let err = err.downcast_ref::<ValidationError>().unwrap();
        assert_eq!(err.object, "storage battery");
        // max_kw is negative and below both min_kw and existing_kw, efficiency is zero and
        // soc_min is above soc_init
        assert_eq!(err.violations.len(), 5);
    }

    #[test]
    fn test_unknown_kind() {
        let params: StorageParams =
            toml::from_str("id = \"fly\"\nkind = \"Flywheel\"\nmax_kw = 1.0\nmax_kwh = 1.0")
                .unwrap();
        assert!(params.into_storage().is_err());
    }
}

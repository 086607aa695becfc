//! Storage devices which can be charged and discharged.
use crate::finance::{CapitalIncentives, Replacement};
use crate::id::StorageID;
use crate::units::{Energy, MoneyPerEnergy, MoneyPerPower, Power};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;

/// A map of storage types, keyed by ID
pub type StorageMap = IndexMap<StorageID, StorageType>;

/// The kind of energy a storage device holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
pub enum StorageKind {
    /// Electrical battery
    ElectricStorage,
    /// Hot water or other heat store
    HotThermalStorage,
}

/// Default values for a kind of storage, which users' parameters override
#[derive(Debug, Clone, PartialEq)]
pub struct StorageDefaults {
    /// The kind of storage
    pub kind: StorageKind,
    /// Fraction of energy retained when charging
    pub charge_efficiency: f64,
    /// Fraction of energy retained when discharging
    pub discharge_efficiency: f64,
    /// Minimum state of charge as a fraction of energy capacity
    pub soc_min_fraction: f64,
    /// Initial state of charge as a fraction of energy capacity
    pub soc_init_fraction: f64,
    /// Whether the device may be charged from the grid
    pub can_grid_charge: bool,
    /// Whether the device can serve critical load during an outage
    pub can_serve_outage: bool,
}

fn electric_storage() -> StorageDefaults {
    StorageDefaults {
        kind: StorageKind::ElectricStorage,
        charge_efficiency: 0.96,
        discharge_efficiency: 0.96,
        soc_min_fraction: 0.2,
        soc_init_fraction: 0.5,
        can_grid_charge: true,
        can_serve_outage: true,
    }
}

fn hot_thermal_storage() -> StorageDefaults {
    StorageDefaults {
        kind: StorageKind::HotThermalStorage,
        charge_efficiency: 0.95,
        discharge_efficiency: 0.95,
        soc_min_fraction: 0.1,
        soc_init_fraction: 0.5,
        can_grid_charge: false,
        can_serve_outage: false,
    }
}

/// Storage kinds by name, with a constructor for their defaults
pub static STORAGE_KINDS: &[(&str, fn() -> StorageDefaults)] = &[
    ("ElectricStorage", electric_storage),
    ("HotThermalStorage", hot_thermal_storage),
];

/// Look up the defaults for a kind of storage by name
pub fn storage_defaults(kind: &str) -> Result<StorageDefaults> {
    let (_, constructor) = STORAGE_KINDS
        .iter()
        .find(|(name, _)| *name == kind)
        .with_context(|| {
            let names: Vec<_> = STORAGE_KINDS.iter().map(|(name, _)| *name).collect();
            format!(
                "Unknown storage kind '{kind}'. Valid kinds are: {}",
                names.join(", ")
            )
        })?;

    Ok(constructor())
}

/// A storage device which may be sized and dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct StorageType {
    /// Unique identifier
    pub id: StorageID,
    /// The kind of energy stored
    pub kind: StorageKind,
    /// Minimum power capacity
    pub min_kw: Power,
    /// Maximum power capacity
    pub max_kw: Power,
    /// Minimum energy capacity
    pub min_kwh: Energy,
    /// Maximum energy capacity
    pub max_kwh: Energy,
    /// Power capacity already installed
    pub existing_kw: Power,
    /// Energy capacity already installed
    pub existing_kwh: Energy,
    /// Fraction of energy retained when charging
    pub charge_efficiency: f64,
    /// Fraction of energy retained when discharging
    pub discharge_efficiency: f64,
    /// Minimum state of charge as a fraction of energy capacity
    pub soc_min_fraction: f64,
    /// Initial state of charge as a fraction of energy capacity
    pub soc_init_fraction: f64,
    /// Whether the device may be charged from the grid
    pub can_grid_charge: bool,
    /// Whether the device can serve critical load during an outage
    pub can_serve_outage: bool,
    /// Cost per kW of new power capacity
    pub installed_cost_per_kw: MoneyPerPower,
    /// Cost per kWh of new energy capacity
    pub installed_cost_per_kwh: MoneyPerEnergy,
    /// Replacement of the power electronics
    pub replace_kw: Option<Replacement>,
    /// Replacement of the cells
    pub replace_kwh: Option<Replacement>,
    /// Tax incentives reducing capital cost
    pub incentives: CapitalIncentives,
}

impl StorageType {
    /// Whether either capacity bound is zero, so the device can never be used
    pub fn is_zero_capacity(&self) -> bool {
        self.max_kw.value() <= 0.0 || self.max_kwh.value() <= 0.0
    }

    /// Whether the device holds electricity
    pub fn is_electric(&self) -> bool {
        self.kind == StorageKind::ElectricStorage
    }

    /// A copy of the device with both capacities fixed.
    ///
    /// The capacity is treated as existing so that no capital cost is incurred.
    pub fn with_fixed_size(&self, kw: Power, kwh: Energy) -> Self {
        Self {
            min_kw: kw,
            max_kw: kw,
            min_kwh: kwh,
            max_kwh: kwh,
            existing_kw: kw,
            existing_kwh: kwh,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, battery};
    use rstest::rstest;

    #[test]
    fn test_storage_defaults() {
        let defaults = storage_defaults("HotThermalStorage").unwrap();
        assert_eq!(defaults.kind, StorageKind::HotThermalStorage);
        assert!(!defaults.can_grid_charge);

        assert_error!(
            storage_defaults("FlywheelStorage"),
            "Unknown storage kind 'FlywheelStorage'. Valid kinds are: ElectricStorage, \
            HotThermalStorage"
        );
    }

    #[test]
    fn test_storage_kinds_match_names() {
        for (name, constructor) in STORAGE_KINDS {
            assert_eq!(constructor().kind.to_string(), *name);
        }
    }

    #[rstest]
    fn test_is_zero_capacity(battery: StorageType) {
        assert!(!battery.is_zero_capacity());
        let fixed = battery.with_fixed_size(Power(0.0), Energy(100.0));
        assert!(fixed.is_zero_capacity());
    }
}

//! Fixtures for tests
use crate::finance::{CapitalIncentives, Replacement};
use crate::financial::Financial;
use crate::load::{CsvReferenceProfiles, LoadProfile, LoadSpec};
use crate::outage::{OutageCostPolicy, OutageScenarios};
use crate::scenario::Scenario;
use crate::storage::{StorageType, storage_defaults};
use crate::tariff::Tariff;
use crate::technology::{FuelParams, TechClass, Technology};
use crate::time_index::TimeIndex;
use crate::units::{Energy, MoneyPerEnergy, MoneyPerPower, Power};
use indexmap::indexmap;
use rstest::fixture;
use std::path::PathBuf;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Number of time steps in the fixture scenario
pub const NUM_TIME_STEPS: usize = 24;

/// A day of solar output, peaking at noon
pub fn solar_profile() -> Vec<f64> {
    (0..NUM_TIME_STEPS)
        .map(|hour| match hour {
            6..=18 => 1.0 - ((hour as f64 - 12.0) / 6.0).powi(2),
            _ => 0.0,
        })
        .collect()
}

#[fixture]
pub fn pv() -> Technology {
    Technology {
        id: "pv".into(),
        class: TechClass::Pv,
        min_kw: Power(0.0),
        max_kw: Power(500.0),
        existing_kw: Power(10.0),
        installed_cost_per_kw: MoneyPerPower(1600.0),
        cost_curve: None,
        incentives: CapitalIncentives {
            itc_fraction: 0.3,
            macrs_schedule: vec![0.2, 0.32, 0.192, 0.1152, 0.1152, 0.0576],
            macrs_bonus_fraction: 0.0,
        },
        om_cost_per_kw: MoneyPerPower(16.0),
        om_cost_per_kwh: MoneyPerEnergy(0.0),
        can_curtail: true,
        can_export: true,
        can_serve_outage: true,
        no_turndown: false,
        min_turndown_fraction: 0.0,
        production_factor: solar_profile(),
        fuel: None,
        thermal_ratio: 0.0,
        efficiency: 1.0,
        standby_charge_per_kw_month: MoneyPerPower(0.0),
        production_incentive: None,
    }
}

#[fixture]
pub fn generator() -> Technology {
    Technology {
        id: "generator".into(),
        class: TechClass::Generator,
        min_kw: Power(0.0),
        max_kw: Power(100.0),
        existing_kw: Power(0.0),
        installed_cost_per_kw: MoneyPerPower(500.0),
        cost_curve: None,
        incentives: CapitalIncentives::default(),
        om_cost_per_kw: MoneyPerPower(10.0),
        om_cost_per_kwh: MoneyPerEnergy(0.02),
        can_curtail: false,
        can_export: false,
        can_serve_outage: true,
        no_turndown: false,
        min_turndown_fraction: 0.3,
        production_factor: vec![1.0; NUM_TIME_STEPS],
        fuel: Some(FuelParams {
            burn_slope: 0.07,
            burn_intercept: 0.5,
            cost_per_unit: 3.0,
            available: 1000.0,
        }),
        thermal_ratio: 0.0,
        efficiency: 1.0,
        standby_charge_per_kw_month: MoneyPerPower(0.0),
        production_incentive: None,
    }
}

#[fixture]
pub fn battery() -> StorageType {
    let defaults = storage_defaults("ElectricStorage").unwrap();
    StorageType {
        id: "battery".into(),
        kind: defaults.kind,
        min_kw: Power(0.0),
        max_kw: Power(100.0),
        min_kwh: Energy(0.0),
        max_kwh: Energy(400.0),
        existing_kw: Power(0.0),
        existing_kwh: Energy(0.0),
        charge_efficiency: defaults.charge_efficiency,
        discharge_efficiency: defaults.discharge_efficiency,
        soc_min_fraction: defaults.soc_min_fraction,
        soc_init_fraction: defaults.soc_init_fraction,
        can_grid_charge: defaults.can_grid_charge,
        can_serve_outage: defaults.can_serve_outage,
        installed_cost_per_kw: MoneyPerPower(840.0),
        installed_cost_per_kwh: MoneyPerEnergy(420.0),
        replace_kw: Some(Replacement {
            cost: 410.0,
            year: 10,
        }),
        replace_kwh: Some(Replacement {
            cost: 200.0,
            year: 10,
        }),
        incentives: CapitalIncentives::default(),
    }
}

/// An explicit load of `loads_kw` with no heating
pub fn explicit_load(loads_kw: Vec<f64>) -> LoadProfile {
    let len = loads_kw.len();
    let spec = LoadSpec::Explicit {
        loads_kw,
        is_net: false,
    };
    LoadProfile::build(
        &spec,
        &CsvReferenceProfiles::new(PathBuf::new()),
        len,
        1.0,
        &[],
        None,
    )
    .unwrap()
}

/// Outages of one and four hours, starting at midnight or midday
pub fn outage_scenarios(len: usize) -> OutageScenarios {
    OutageScenarios {
        durations: vec![1, 4],
        probabilities: vec![0.8, 0.2],
        start_time_steps: vec![0, 12],
        value_of_lost_load_per_kwh: 100.0,
        critical_loads_kw: vec![20.0; len],
        mg_upgrade_cost_fraction: 0.1,
        min_resilience_time_steps: 0,
        cost_policy: OutageCostPolicy::Expected,
        require_dispatchable: true,
    }
}

#[fixture]
pub fn scenario(pv: Technology, generator: Technology, battery: StorageType) -> Scenario {
    let loads_kw = (0..NUM_TIME_STEPS)
        .map(|hour| if (8..18).contains(&hour) { 80.0 } else { 40.0 })
        .collect();

    Scenario {
        time_index: TimeIndex::for_horizon(NUM_TIME_STEPS, 1, 0).unwrap(),
        load: explicit_load(loads_kw),
        technologies: indexmap! {
            pv.id.clone() => pv,
            generator.id.clone() => generator,
        },
        storage: indexmap! { battery.id.clone() => battery },
        tariff: Tariff::flat(0.1, NUM_TIME_STEPS),
        financial: Financial::default(),
        outage: None,
    }
}

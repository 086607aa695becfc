//! Allocation of the decision variables for one node.
//!
//! Variables are kept in typed maps rather than looked up by name. Every continuous variable has a
//! lower bound of zero; capacity bounds which are known up front are declared as column bounds.
use super::problem::{Problem, Variable};
use crate::id::{StorageID, TechID};
use crate::outage::OutageScenarios;
use crate::scenario::Scenario;
use crate::storage::StorageType;
use crate::tariff::tier_sizes;
use crate::technology::Technology;
use indexmap::IndexMap;
use log::warn;

/// The size and selection binary for one segment of a cost curve
#[derive(Debug, Clone)]
pub struct SegmentVariables {
    /// Purchased size within the segment
    pub size: Variable,
    /// Whether this segment is the one chosen
    pub active: Variable,
}

/// Variables for one technology
#[derive(Debug, Clone)]
pub struct TechVariables {
    /// Total size, including existing capacity
    pub size: Variable,
    /// Newly purchased size
    pub purchase_size: Variable,
    /// Output at each time step
    pub production: Vec<Variable>,
    /// Output discarded at each time step
    pub curtailment: Vec<Variable>,
    /// Heat output at each time step (thermal technologies only)
    pub thermal_production: Option<Vec<Variable>>,
    /// Fuel burned at each time step (fuel-burning technologies only)
    pub fuel: Option<Vec<Variable>>,
    /// Whether the technology is running at each time step (technologies with a turndown limit)
    pub on: Option<Vec<Variable>>,
    /// Output exported at each time step, keyed by index of the export bin
    pub export: IndexMap<usize, Vec<Variable>>,
    /// Year-one production incentive earned
    pub incentive: Option<Variable>,
    /// Segment variables for technologies with a cost curve
    pub segments: Option<Vec<SegmentVariables>>,
}

/// Variables for one storage device
#[derive(Debug, Clone)]
pub struct StorageVariables {
    /// Power capacity
    pub kw: Variable,
    /// Energy capacity
    pub kwh: Variable,
    /// Power discharged at each time step
    pub discharge: Vec<Variable>,
    /// Power drawn from the grid to charge at each time step
    pub grid_to_storage: Vec<Variable>,
    /// Power drawn from each technology to charge at each time step
    pub tech_to_storage: IndexMap<TechID, Vec<Variable>>,
    /// State of charge in kWh at the start of each time step, plus the final state
    pub soc: Vec<Variable>,
}

impl StorageVariables {
    /// Every variable describing the storage, for fixing them all to zero
    pub fn iter_all(&self) -> impl Iterator<Item = Variable> + '_ {
        [self.kw, self.kwh]
            .into_iter()
            .chain(self.discharge.iter().copied())
            .chain(self.grid_to_storage.iter().copied())
            .chain(self.tech_to_storage.values().flatten().copied())
            .chain(self.soc.iter().copied())
    }
}

/// Variables for the tariff
#[derive(Debug, Clone)]
pub struct TariffVariables {
    /// Power bought from the grid at each time step in each energy tier (`[t][tier]`)
    pub grid_purchase: Vec<Vec<Variable>>,
    /// Peak demand for each month in the horizon and each monthly demand tier
    pub month_peaks: Vec<Vec<Variable>>,
    /// Peak demand for each ratchet and tier
    pub ratchet_peaks: Vec<Vec<Variable>>,
    /// Highest peak over the lookback months (one per month if the lookback range is non-zero)
    pub lookback_peaks: Vec<Variable>,
    /// Peak demand in each coincident peak period
    pub coincident_peaks: Vec<Variable>,
    /// Amount by which the bill falls short of the minimum charge (lifecycle)
    pub min_charge_adder: Variable,
    /// Whether each energy tier above the first is in use, for each month (`[month][tier - 1]`)
    pub tier_active: Option<Vec<Vec<Variable>>>,
    /// Whether each monthly demand tier above the first is in use (`[month][tier - 1]`)
    pub month_tier_active: Option<Vec<Vec<Variable>>>,
    /// Whether each ratchet tier above the first is in use (`[ratchet][tier - 1]`)
    pub ratchet_tier_active: Vec<Option<Vec<Variable>>>,
    /// Whether importing (rather than exporting) is allowed at each time step
    pub importing: Option<Vec<Variable>>,
}

/// Storage variables for one outage window
#[derive(Debug, Clone)]
pub struct MicrogridStorageVariables {
    /// Power drawn from each technology to charge
    pub tech_to_storage: IndexMap<TechID, Vec<Variable>>,
    /// Power discharged
    pub discharge: Vec<Variable>,
    /// State of charge, with one more entry than the window has steps
    pub soc: Vec<Variable>,
}

/// Variables for one (scenario, start) outage window
#[derive(Debug, Clone)]
pub struct MicrogridWindow {
    /// Index of the outage scenario (duration)
    pub scenario: usize,
    /// Index of the start time step
    pub start_index: usize,
    /// Critical load not served at each step of the outage
    pub unserved: Vec<Variable>,
    /// Production of each microgrid technology
    pub production: IndexMap<TechID, Vec<Variable>>,
    /// Whether each technology with a turndown limit is running
    pub on: IndexMap<TechID, Vec<Variable>>,
    /// Fuel burned by each fuel-burning technology over the whole window
    pub fuel: IndexMap<TechID, Variable>,
    /// Storage dispatch
    pub storage: IndexMap<StorageID, MicrogridStorageVariables>,
}

/// Variables for outage modelling
#[derive(Debug, Clone)]
pub struct MicrogridVariables {
    /// One entry per outage window
    pub windows: Vec<MicrogridWindow>,
    /// Whether each technology is part of the microgrid
    pub tech_used: IndexMap<TechID, Variable>,
    /// Whether each storage device is part of the microgrid
    pub storage_used: IndexMap<StorageID, Variable>,
    /// Cost of making each technology microgrid-capable
    pub tech_upgrade_cost: IndexMap<TechID, Variable>,
    /// Cost of making each storage device microgrid-capable
    pub storage_upgrade_cost: IndexMap<StorageID, Variable>,
    /// Expected (or worst-case) cost of unserved load
    pub expected_outage_cost: Variable,
}

/// All the variables for one node
#[derive(Debug, Clone)]
pub struct NodeVariables {
    /// Technology variables
    pub techs: IndexMap<TechID, TechVariables>,
    /// Storage variables
    pub storage: IndexMap<StorageID, StorageVariables>,
    /// Tariff variables
    pub tariff: TariffVariables,
    /// Outage variables, if outages are modelled
    pub microgrid: Option<MicrogridVariables>,
}

/// The range of sizes allowed for a technology
fn size_bounds(tech: &Technology) -> std::ops::RangeInclusive<f64> {
    tech.min_kw.value().max(tech.existing_kw.value())..=tech.max_kw.value()
}

/// Whether a technology's output can be sent to a storage device
pub fn can_charge(tech: &Technology, storage: &StorageType) -> bool {
    if storage.is_electric() {
        tech.is_electric()
    } else {
        tech.is_thermal()
    }
}

impl NodeVariables {
    /// Allocate all the variables for a node
    pub fn allocate(problem: &mut Problem, scenario: &Scenario) -> Self {
        let techs = scenario
            .technologies
            .iter()
            .map(|(id, tech)| (id.clone(), add_tech_variables(problem, scenario, tech)))
            .collect();
        let storage = scenario
            .storage
            .iter()
            .map(|(id, storage)| (id.clone(), add_storage_variables(problem, scenario, storage)))
            .collect();
        let tariff = add_tariff_variables(problem, scenario);
        let microgrid = scenario
            .outage
            .as_ref()
            .map(|outage| add_microgrid_variables(problem, scenario, outage));

        Self {
            techs,
            storage,
            tariff,
            microgrid,
        }
    }
}

/// Add the variables for one technology
fn add_tech_variables(
    problem: &mut Problem,
    scenario: &Scenario,
    tech: &Technology,
) -> TechVariables {
    let n = scenario.time_index.len();
    let size = problem.add_column(size_bounds(tech));
    let purchase_size = problem.add_column(0.0..);
    let production = problem.add_columns(n, 0.0..);
    let curtailment = if tech.can_curtail {
        problem.add_columns(n, 0.0..)
    } else {
        problem.add_columns(n, 0.0..=0.0)
    };
    let thermal_production = tech.is_thermal().then(|| problem.add_columns(n, 0.0..));
    let fuel = tech.is_fuel_burning().then(|| problem.add_columns(n, 0.0..));
    let on = tech.has_turndown().then(|| {
        warn!(
            "Technology {} has a minimum turndown, which adds a binary variable for every time \
            step. This may increase solve time.",
            tech.id
        );
        problem.add_binary_columns(n)
    });
    let export = scenario
        .tariff
        .export_bins
        .iter()
        .enumerate()
        .filter(|(_, bin)| tech.can_export && tech.is_electric() && bin.techs.contains(&tech.id))
        .map(|(bin_idx, _)| (bin_idx, problem.add_columns(n, 0.0..)))
        .collect();
    let incentive = tech
        .production_incentive
        .map(|incentive| problem.add_column(0.0..=incentive.max_per_year));
    let segments = tech.cost_curve.as_ref().map(|curve| {
        curve
            .iter()
            .map(|_| SegmentVariables {
                size: problem.add_column(0.0..),
                active: problem.add_binary_column(),
            })
            .collect()
    });

    TechVariables {
        size,
        purchase_size,
        production,
        curtailment,
        thermal_production,
        fuel,
        on,
        export,
        incentive,
        segments,
    }
}

/// Add the variables for one storage device
fn add_storage_variables(
    problem: &mut Problem,
    scenario: &Scenario,
    storage: &StorageType,
) -> StorageVariables {
    let n = scenario.time_index.len();
    let kw = problem.add_column(
        storage.min_kw.value().max(storage.existing_kw.value())..=storage.max_kw.value(),
    );
    let kwh = problem.add_column(
        storage.min_kwh.value().max(storage.existing_kwh.value())..=storage.max_kwh.value(),
    );
    let discharge = problem.add_columns(n, 0.0..);
    let grid_to_storage = if storage.can_grid_charge && storage.is_electric() {
        problem.add_columns(n, 0.0..)
    } else {
        problem.add_columns(n, 0.0..=0.0)
    };
    let tech_to_storage = scenario
        .technologies
        .values()
        .filter(|tech| can_charge(tech, storage))
        .map(|tech| (tech.id.clone(), problem.add_columns(n, 0.0..)))
        .collect();
    let soc = problem.add_columns(n + 1, 0.0..);

    StorageVariables {
        kw,
        kwh,
        discharge,
        grid_to_storage,
        tech_to_storage,
        soc,
    }
}

/// Add the variables for the tariff
fn add_tariff_variables(problem: &mut Problem, scenario: &Scenario) -> TariffVariables {
    let tariff = &scenario.tariff;
    let time_index = &scenario.time_index;
    let num_months = time_index.months().len();

    let grid_purchase = time_index
        .iter()
        .map(|_| problem.add_columns(tariff.num_energy_tiers(), 0.0..))
        .collect();

    let add_tiered_peaks = |problem: &mut Problem, limits: &[f64]| -> Vec<Variable> {
        tier_sizes(limits)
            .into_iter()
            .map(|size| problem.add_column(0.0..=size))
            .collect()
    };
    let month_peaks = if tariff.has_monthly_demand() {
        (0..num_months)
            .map(|_| add_tiered_peaks(problem, &tariff.monthly_demand_tier_limits))
            .collect()
    } else {
        Vec::new()
    };
    let ratchet_peaks = tariff
        .ratchets
        .iter()
        .map(|ratchet| add_tiered_peaks(problem, &ratchet.tier_limits))
        .collect();
    let lookback_peaks = match &tariff.lookback {
        Some(lookback) if !month_peaks.is_empty() && lookback.range > 0 => {
            problem.add_columns(num_months, 0.0..)
        }
        Some(_) if !month_peaks.is_empty() => vec![problem.add_column(0.0..)],
        _ => Vec::new(),
    };
    let coincident_peaks = problem.add_columns(tariff.coincident_peaks.len(), 0.0..);
    let min_charge_adder = problem.add_column(0.0..);

    let tier_active = tariff.energy_tiers_need_binaries().then(|| {
        warn!(
            "Energy tier rates are not increasing, so binary variables are needed to fill tiers \
            in order. This may increase solve time."
        );
        (0..num_months)
            .map(|_| problem.add_binary_columns(tariff.num_energy_tiers() - 1))
            .collect()
    });
    let month_tier_active = (!month_peaks.is_empty()
        && tariff.monthly_demand_tiers_need_binaries())
    .then(|| {
        warn!(
            "Monthly demand tier rates are not increasing, so binary variables are needed to \
            fill tiers in order. This may increase solve time."
        );
        (0..num_months)
            .map(|_| problem.add_binary_columns(tariff.num_monthly_demand_tiers() - 1))
            .collect()
    });
    let ratchet_tier_active = tariff
        .ratchets
        .iter()
        .map(|ratchet| {
            ratchet.tiers_need_binaries().then(|| {
                warn!(
                    "Demand ratchet tier rates are not increasing, so binary variables are \
                    needed to fill tiers in order. This may increase solve time."
                );
                problem.add_binary_columns(ratchet.tier_limits.len() - 1)
            })
        })
        .collect();
    let importing = tariff.needs_import_export_binaries().then(|| {
        warn!(
            "Simultaneous import and export is not allowed, which adds a binary variable for \
            every time step. This may increase solve time."
        );
        problem.add_binary_columns(time_index.len())
    });

    TariffVariables {
        grid_purchase,
        month_peaks,
        ratchet_peaks,
        lookback_peaks,
        coincident_peaks,
        min_charge_adder,
        tier_active,
        month_tier_active,
        ratchet_tier_active,
        importing,
    }
}

/// Technologies which can run in a microgrid
pub fn microgrid_techs(scenario: &Scenario) -> impl Iterator<Item = &Technology> {
    scenario
        .technologies
        .values()
        .filter(|tech| tech.can_serve_outage && tech.is_electric())
}

/// Storage devices which can serve a microgrid
pub fn microgrid_storage(scenario: &Scenario) -> impl Iterator<Item = &StorageType> {
    scenario
        .storage
        .values()
        .filter(|storage| storage.can_serve_outage && storage.is_electric())
}

/// Add the variables for outage modelling
fn add_microgrid_variables(
    problem: &mut Problem,
    scenario: &Scenario,
    outage: &OutageScenarios,
) -> MicrogridVariables {
    warn!(
        "Outages are modelled, which adds binary variables for each technology and storage \
        device in the microgrid. This may increase solve time."
    );

    let n = scenario.time_index.len();

    let mut windows = Vec::new();
    for scenario_idx in 0..outage.num_scenarios() {
        let duration = outage.durations[scenario_idx];
        for (start_index, &start) in outage.start_time_steps.iter().enumerate() {
            let unserved = (0..duration)
                .map(|ts| {
                    let t = outage.time_step(start, ts, n);
                    if ts < outage.min_resilience_time_steps {
                        problem.add_column(0.0..=0.0)
                    } else {
                        problem.add_column(0.0..=outage.critical_loads_kw[t])
                    }
                })
                .collect();
            let production = microgrid_techs(scenario)
                .map(|tech| (tech.id.clone(), problem.add_columns(duration, 0.0..)))
                .collect();
            let on = microgrid_techs(scenario)
                .filter(|tech| tech.has_turndown())
                .map(|tech| (tech.id.clone(), problem.add_binary_columns(duration)))
                .collect();
            let fuel = microgrid_techs(scenario)
                .filter_map(|tech| {
                    tech.fuel
                        .map(|fuel| (tech.id.clone(), problem.add_column(0.0..=fuel.available)))
                })
                .collect();
            let storage = microgrid_storage(scenario)
                .map(|storage| {
                    let tech_to_storage = microgrid_techs(scenario)
                        .map(|tech| (tech.id.clone(), problem.add_columns(duration, 0.0..)))
                        .collect();
                    let vars = MicrogridStorageVariables {
                        tech_to_storage,
                        discharge: problem.add_columns(duration, 0.0..),
                        soc: problem.add_columns(duration + 1, 0.0..),
                    };
                    (storage.id.clone(), vars)
                })
                .collect();

            windows.push(MicrogridWindow {
                scenario: scenario_idx,
                start_index,
                unserved,
                production,
                on,
                fuel,
                storage,
            });
        }
    }

    let tech_used = microgrid_techs(scenario)
        .map(|tech| (tech.id.clone(), problem.add_binary_column()))
        .collect();
    let storage_used = microgrid_storage(scenario)
        .map(|storage| (storage.id.clone(), problem.add_binary_column()))
        .collect();
    let tech_upgrade_cost = microgrid_techs(scenario)
        .map(|tech| (tech.id.clone(), problem.add_column(0.0..)))
        .collect();
    let storage_upgrade_cost = microgrid_storage(scenario)
        .map(|storage| (storage.id.clone(), problem.add_column(0.0..)))
        .collect();
    let expected_outage_cost = problem.add_column(0.0..);

    MicrogridVariables {
        windows,
        tech_used,
        storage_used,
        tech_upgrade_cost,
        storage_upgrade_cost,
        expected_outage_cost,
    }
}

//! A complete description of a site to be optimised.
use crate::financial::Financial;
use crate::load::LoadProfile;
use crate::outage::OutageScenarios;
use crate::storage::StorageMap;
use crate::tariff::Tariff;
use crate::technology::{TechClass, Technology, TechnologyMap};
use crate::time_index::TimeIndex;
use crate::units::{Energy, Power};
use anyhow::{Result, ensure};

/// All inputs needed to build the optimisation for one site.
///
/// A scenario is immutable once built, so it can be shared between threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// The time steps being modelled
    pub time_index: TimeIndex,
    /// Electric and heating load
    pub load: LoadProfile,
    /// Technologies which may be sized
    pub technologies: TechnologyMap,
    /// Storage devices which may be sized
    pub storage: StorageMap,
    /// The electric tariff
    pub tariff: Tariff,
    /// Financial assumptions
    pub financial: Financial,
    /// Outages to be survived, if modelled
    pub outage: Option<OutageScenarios>,
}

impl Scenario {
    /// The business-as-usual version of this scenario.
    ///
    /// Technologies keep only their existing capacity, no new storage is bought and outages are
    /// not modelled.
    pub fn business_as_usual(&self) -> Self {
        let technologies = self
            .technologies
            .iter()
            .filter(|(_, tech)| tech.existing_kw.value() > 0.0)
            .map(|(id, tech)| (id.clone(), tech.with_fixed_size(tech.existing_kw)))
            .collect();
        let storage = self
            .storage
            .iter()
            .map(|(id, storage)| {
                (
                    id.clone(),
                    storage.with_fixed_size(storage.existing_kw, storage.existing_kwh),
                )
            })
            .collect();

        Self {
            technologies,
            storage,
            outage: None,
            ..self.clone()
        }
    }

    /// A copy of this scenario with technology and storage sizes fixed.
    ///
    /// Sizes which aren't given are fixed to existing capacity.
    pub fn with_fixed_sizes(
        &self,
        tech_sizes: &dyn Fn(&str) -> Option<Power>,
        storage_sizes: &dyn Fn(&str) -> Option<(Power, Energy)>,
    ) -> Self {
        let technologies = self
            .technologies
            .iter()
            .map(|(id, tech)| {
                let size = tech_sizes(id.0.as_ref()).unwrap_or(tech.existing_kw);
                (id.clone(), tech.with_fixed_size(size))
            })
            .collect();
        let storage = self
            .storage
            .iter()
            .map(|(id, storage)| {
                let (kw, kwh) = storage_sizes(id.0.as_ref())
                    .unwrap_or((storage.existing_kw, storage.existing_kwh));
                (id.clone(), storage.with_fixed_size(kw, kwh))
            })
            .collect();

        Self {
            technologies,
            storage,
            ..self.clone()
        }
    }

    /// Whether the scenario includes any technology of the given class
    pub fn has_class(&self, class: TechClass) -> bool {
        self.technologies.values().any(|tech| tech.class == class)
    }

    /// Whether any heat must be balanced
    pub fn has_thermal(&self) -> bool {
        self.load.has_heating_load()
            || self.technologies.values().any(|tech| tech.is_thermal())
            || self.storage.values().any(|storage| !storage.is_electric())
    }

    /// Check that the parts of the scenario are consistent with one another
    pub fn validate(&self) -> Result<()> {
        let len = self.time_index.len();
        ensure!(
            self.load.loads_kw().len() == len,
            "Load has {} values but {len} time steps are modelled",
            self.load.loads_kw().len()
        );
        ensure!(
            !self.load.has_heating_load() || self.technologies.values().any(Technology::is_thermal),
            "A heating load is given but there is no CHP or boiler to serve it"
        );
        for storage in self.storage.values() {
            ensure!(
                storage.max_kw.is_finite() && storage.max_kwh.is_finite(),
                "Storage {} must have finite max_kw and max_kwh",
                storage.id
            );
        }
        for tech in self.technologies.values() {
            ensure!(
                tech.max_kw.is_finite(),
                "Technology {} must have a finite max_kw",
                tech.id
            );
            ensure!(
                tech.production_factor.len() == len,
                "Production factor for technology {} has {} values but {len} time steps are \
                modelled",
                tech.id,
                tech.production_factor.len()
            );
        }
        for (tier, rates) in self.tariff.energy_rates.iter().enumerate() {
            ensure!(
                rates.len() == len,
                "Energy rates for tier {tier} have {} values but {len} time steps are modelled",
                rates.len()
            );
        }
        for bin in &self.tariff.export_bins {
            ensure!(
                bin.rates.len() == len,
                "Export rates for bin {} have {} values but {len} time steps are modelled",
                bin.name,
                bin.rates.len()
            );
            for tech_id in &bin.techs {
                ensure!(
                    self.technologies.contains_key(tech_id),
                    "Export bin {} refers to unknown technology {tech_id}",
                    bin.name
                );
            }
        }
        let steps_valid = |steps: &[usize]| steps.iter().all(|&t| t < len);
        for ratchet in &self.tariff.ratchets {
            ensure!(
                steps_valid(&ratchet.time_steps),
                "Demand ratchet refers to a time step outside the horizon"
            );
        }
        for peak in &self.tariff.coincident_peaks {
            ensure!(
                steps_valid(&peak.time_steps),
                "Coincident peak period refers to a time step outside the horizon"
            );
        }
        if let Some(outage) = &self.outage {
            ensure!(
                steps_valid(&outage.start_time_steps),
                "Outage start time step is outside the horizon"
            );
            ensure!(
                outage.critical_loads_kw.len() == len,
                "Critical load must have one value per time step"
            );
        }

        Ok(())
    }
}

/// A site in a multi-node run
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Identifier for the node
    pub id: u32,
    /// The site's scenario
    pub scenario: Scenario,
}

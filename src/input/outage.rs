//! Outage scenarios as given in a scenario file.
use super::{TimeSeriesInput, Violations, deserialise_proportion};
use crate::outage::{OutageCostPolicy, OutageScenarios};
use anyhow::{Result, ensure};
use serde::Deserialize;
use std::path::Path;

/// Share of the electric load that is critical, if no critical load is given
const DEFAULT_CRITICAL_LOAD_FRACTION: f64 = 0.5;

/// The `[outage]` table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutageParams {
    durations: Vec<usize>,
    probabilities: Vec<f64>,
    start_time_steps: Vec<usize>,
    value_of_lost_load_per_kwh: f64,
    #[serde(default, deserialize_with = "deserialise_optional_proportion")]
    critical_load_fraction: Option<f64>,
    critical_loads_kw: Option<TimeSeriesInput>,
    #[serde(default)]
    mg_upgrade_cost_fraction: f64,
    #[serde(default)]
    min_resilience_time_steps: usize,
    #[serde(default)]
    cost_policy: OutageCostPolicy,
    #[serde(default)]
    require_dispatchable: bool,
}

fn deserialise_optional_proportion<'de, D>(deserialiser: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialise_proportion(deserialiser).map(Some)
}

impl OutageParams {
    /// Build the outage scenarios for a site.
    ///
    /// # Arguments
    ///
    /// * `base_dir` - Directory against which CSV paths are resolved
    /// * `loads_kw` - The site's electric load, from which a critical load fraction is taken
    pub fn into_outage_scenarios(self, base_dir: &Path, loads_kw: &[f64]) -> Result<OutageScenarios> {
        let len = loads_kw.len();
        ensure!(
            !(self.critical_load_fraction.is_some() && self.critical_loads_kw.is_some()),
            "Only one of critical_load_fraction and critical_loads_kw may be given"
        );
        let critical_loads_kw = match &self.critical_loads_kw {
            Some(series) => series.resolve(base_dir, len)?,
            None => {
                let fraction = self
                    .critical_load_fraction
                    .unwrap_or(DEFAULT_CRITICAL_LOAD_FRACTION);
                loads_kw.iter().map(|load| load * fraction).collect()
            }
        };

        let mut violations = Violations::new("outage");
        violations.check(!self.durations.is_empty(), || {
            "at least one outage duration must be given".to_string()
        });
        violations.check(self.durations.len() == self.probabilities.len(), || {
            "durations and probabilities must have the same length".to_string()
        });
        violations.check(
            (self.probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-6,
            || "probabilities must sum to one".to_string(),
        );
        violations.check(!self.start_time_steps.is_empty(), || {
            "at least one start time step must be given".to_string()
        });
        violations.check(self.durations.iter().all(|&d| d > 0 && d <= len), || {
            format!("durations must be between 1 and {len} time steps")
        });
        violations.check(self.start_time_steps.iter().all(|&t| t < len), || {
            format!("start time steps must be less than {len}")
        });
        violations.non_negative("value_of_lost_load_per_kwh", self.value_of_lost_load_per_kwh);
        violations.non_negative("mg_upgrade_cost_fraction", self.mg_upgrade_cost_fraction);
        violations.check(critical_loads_kw.iter().all(|&load| load >= 0.0), || {
            "critical load must be non-negative".to_string()
        });
        violations.finish()?;

        Ok(OutageScenarios {
            durations: self.durations,
            probabilities: self.probabilities,
            start_time_steps: self.start_time_steps,
            value_of_lost_load_per_kwh: self.value_of_lost_load_per_kwh,
            critical_loads_kw,
            mg_upgrade_cost_fraction: self.mg_upgrade_cost_fraction,
            min_resilience_time_steps: self.min_resilience_time_steps,
            cost_policy: self.cost_policy,
            require_dispatchable: self.require_dispatchable,
        })
    }
}

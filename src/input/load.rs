//! The electric and heating load as given in a scenario file.
use super::TimeSeriesInput;
use crate::load::LoadSpec;
use anyhow::{Result, bail};
use serde::Deserialize;
use std::path::Path;

/// The `[load]` table.
///
/// Exactly one way of giving the electric load must be used: `loads_kw`, `reference_profile` or
/// `blended_profiles` with `blended_weights`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoadParams {
    loads_kw: Option<TimeSeriesInput>,
    #[serde(default)]
    loads_are_net: bool,
    reference_profile: Option<String>,
    blended_profiles: Option<Vec<String>>,
    blended_weights: Option<Vec<f64>>,
    annual_kwh: Option<f64>,
    heating_loads_kw: Option<TimeSeriesInput>,
}

impl LoadParams {
    /// How the electric load is specified
    pub fn spec(&self, base_dir: &Path, len: usize) -> Result<LoadSpec> {
        let given = [
            self.loads_kw.is_some(),
            self.reference_profile.is_some(),
            self.blended_profiles.is_some(),
        ];
        if given.iter().filter(|&&given| given).count() > 1 {
            bail!(
                "Only one of loads_kw, reference_profile and blended_profiles may be given for \
                the load"
            );
        }

        if let Some(loads_kw) = &self.loads_kw {
            return Ok(LoadSpec::Explicit {
                loads_kw: loads_kw.resolve(base_dir, len)?,
                is_net: self.loads_are_net,
            });
        }
        if let Some(name) = &self.reference_profile {
            return Ok(LoadSpec::Reference {
                name: name.clone(),
                annual_kwh: self.annual_kwh,
            });
        }
        if let Some(names) = &self.blended_profiles {
            let (Some(weights), Some(annual_kwh)) = (&self.blended_weights, self.annual_kwh) else {
                bail!("Blended load profiles need blended_weights and annual_kwh");
            };
            return Ok(LoadSpec::Blended {
                names: names.clone(),
                weights: weights.clone(),
                annual_kwh,
            });
        }

        bail!(
            "No electric load given. Provide one of: loads_kw (a series or CSV file), \
            reference_profile (with optional annual_kwh), or blended_profiles (with \
            blended_weights and annual_kwh)"
        )
    }

    /// Heating load, if any
    pub fn heating_loads_kw(&self, base_dir: &Path, len: usize) -> Result<Option<Vec<f64>>> {
        self.heating_loads_kw
            .as_ref()
            .map(|series| series.resolve(base_dir, len))
            .transpose()
    }
}

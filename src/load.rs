//! The electric and heating load which the site must serve.
use crate::input::{expand_series, read_csv_series};
use anyhow::{Context, Result, ensure};
use std::path::PathBuf;

/// How the electric load is specified
#[derive(Debug, Clone, PartialEq)]
pub enum LoadSpec {
    /// An explicit series, one value per time step
    Explicit {
        /// Load in kW at each time step
        loads_kw: Vec<f64>,
        /// Whether the series is net of existing PV production
        is_net: bool,
    },
    /// A named reference profile, optionally scaled to an annual consumption
    Reference {
        /// Name of the profile
        name: String,
        /// Annual consumption to scale the profile to
        annual_kwh: Option<f64>,
    },
    /// A weighted blend of reference profiles scaled to an annual consumption
    Blended {
        /// Names of the profiles
        names: Vec<String>,
        /// Share of annual consumption for each profile (must sum to one)
        weights: Vec<f64>,
        /// Annual consumption
        annual_kwh: f64,
    },
}

/// A source of reference load profiles
pub trait ReferenceProfiles {
    /// Get the profile with the given name (kW for each hour of a year)
    fn profile(&self, name: &str) -> Result<Vec<f64>>;
}

/// Reference profiles stored as `<name>.csv` files in a directory
#[derive(Debug, Clone)]
pub struct CsvReferenceProfiles {
    dir: PathBuf,
}

impl CsvReferenceProfiles {
    /// Look for profiles in the given directory
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl ReferenceProfiles for CsvReferenceProfiles {
    fn profile(&self, name: &str) -> Result<Vec<f64>> {
        let file_path = self.dir.join(format!("{name}.csv"));
        read_csv_series(&file_path)
            .with_context(|| format!("Could not find reference load profile '{name}'"))
    }
}

/// The load at a site
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProfile {
    loads_kw: Vec<f64>,
    heating_loads_kw: Vec<f64>,
}

impl LoadProfile {
    /// Build a load profile from its specification.
    ///
    /// # Arguments
    ///
    /// * `spec` - How the electric load is specified
    /// * `profiles` - Where to find reference profiles
    /// * `len` - Number of time steps
    /// * `step_hours` - Length of each time step in hours
    /// * `existing_pv_kw` - Production of PV already at the site, added back to net loads
    /// * `heating_loads_kw` - Heating load, if any
    pub fn build(
        spec: &LoadSpec,
        profiles: &dyn ReferenceProfiles,
        len: usize,
        step_hours: f64,
        existing_pv_kw: &[f64],
        heating_loads_kw: Option<Vec<f64>>,
    ) -> Result<Self> {
        let loads_kw = match spec {
            LoadSpec::Explicit { loads_kw, is_net } => {
                ensure!(
                    loads_kw.len() == len,
                    "Load series has {} values but {} time steps are modelled",
                    loads_kw.len(),
                    len
                );
                if *is_net {
                    loads_kw
                        .iter()
                        .enumerate()
                        .map(|(t, load)| load + existing_pv_kw.get(t).copied().unwrap_or(0.0))
                        .collect()
                } else {
                    loads_kw.clone()
                }
            }
            LoadSpec::Reference { name, annual_kwh } => {
                let profile = expand_series(profiles.profile(name)?, len)?;
                match annual_kwh {
                    Some(annual_kwh) => scale_to_annual(&profile, *annual_kwh, step_hours),
                    None => profile,
                }
            }
            LoadSpec::Blended {
                names,
                weights,
                annual_kwh,
            } => {
                ensure!(
                    names.len() == weights.len(),
                    "Blended load needs one weight per profile"
                );
                ensure!(
                    (weights.iter().sum::<f64>() - 1.0).abs() < 1e-6,
                    "Blended load weights must sum to one"
                );

                let mut loads_kw = vec![0.0; len];
                for (name, weight) in names.iter().zip(weights) {
                    let profile = expand_series(profiles.profile(name)?, len)?;
                    let scaled = scale_to_annual(&profile, weight * annual_kwh, step_hours);
                    for (total, value) in loads_kw.iter_mut().zip(scaled) {
                        *total += value;
                    }
                }
                loads_kw
            }
        };
        ensure!(
            loads_kw.iter().all(|load| *load >= 0.0),
            "Electric load must be non-negative at every time step"
        );

        let heating_loads_kw = heating_loads_kw.unwrap_or_else(|| vec![0.0; len]);
        ensure!(
            heating_loads_kw.len() == len,
            "Heating load must have one value per time step"
        );

        Ok(Self {
            loads_kw,
            heating_loads_kw,
        })
    }

    /// Electric load at each time step
    pub fn loads_kw(&self) -> &[f64] {
        &self.loads_kw
    }

    /// Heating load at each time step
    pub fn heating_loads_kw(&self) -> &[f64] {
        &self.heating_loads_kw
    }

    /// Whether there is any heating load
    pub fn has_heating_load(&self) -> bool {
        self.heating_loads_kw.iter().any(|&load| load > 0.0)
    }

    /// Total electric energy consumed
    pub fn annual_kwh(&self, step_hours: f64) -> f64 {
        self.loads_kw.iter().sum::<f64>() * step_hours
    }
}

/// Scale a profile so that it sums to the given annual energy
fn scale_to_annual(profile: &[f64], annual_kwh: f64, step_hours: f64) -> Vec<f64> {
    let total: f64 = profile.iter().sum::<f64>() * step_hours;
    if total == 0.0 {
        return profile.to_vec();
    }

    profile.iter().map(|value| value * annual_kwh / total).collect()
}

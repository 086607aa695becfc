//! The electric tariff as given in a scenario file.
use super::{TimeSeriesInput, deserialise_proportion};
use crate::id::{IDCollection, TechID};
use crate::tariff::{CoincidentPeak, DemandLookback, DemandRatchet, ExportBin, Tariff};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexSet;
use serde::Deserialize;
use std::path::Path;

fn unlimited() -> Vec<f64> {
    vec![f64::INFINITY]
}

fn default_true() -> bool {
    true
}

/// A `[[tariff.ratchets]]` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RatchetParams {
    time_steps: Vec<usize>,
    rates: Vec<f64>,
    #[serde(default = "unlimited")]
    tier_limits_kw: Vec<f64>,
}

/// The `[tariff.lookback]` table
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct LookbackParams {
    #[serde(deserialize_with = "deserialise_proportion")]
    fraction: f64,
    #[serde(default)]
    months: Vec<usize>,
    #[serde(default)]
    range: usize,
}

/// A `[[tariff.coincident_peaks]]` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct CoincidentPeakParams {
    time_steps: Vec<usize>,
    rate_per_kw: f64,
}

/// A `[[tariff.export_bins]]` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ExportBinParams {
    name: String,
    rates: TimeSeriesInput,
    techs: Vec<String>,
    max_kwh: Option<f64>,
    #[serde(default)]
    limit_to_purchases: bool,
}

/// The `[tariff]` table.
///
/// `energy_rates` holds one series per tier. `monthly_demand_rates` holds either one row of tier
/// rates used for every month or twelve rows, one per month.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TariffParams {
    energy_rates: Vec<TimeSeriesInput>,
    #[serde(default = "unlimited")]
    energy_tier_limits_kwh: Vec<f64>,
    #[serde(default)]
    monthly_demand_rates: Vec<Vec<f64>>,
    #[serde(default = "unlimited")]
    monthly_demand_tier_limits_kw: Vec<f64>,
    #[serde(default)]
    ratchets: Vec<RatchetParams>,
    lookback: Option<LookbackParams>,
    #[serde(default)]
    coincident_peaks: Vec<CoincidentPeakParams>,
    #[serde(default)]
    fixed_monthly_charge: f64,
    #[serde(default)]
    annual_min_charge: f64,
    #[serde(default)]
    export_bins: Vec<ExportBinParams>,
    #[serde(default = "default_true")]
    allow_simultaneous_export_import: bool,
}

/// Check that cumulative tier limits increase and that there is one rate per tier
fn check_tiers(what: &str, limits: &[f64], num_rates: usize) -> Result<()> {
    ensure!(
        limits.len() == num_rates,
        "{what} has {num_rates} rates but {} tier limits",
        limits.len()
    );
    ensure!(
        limits.iter().all(|&limit| limit > 0.0),
        "{what} tier limits must be positive"
    );
    ensure!(
        limits.windows(2).all(|pair| pair[0] < pair[1]),
        "{what} tier limits must increase"
    );

    Ok(())
}

impl TariffParams {
    /// Check the tariff and expand its series to `len` time steps.
    ///
    /// Export bins may only refer to technologies in `tech_ids`.
    pub fn into_tariff(
        self,
        base_dir: &Path,
        len: usize,
        tech_ids: &IndexSet<TechID>,
    ) -> Result<Tariff> {
        ensure!(
            !self.energy_rates.is_empty(),
            "At least one tier of energy rates must be given"
        );
        let energy_rates = self
            .energy_rates
            .iter()
            .map(|rates| rates.resolve(base_dir, len))
            .collect::<Result<Vec<_>>>()
            .context("Invalid energy rates")?;
        check_tiers(
            "Energy tariff",
            &self.energy_tier_limits_kwh,
            energy_rates.len(),
        )?;

        let num_demand_tiers = self.monthly_demand_tier_limits_kw.len();
        let monthly_demand_rates = match self.monthly_demand_rates.len() {
            0 => vec![vec![0.0; num_demand_tiers]; 12],
            1 => vec![self.monthly_demand_rates[0].clone(); 12],
            12 => self.monthly_demand_rates,
            n => bail!("monthly_demand_rates must have 1 or 12 rows (got {n})"),
        };
        for rates in &monthly_demand_rates {
            check_tiers(
                "Monthly demand tariff",
                &self.monthly_demand_tier_limits_kw,
                rates.len(),
            )?;
        }

        let ratchets = self
            .ratchets
            .into_iter()
            .map(|ratchet| {
                check_tiers("Demand ratchet", &ratchet.tier_limits_kw, ratchet.rates.len())?;
                Ok(DemandRatchet {
                    time_steps: ratchet.time_steps,
                    rates: ratchet.rates,
                    tier_limits: ratchet.tier_limits_kw,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let lookback = self
            .lookback
            .map(|lookback| {
                ensure!(
                    lookback.months.iter().all(|&month| month < 12),
                    "Lookback months must be between 0 and 11"
                );
                ensure!(
                    lookback.range < 12,
                    "Lookback range must be less than 12 months"
                );
                ensure!(
                    lookback.range > 0 || !lookback.months.is_empty(),
                    "Lookback needs either a range or a list of months"
                );
                Ok(DemandLookback {
                    fraction: lookback.fraction,
                    months: lookback.months,
                    range: lookback.range,
                })
            })
            .transpose()?;

        let coincident_peaks = self
            .coincident_peaks
            .into_iter()
            .map(|peak| CoincidentPeak {
                time_steps: peak.time_steps,
                rate_per_kw: peak.rate_per_kw,
            })
            .collect();

        let export_bins = self
            .export_bins
            .into_iter()
            .map(|bin| {
                let rates = bin
                    .rates
                    .resolve(base_dir, len)
                    .with_context(|| format!("Invalid rates for export bin {}", bin.name))?;
                let techs = bin
                    .techs
                    .iter()
                    .map(|id| tech_ids.get_id_by_str(id))
                    .collect::<Result<IndexSet<_>>>()
                    .with_context(|| format!("Invalid technologies for export bin {}", bin.name))?;
                Ok(ExportBin {
                    name: bin.name,
                    rates,
                    techs,
                    max_kwh: bin.max_kwh,
                    limit_to_purchases: bin.limit_to_purchases,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        ensure!(
            self.fixed_monthly_charge >= 0.0 && self.annual_min_charge >= 0.0,
            "Fixed and minimum charges must be non-negative"
        );

        Ok(Tariff {
            energy_rates,
            energy_tier_limits: self.energy_tier_limits_kwh,
            monthly_demand_rates,
            monthly_demand_tier_limits: self.monthly_demand_tier_limits_kw,
            ratchets,
            lookback,
            coincident_peaks,
            fixed_monthly_charge: self.fixed_monthly_charge,
            annual_min_charge: self.annual_min_charge,
            export_bins,
            allow_simultaneous_export_import: self.allow_simultaneous_export_import,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    fn parse(toml_str: &str) -> TariffParams {
        toml::from_str(toml_str).unwrap()
    }

    fn tech_ids() -> IndexSet<TechID> {
        ["pv".into()].into_iter().collect()
    }

    #[test]
    fn test_flat() {
        let tariff = parse("energy_rates = [0.1]")
            .into_tariff(Path::new("."), 3, &tech_ids())
            .unwrap();
        assert_eq!(tariff, Tariff::flat(0.1, 3));
    }

    #[test]
    fn test_tiers() {
        let tariff = parse(
            "energy_rates = [0.1, 0.15]\nenergy_tier_limits_kwh = [1000.0, inf]\n\
            monthly_demand_rates = [[10.0]]",
        )
        .into_tariff(Path::new("."), 2, &tech_ids())
        .unwrap();
        assert_eq!(tariff.num_energy_tiers(), 2);
        assert_eq!(tariff.energy_rates[1], [0.15, 0.15]);
        assert_eq!(tariff.monthly_demand_rates, vec![vec![10.0]; 12]);
        assert!(tariff.has_monthly_demand());
    }

    #[test]
    fn test_tier_limits_must_match_rates() {
        assert_error!(
            parse("energy_rates = [0.1, 0.15]").into_tariff(Path::new("."), 2, &tech_ids()),
            "Energy tariff has 2 rates but 1 tier limits"
        );
        assert_error!(
            parse("energy_rates = [0.1, 0.15]\nenergy_tier_limits_kwh = [1000.0, 500.0]")
                .into_tariff(Path::new("."), 2, &tech_ids()),
            "Energy tariff tier limits must increase"
        );
    }

    #[test]
    fn test_export_bins_and_lookback() {
        let tariff = parse(
            "energy_rates = [0.1]
allow_simultaneous_export_import = false

[lookback]
fraction = 0.8
range = 3

[[export_bins]]
name = \"NEM\"
rates = 0.1
techs = [\"pv\"]
limit_to_purchases = true
",
        )
        .into_tariff(Path::new("."), 2, &tech_ids())
        .unwrap();
        assert!(tariff.needs_import_export_binaries());
        assert_eq!(tariff.export_bins[0].rates, [0.1, 0.1]);
        assert!(tariff.export_bins[0].techs.contains("pv"));
        assert_eq!(tariff.lookback.unwrap().range, 3);
    }

    #[test]
    fn test_export_bin_unknown_tech() {
        let params = parse(
            "energy_rates = [0.1]

[[export_bins]]
name = \"wholesale\"
rates = 0.03
techs = [\"wind\"]
",
        );
        assert_error!(
            params.into_tariff(Path::new("."), 2, &tech_ids()),
            "Invalid technologies for export bin wholesale"
        );
    }
}

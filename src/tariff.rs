//! The electric tariff: what the site pays for energy and demand, and what it earns for export.
//!
//! Tier limits are cumulative breakpoints: with limits `[1000, inf]` the first 1000 kWh in a month
//! are charged at the first tier's rate and everything else at the second tier's.
use crate::id::TechID;
use indexmap::IndexSet;

/// A time-of-use demand charge, applied to the peak draw within a set of time steps
#[derive(Debug, Clone, PartialEq)]
pub struct DemandRatchet {
    /// Time steps covered by the ratchet
    pub time_steps: Vec<usize>,
    /// Rate per kW for each tier
    pub rates: Vec<f64>,
    /// Cumulative upper limit in kW for each tier
    pub tier_limits: Vec<f64>,
}

impl DemandRatchet {
    /// Whether binaries are needed to fill this ratchet's tiers in order
    pub fn tiers_need_binaries(&self) -> bool {
        rates_decrease(&self.rates)
    }
}

/// A floor on monthly peak demand, set by a fraction of earlier peaks
#[derive(Debug, Clone, PartialEq)]
pub struct DemandLookback {
    /// Fraction of the lookback peak which each month's peak must reach
    pub fraction: f64,
    /// Fixed months (0-11) whose peaks set the floor, used when `range` is zero
    pub months: Vec<usize>,
    /// If non-zero, the floor for each month is set by the preceding `range` months instead
    pub range: usize,
}

/// A demand charge applied to the peak draw during system-wide peak hours
#[derive(Debug, Clone, PartialEq)]
pub struct CoincidentPeak {
    /// Time steps making up the period
    pub time_steps: Vec<usize>,
    /// Rate per kW of peak draw
    pub rate_per_kw: f64,
}

/// A compensation bin for exported electricity
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBin {
    /// Name of the bin (e.g. `NEM` or `wholesale`)
    pub name: String,
    /// Credit per kWh exported at each time step
    pub rates: Vec<f64>,
    /// Technologies allowed to export into this bin
    pub techs: IndexSet<TechID>,
    /// Maximum annual export
    pub max_kwh: Option<f64>,
    /// Whether annual export is limited to annual purchases (net metering)
    pub limit_to_purchases: bool,
}

/// An electric tariff
#[derive(Debug, Clone, PartialEq)]
pub struct Tariff {
    /// Energy rate per kWh for each tier and time step (`energy_rates[tier][t]`)
    pub energy_rates: Vec<Vec<f64>>,
    /// Cumulative monthly kWh limit for each energy tier
    pub energy_tier_limits: Vec<f64>,
    /// Demand rate per kW for each month and tier (`monthly_demand_rates[month][tier]`)
    pub monthly_demand_rates: Vec<Vec<f64>>,
    /// Cumulative kW limit for each monthly demand tier
    pub monthly_demand_tier_limits: Vec<f64>,
    /// Time-of-use demand charges
    pub ratchets: Vec<DemandRatchet>,
    /// Demand lookback rule, if any
    pub lookback: Option<DemandLookback>,
    /// Coincident peak charges
    pub coincident_peaks: Vec<CoincidentPeak>,
    /// Fixed charge per month
    pub fixed_monthly_charge: f64,
    /// Minimum annual bill
    pub annual_min_charge: f64,
    /// Export compensation bins
    pub export_bins: Vec<ExportBin>,
    /// Whether the site may import and export in the same time step
    pub allow_simultaneous_export_import: bool,
}

impl Tariff {
    /// A flat energy rate with no other charges
    pub fn flat(rate_per_kwh: f64, len: usize) -> Self {
        Self {
            energy_rates: vec![vec![rate_per_kwh; len]],
            energy_tier_limits: vec![f64::INFINITY],
            monthly_demand_rates: vec![vec![0.0]; 12],
            monthly_demand_tier_limits: vec![f64::INFINITY],
            ratchets: Vec::new(),
            lookback: None,
            coincident_peaks: Vec::new(),
            fixed_monthly_charge: 0.0,
            annual_min_charge: 0.0,
            export_bins: Vec::new(),
            allow_simultaneous_export_import: true,
        }
    }

    /// Number of energy tiers
    pub fn num_energy_tiers(&self) -> usize {
        self.energy_rates.len()
    }

    /// Number of monthly demand tiers
    pub fn num_monthly_demand_tiers(&self) -> usize {
        self.monthly_demand_tier_limits.len()
    }

    /// Whether any month has demand charges
    pub fn has_monthly_demand(&self) -> bool {
        self.monthly_demand_rates
            .iter()
            .flatten()
            .any(|&rate| rate != 0.0)
    }

    /// Whether binaries are needed to fill energy tiers in order.
    ///
    /// If a later tier is ever cheaper than an earlier one, the optimiser would otherwise buy
    /// from the cheaper tier first.
    pub fn energy_tiers_need_binaries(&self) -> bool {
        self.energy_rates.windows(2).any(|pair| {
            pair[0]
                .iter()
                .zip(&pair[1])
                .any(|(lower_tier, upper_tier)| upper_tier < lower_tier)
        })
    }

    /// Whether binaries are needed to fill monthly demand tiers in order.
    ///
    /// As for energy tiers, a cheaper later tier would otherwise be filled before an earlier one.
    pub fn monthly_demand_tiers_need_binaries(&self) -> bool {
        self.has_monthly_demand()
            && self
                .monthly_demand_rates
                .iter()
                .any(|rates| rates_decrease(rates))
    }

    /// Whether the tariff has any export bins
    pub fn has_export(&self) -> bool {
        !self.export_bins.is_empty()
    }

    /// Whether binaries are needed to prevent simultaneous import and export
    pub fn needs_import_export_binaries(&self) -> bool {
        self.has_export() && !self.allow_simultaneous_export_import
    }
}

/// Whether any tier's rate is lower than the one before it
fn rates_decrease(rates: &[f64]) -> bool {
    rates.windows(2).any(|pair| pair[1] < pair[0])
}

/// The size of each tier given its cumulative limit
pub fn tier_sizes(limits: &[f64]) -> Vec<f64> {
    let mut previous = 0.0;
    limits
        .iter()
        .map(|&limit| {
            let size = limit - previous;
            previous = limit;
            size
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_sizes() {
        assert_eq!(
            tier_sizes(&[1000.0, 2500.0, f64::INFINITY]),
            [1000.0, 1500.0, f64::INFINITY]
        );
    }

    #[test]
    fn test_energy_tiers_need_binaries() {
        let mut tariff = Tariff::flat(0.1, 3);
        assert!(!tariff.energy_tiers_need_binaries());

        tariff.energy_rates = vec![vec![0.1, 0.1, 0.1], vec![0.2, 0.2, 0.2]];
        tariff.energy_tier_limits = vec![1000.0, f64::INFINITY];
        assert!(!tariff.energy_tiers_need_binaries());

        tariff.energy_rates[1][2] = 0.05;
        assert!(tariff.energy_tiers_need_binaries());
    }

    #[test]
    fn test_demand_tiers_need_binaries() {
        let mut tariff = Tariff::flat(0.1, 3);
        tariff.monthly_demand_tier_limits = vec![50.0, f64::INFINITY];
        tariff.monthly_demand_rates = vec![vec![10.0, 15.0]; 12];
        assert!(!tariff.monthly_demand_tiers_need_binaries());

        tariff.monthly_demand_rates[6] = vec![20.0, 5.0];
        assert!(tariff.monthly_demand_tiers_need_binaries());

        let mut ratchet = DemandRatchet {
            time_steps: vec![0, 1],
            rates: vec![8.0, 8.0],
            tier_limits: vec![20.0, f64::INFINITY],
        };
        assert!(!ratchet.tiers_need_binaries());
        ratchet.rates[1] = 2.0;
        assert!(ratchet.tiers_need_binaries());
    }

    #[test]
    fn test_import_export_binaries() {
        let mut tariff = Tariff::flat(0.1, 3);
        tariff.allow_simultaneous_export_import = false;
        assert!(!tariff.needs_import_export_binaries());

        tariff.export_bins.push(ExportBin {
            name: "wholesale".into(),
            rates: vec![0.03; 3],
            techs: IndexSet::new(),
            max_kwh: None,
            limit_to_purchases: false,
        });
        assert!(tariff.needs_import_export_binaries());
    }
}

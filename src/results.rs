//! Structured, rounded results read from a solved model.
//!
//! Results are grouped into categories (`Financial`, `ElectricTariff`, one per technology and so
//! on), each an ordered map of named metrics. Year-one values are lifecycle expressions divided by
//! their present-worth factor; lifecycle values are after tax.
use crate::optimisation::BuildContext;
use crate::optimisation::FormulationMode;
use crate::optimisation::solve::{SolveOutcome, SolveStatus};
use indexmap::IndexMap;
use serde::Serialize;

mod dispatch;
mod financial;
mod outage;
pub use financial::YearOneSummary;

/// Number of decimal places used for series
pub const SERIES_DECIMAL_PLACES: i32 = 3;

/// Number of decimal places used for the time spent in the solver
pub const SOLVER_SECONDS_DECIMAL_PLACES: i32 = 3;

/// A single named result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metric {
    /// A single number
    Scalar(f64),
    /// One number per time step (or per outage window)
    Series(Vec<f64>),
    /// A label
    Text(String),
    /// Metrics for each instance of a grouped technology class
    Breakdown(IndexMap<String, MetricMap>),
}

impl Metric {
    /// The value, if this is a scalar
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    /// The values, if this is a series
    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            Self::Series(values) => Some(values),
            _ => None,
        }
    }
}

/// Metrics in one category, in insertion order
pub type MetricMap = IndexMap<String, Metric>;

/// Every result for one solve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    /// How the solve terminated
    pub status: SolveStatus,
    /// Wall-clock time spent in the solver
    pub solver_seconds: f64,
    /// Categories of metrics
    #[serde(flatten)]
    pub categories: IndexMap<String, MetricMap>,
}

impl ResultSet {
    /// A result set with no metrics
    pub fn new(status: SolveStatus, solver_seconds: f64) -> Self {
        Self {
            status,
            solver_seconds: round_to(solver_seconds, SOLVER_SECONDS_DECIMAL_PLACES),
            categories: IndexMap::new(),
        }
    }

    /// Look up a metric
    pub fn get(&self, category: &str, key: &str) -> Option<&Metric> {
        self.categories.get(category)?.get(key)
    }

    /// Look up a scalar metric
    pub fn scalar(&self, category: &str, key: &str) -> Option<f64> {
        self.get(category, key)?.as_scalar()
    }

    /// Look up a series metric
    pub fn series(&self, category: &str, key: &str) -> Option<&[f64]> {
        self.get(category, key)?.as_series()
    }

    /// Add a metric, creating its category if needed
    pub fn insert(&mut self, category: &str, key: impl Into<String>, metric: Metric) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .insert(key.into(), metric);
    }
}

/// Round to the given number of decimal places.
///
/// Negative zero is returned as zero.
pub fn round_to(value: f64, decimal_places: i32) -> f64 {
    let scale = 10f64.powi(decimal_places);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Round every value of a series to [`SERIES_DECIMAL_PLACES`]
pub fn round_series(values: impl IntoIterator<Item = f64>) -> Metric {
    Metric::Series(
        values
            .into_iter()
            .map(|value| round_to(value, SERIES_DECIMAL_PLACES))
            .collect(),
    )
}

/// Builds metric keys, which carry a `year_one_` prefix for lifecycle runs only
#[derive(Debug, Clone, Copy)]
pub(crate) struct Keys {
    lifecycle: bool,
}

impl Keys {
    /// Keys for the given formulation mode
    pub(crate) fn new(mode: FormulationMode) -> Self {
        Self {
            lifecycle: mode == FormulationMode::Lifecycle,
        }
    }

    /// Whether lifecycle metrics are reported
    pub(crate) fn is_lifecycle(self) -> bool {
        self.lifecycle
    }

    /// A key for a value over the modelled year (or control horizon)
    pub(crate) fn year_one(self, name: &str) -> String {
        if self.lifecycle {
            format!("year_one_{name}")
        } else {
            name.to_string()
        }
    }
}

/// Read the results for one node from a solution
pub fn extract(
    ctx: &BuildContext,
    values: &[f64],
    status: SolveStatus,
    solver_seconds: f64,
) -> ResultSet {
    let mut results = ResultSet::new(status, solver_seconds);
    let keys = Keys::new(ctx.mode);

    financial::add_financial_metrics(&mut results, ctx, values, keys);
    financial::add_tariff_metrics(&mut results, ctx, values, keys);
    dispatch::add_utility_metrics(&mut results, ctx, values, keys);
    dispatch::add_load_metrics(&mut results, ctx, keys);
    dispatch::add_technology_metrics(&mut results, ctx, values, keys);
    dispatch::add_storage_metrics(&mut results, ctx, values, keys);
    outage::add_outage_metrics(&mut results, ctx, values);

    results
}

/// Read the results for one node from the outcome of a solve.
///
/// Timed-out solves are read from the best solution found. If there is no solution, only the
/// status is reported.
pub fn from_outcome(ctx: &BuildContext, outcome: &SolveOutcome) -> ResultSet {
    match outcome.solution() {
        Some(solved) => extract(ctx, &solved.values, outcome.status(), solved.solver_seconds),
        None => ResultSet::new(outcome.status(), outcome.solver_seconds()),
    }
}

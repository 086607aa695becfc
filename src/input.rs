//! Common routines for handling input data.
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use serde::de::{DeserializeOwned, Deserializer};
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

mod financial;
pub use financial::FinancialParams;
mod load;
pub use load::LoadParams;
mod outage;
pub use outage::OutageParams;
mod scenario;
pub use scenario::{LoadedScenario, load_control_scenario, load_nodes, load_scenario};
mod storage;
pub use storage::StorageParams;
mod tariff;
pub use tariff::TariffParams;
mod technology;
pub use technology::TechnologyParams;

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Read a single column of numbers from a CSV file.
///
/// The file must have a header row. Only the first column is read.
pub fn read_csv_series(file_path: &Path) -> Result<Vec<f64>> {
    let mut reader = csv::Reader::from_path(file_path).with_context(|| input_err_msg(file_path))?;

    let mut values = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| input_err_msg(file_path))?;
        let field = record
            .get(0)
            .with_context(|| format!("Empty row {} in {}", row + 1, file_path.display()))?;
        let value: f64 = field.trim().parse().with_context(|| {
            format!(
                "Invalid number '{field}' on row {} of {}",
                row + 1,
                file_path.display()
            )
        })?;
        values.push(value);
    }
    ensure!(
        !values.is_empty(),
        "CSV file {} cannot be empty",
        file_path.display()
    );

    Ok(values)
}

/// Read an f64, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value is not between 0 and 1"))?;
    }

    Ok(value)
}

/// A time series given inline, as a constant or as a path to a CSV file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimeSeriesInput {
    /// The same value for every time step
    Constant(f64),
    /// One value per time step
    Values(Vec<f64>),
    /// A CSV file, relative to the scenario file
    Csv {
        /// Path to the file
        csv: PathBuf,
    },
}

impl TimeSeriesInput {
    /// Expand the input into a series of exactly `len` values.
    ///
    /// A series whose length divides `len` (e.g. an hourly series for a model with 15-minute time
    /// steps) has each value repeated to fill the horizon.
    pub fn resolve(&self, base_dir: &Path, len: usize) -> Result<Vec<f64>> {
        let values = match self {
            Self::Constant(value) => return Ok(vec![*value; len]),
            Self::Values(values) => values.clone(),
            Self::Csv { csv } => read_csv_series(&base_dir.join(csv))?,
        };

        expand_series(values, len)
    }
}

/// Stretch a series to exactly `len` values by repeating each value.
///
/// The series length must divide `len`.
pub fn expand_series(values: Vec<f64>, len: usize) -> Result<Vec<f64>> {
    ensure!(
        !values.is_empty() && len % values.len() == 0,
        "Time series has {} values but {} time steps are modelled",
        values.len(),
        len
    );
    let repeat = len / values.len();

    Ok(values
        .into_iter()
        .flat_map(|value| std::iter::repeat_n(value, repeat))
        .collect())
}

/// Indicates that the parameters for an object violated one or more numeric constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// A description of the object being validated, e.g. `technology pv`
    pub object: String,
    /// Every constraint that was violated
    pub violations: Vec<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid parameters for {}: ", self.object)?;
        write!(f, "{}", self.violations.join("; "))
    }
}

impl Error for ValidationError {}

/// Collects violated constraints so that they can all be reported at once
#[derive(Debug)]
pub struct Violations {
    object: String,
    violations: Vec<String>,
}

impl Violations {
    /// Start collecting violations for the given object
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            violations: Vec::new(),
        }
    }

    /// Record a violation unless `condition` holds
    pub fn check(&mut self, condition: bool, message: impl FnOnce() -> String) {
        if !condition {
            self.violations.push(message());
        }
    }

    /// Check that a field is finite and non-negative
    pub fn non_negative(&mut self, field: &str, value: f64) {
        self.check(value.is_finite() && value >= 0.0, || {
            format!("{field} must be a non-negative number (got {value})")
        });
    }

    /// Check that a field is between 0 and 1
    pub fn fraction(&mut self, field: &str, value: f64) {
        self.check((0.0..=1.0).contains(&value), || {
            format!("{field} must be between 0 and 1 (got {value})")
        });
    }

    /// Check that a field is strictly between 0 and 1, or equal to 1
    pub fn efficiency(&mut self, field: &str, value: f64) {
        self.check(value > 0.0 && value <= 1.0, || {
            format!("{field} must be greater than 0 and at most 1 (got {value})")
        });
    }

    /// Check that a lower bound doesn't exceed an upper bound
    pub fn ordered(&mut self, lower_field: &str, lower: f64, upper_field: &str, upper: f64) {
        self.check(lower <= upper, || {
            format!("{lower_field} ({lower}) must not exceed {upper_field} ({upper})")
        });
    }

    /// Finish validation, failing if any violations were found
    pub fn finish(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            return Ok(());
        }

        Err(ValidationError {
            object: self.object,
            violations: self.violations,
        })
    }
}

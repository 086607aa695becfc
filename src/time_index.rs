//! The ordered sequence of dispatch intervals covered by an optimisation.
use anyhow::{Result, ensure};

/// Number of days in each month of a (non-leap) year
const DAYS_PER_MONTH: [usize; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Number of hours in a (non-leap) year
pub const HOURS_PER_YEAR: usize = 8760;

/// The dispatch intervals for one year or for an arbitrary horizon.
///
/// Every time-indexed variable and constraint is aligned to this sequence. Time steps are
/// numbered from zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeIndex {
    time_steps_per_hour: usize,
    /// Month (0-11) of each time step
    months: Vec<usize>,
}

impl TimeIndex {
    /// A full year of time steps, starting on the first of January
    pub fn for_year(time_steps_per_hour: usize) -> Result<Self> {
        Self::for_horizon(HOURS_PER_YEAR * time_steps_per_hour, time_steps_per_hour, 0)
    }

    /// An arbitrary horizon of `len` time steps.
    ///
    /// `start_step` is the offset of the first step from the start of the year, which determines
    /// the month of each step. Horizons running past the end of the year wrap around.
    pub fn for_horizon(len: usize, time_steps_per_hour: usize, start_step: usize) -> Result<Self> {
        ensure!(
            matches!(time_steps_per_hour, 1 | 2 | 4),
            "time_steps_per_hour must be 1, 2 or 4"
        );
        ensure!(len > 0, "Time horizon must contain at least one time step");

        let month_of_step: Vec<usize> = DAYS_PER_MONTH
            .iter()
            .enumerate()
            .flat_map(|(month, days)| {
                std::iter::repeat_n(month, days * 24 * time_steps_per_hour)
            })
            .collect();
        let months = (start_step..start_step + len)
            .map(|step| month_of_step[step % month_of_step.len()])
            .collect();

        Ok(Self {
            time_steps_per_hour,
            months,
        })
    }

    /// Number of time steps
    pub fn len(&self) -> usize {
        self.months.len()
    }

    /// Whether there are no time steps (never true for a validated index)
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Number of time steps per hour
    pub fn time_steps_per_hour(&self) -> usize {
        self.time_steps_per_hour
    }

    /// Length of each time step in hours
    pub fn step_hours(&self) -> f64 {
        1.0 / self.time_steps_per_hour as f64
    }

    /// Length of the horizon as a fraction of a year
    pub fn year_fraction(&self) -> f64 {
        self.len() as f64 * self.step_hours() / HOURS_PER_YEAR as f64
    }

    /// Iterate over the time steps
    pub fn iter(&self) -> std::ops::Range<usize> {
        0..self.len()
    }

    /// The month (0-11) of a time step
    pub fn month_of(&self, time_step: usize) -> usize {
        self.months[time_step]
    }

    /// The months covered by the horizon, in order of first appearance
    pub fn months(&self) -> Vec<usize> {
        let mut months: Vec<usize> = Vec::new();
        for &month in &self.months {
            if !months.contains(&month) {
                months.push(month);
            }
        }

        months
    }

    /// The time steps falling in the given month
    pub fn steps_in_month(&self, month: usize) -> impl Iterator<Item = usize> + '_ {
        self.iter().filter(move |&t| self.months[t] == month)
    }
}

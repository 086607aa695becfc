//! Grid outages which the site may need to ride through as a microgrid.
use serde_string_enum::DeserializeLabeledStringEnum;

/// How the cost of an ensemble of outages enters the objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, DeserializeLabeledStringEnum)]
pub enum OutageCostPolicy {
    #[default]
    #[string = "expected"]
    /// Probability-weighted sum over outage durations
    Expected,
    #[string = "worst_duration"]
    /// Cost of the worst outage duration
    WorstDuration,
}

/// A stochastic ensemble of outages.
///
/// Every combination of duration and start time step is modelled, so the number of microgrid
/// windows is `durations.len() * start_time_steps.len()`. All start times are equally likely.
#[derive(Debug, Clone, PartialEq)]
pub struct OutageScenarios {
    /// Length of each outage scenario in time steps
    pub durations: Vec<usize>,
    /// Probability of each outage scenario
    pub probabilities: Vec<f64>,
    /// Time steps at which an outage may start
    pub start_time_steps: Vec<usize>,
    /// Cost of each kWh of critical load not served
    pub value_of_lost_load_per_kwh: f64,
    /// Load which must be served during an outage, for each time step
    pub critical_loads_kw: Vec<f64>,
    /// Cost of making a technology microgrid-capable, as a fraction of its capital cost
    pub mg_upgrade_cost_fraction: f64,
    /// Number of time steps at the start of each outage in which all critical load must be met
    pub min_resilience_time_steps: usize,
    /// How outage costs are aggregated
    pub cost_policy: OutageCostPolicy,
    /// Whether the microgrid must include a dispatchable resource or storage
    pub require_dispatchable: bool,
}

impl OutageScenarios {
    /// Number of outage scenarios
    pub fn num_scenarios(&self) -> usize {
        self.durations.len()
    }

    /// The probability of one (scenario, start) outage window
    pub fn window_probability(&self, scenario: usize) -> f64 {
        self.probabilities[scenario] / self.start_time_steps.len() as f64
    }

    /// The grid-connected time step corresponding to step `ts` of an outage starting at `start`
    pub fn time_step(&self, start: usize, ts: usize, num_time_steps: usize) -> usize {
        (start + ts) % num_time_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn outages() -> OutageScenarios {
        OutageScenarios {
            durations: vec![1, 2],
            probabilities: vec![0.5, 0.5],
            start_time_steps: vec![0, 23],
            value_of_lost_load_per_kwh: 100.0,
            critical_loads_kw: vec![10.0; 24],
            mg_upgrade_cost_fraction: 0.0,
            min_resilience_time_steps: 0,
            cost_policy: OutageCostPolicy::Expected,
            require_dispatchable: false,
        }
    }

    #[test]
    fn test_time_step_wraps() {
        assert_eq!(outages().time_step(23, 1, 24), 0);
    }

    #[test]
    fn test_window_probability() {
        assert_approx_eq!(f64, outages().window_probability(1), 0.25);
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Acceptance bookkeeping for one move.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveStatistics {
    pub attempts: u64,
    pub accepted: u64,
    /// Trials rejected because two particles coincided or the energy was NaN.
    pub overflows: u64,
    /// Sum of squared displacements over accepted trials, in Å² (Å⁶ for volume moves).
    pub sum_squared_displacement: f64,
}

impl MoveStatistics {
    pub fn acceptance(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempts as f64
        }
    }

    /// Mean squared displacement per attempted trial.
    pub fn mean_squared_displacement(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.sum_squared_displacement / self.attempts as f64
        }
    }
}

/// Everything about a running chain that is not the configuration itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Incrementally tracked total energy in kT.
    pub energy: f64,
    /// Number of trials performed.
    pub trials: u64,
    /// Completed macro steps.
    pub macro_step: u64,
    /// Completed micro steps, counted over the whole run.
    pub micro_step: u64,
    pub accepted_since_rebuild: u64,
    pub statistics: BTreeMap<String, MoveStatistics>,
    pub drift_warnings: u64,
    pub max_relative_drift: f64,
}

impl RunState {
    pub fn new(energy: f64) -> Self {
        Self {
            energy,
            ..Self::default()
        }
    }

    pub fn statistics_mut(&mut self, name: &str) -> &mut MoveStatistics {
        self.statistics.entry(name.to_string()).or_default()
    }

    /// Acceptance over all trials of all moves.
    pub fn overall_acceptance(&self) -> f64 {
        let (attempts, accepted) = self
            .statistics
            .values()
            .fold((0, 0), |(n, a), s| (n + s.attempts, a + s.accepted));
        if attempts == 0 {
            0.0
        } else {
            accepted as f64 / attempts as f64
        }
    }
}

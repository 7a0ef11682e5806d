//! Checkpoint snapshots of run state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::step::Params;

/// Checkpoint names that mark the end of a major experiment phase.
pub const CRITICAL_CHECKPOINTS: &[&str] = &[
    "experiment_setup_complete",
    "solution_preparation_complete",
    "electrode_setup_complete",
    "measurement_cycle_complete",
    "cleaning_complete",
];

/// A named, immutable snapshot of run state tied to a step index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// `{name}_{creation time in microseconds}`.
    pub id: String,
    pub name: String,
    pub step_index: usize,
    pub state: Params,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(name: impl Into<String>, step_index: usize, state: Params) -> Self {
        let name = name.into();
        let timestamp = Utc::now();
        Self {
            id: format!("{name}_{}", timestamp.timestamp_micros()),
            name,
            step_index,
            state,
            timestamp,
        }
    }

    pub fn is_critical(&self) -> bool {
        CRITICAL_CHECKPOINTS.contains(&self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_derived_from_name_and_time() {
        let cp = Checkpoint::new("electrode_setup_complete", 2, Params::new());
        let suffix = cp.timestamp.timestamp_micros().to_string();
        assert_eq!(cp.id, format!("electrode_setup_complete_{suffix}"));
        assert!(cp.is_critical());
    }

    #[test]
    fn non_phase_names_are_not_critical() {
        let cp = Checkpoint::new("after_home", 0, Params::new());
        assert!(!cp.is_critical());
    }
}

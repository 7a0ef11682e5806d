//! Recovery statistics and diagnostic dumps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checkpoint::Checkpoint;

/// Cumulative counters for one run. Only ever incremented until the next
/// run starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub total_errors: u32,
    pub successful_recoveries: u32,
    pub failed_recoveries: u32,
    pub manual_interventions: u32,
}

impl RecoveryStats {
    /// Percentage of restore attempts that succeeded, rounded to 2 decimals.
    /// Zero when no restore was attempted.
    pub fn success_rate(&self) -> f64 {
        let attempts = self.successful_recoveries + self.failed_recoveries;
        if attempts == 0 {
            return 0.0;
        }
        let rate = f64::from(self.successful_recoveries) / f64::from(attempts) * 100.0;
        (rate * 100.0).round() / 100.0
    }
}

/// Snapshot returned by the recovery manager's statistics query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryReport {
    #[serde(flatten)]
    pub stats: RecoveryStats,
    pub success_rate: f64,
    pub total_checkpoints: usize,
    pub workflow_id: Option<String>,
}

/// State written to disk whenever the hardware is stopped or an operator is
/// paged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticDump {
    pub timestamp: DateTime<Utc>,
    pub workflow_id: Option<String>,
    pub reason: String,
    pub controller_state: Value,
    pub experiment_data: Value,
    pub checkpoints: Vec<Checkpoint>,
    pub recovery_stats: RecoveryStats,
}

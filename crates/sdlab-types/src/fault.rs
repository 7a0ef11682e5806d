//! Fault taxonomy for lab hardware and unit operations.
//!
//! Every classified fault belongs to exactly one [`FaultKind`], and the kind
//! alone fixes its [`Severity`] and default [`RecoveryAction`]. Deciding what
//! to actually do about a fault is left to the recovery manager, which also
//! looks at retry history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Severity / RecoveryAction
// ---------------------------------------------------------------------------

/// How serious a fault is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Retryable in place.
    Minor,
    /// Retry once, then roll back to a prior checkpoint.
    Moderate,
    /// Halt actuation and wait for an operator.
    Severe,
    /// Halt all hardware immediately.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Minor => write!(f, "minor"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Severe => write!(f, "severe"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// The concrete response chosen for a fault instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Retry,
    RestartFromCheckpoint,
    SafeStop,
    EmergencyStop,
    ManualIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryAction::Retry => write!(f, "retry"),
            RecoveryAction::RestartFromCheckpoint => write!(f, "restart_from_checkpoint"),
            RecoveryAction::SafeStop => write!(f, "safe_stop"),
            RecoveryAction::EmergencyStop => write!(f, "emergency_stop"),
            RecoveryAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

// ---------------------------------------------------------------------------
// FaultKind
// ---------------------------------------------------------------------------

/// The closed set of classified fault kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Pipetting,
    Electrode,
    Electrochemical,
    CriticalSystem,
}

impl FaultKind {
    /// Severity bound to this kind.
    pub fn severity(self) -> Severity {
        match self {
            FaultKind::Pipetting => Severity::Minor,
            FaultKind::Electrode | FaultKind::Electrochemical => Severity::Moderate,
            FaultKind::CriticalSystem => Severity::Critical,
        }
    }

    /// Default recovery action bound to this kind.
    pub fn default_action(self) -> RecoveryAction {
        match self {
            FaultKind::Pipetting => RecoveryAction::Retry,
            FaultKind::Electrode | FaultKind::Electrochemical => {
                RecoveryAction::RestartFromCheckpoint
            }
            FaultKind::CriticalSystem => RecoveryAction::EmergencyStop,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Pipetting => write!(f, "pipetting"),
            FaultKind::Electrode => write!(f, "electrode"),
            FaultKind::Electrochemical => write!(f, "electrochemical"),
            FaultKind::CriticalSystem => write!(f, "critical system"),
        }
    }
}

// ---------------------------------------------------------------------------
// LabFault
// ---------------------------------------------------------------------------

/// A classified fault instance.
///
/// Construction never fails; use the factory functions rather than building
/// the struct by hand so the timestamp is always the creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct LabFault {
    pub kind: FaultKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LabFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn pipetting(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Pipetting, message)
    }

    pub fn electrode(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Electrode, message)
    }

    pub fn electrochemical(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Electrochemical, message)
    }

    pub fn critical_system(message: impl Into<String>) -> Self {
        Self::new(FaultKind::CriticalSystem, message)
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn default_action(&self) -> RecoveryAction {
        self.kind.default_action()
    }
}

// ---------------------------------------------------------------------------
// StepFault
// ---------------------------------------------------------------------------

/// What a step function fails with.
///
/// Anything that is not a [`LabFault`] is unclassified and is never retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StepFault {
    #[error(transparent)]
    Classified(#[from] LabFault),

    #[error("unclassified fault: {0}")]
    Unclassified(String),
}

impl StepFault {
    pub fn unclassified(message: impl Into<String>) -> Self {
        StepFault::Unclassified(message.into())
    }
}

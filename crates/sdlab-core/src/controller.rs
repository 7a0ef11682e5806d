//! Hardware-controller ports.
//!
//! [`RecoveryCapabilities`] is the narrow surface the recovery manager needs.
//! Everything but state capture and restore has a no-op default, so a
//! controller that cannot, say, disable temperature control simply inherits
//! the default and the recovery manager calls it unconditionally.
//!
//! [`LabController`] adds the primitives unit operations are built from.
//!
//! Uses native async fn in traits (Rust 2024 edition, no async_trait macro).

use std::future::Future;

use serde::Serialize;
use serde_json::Value;

use sdlab_types::experiment::{ExperimentData, MeasurementPlan, MeasurementSummary};
use sdlab_types::fault::StepFault;

// ---------------------------------------------------------------------------
// ControllerError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControllerError {
    #[error("motion error: {0}")]
    Motion(String),

    #[error("liquid handling error: {0}")]
    Liquid(String),

    #[error("instrument error: {0}")]
    Instrument(String),

    #[error("communication lost: {0}")]
    Communication(String),

    #[error("controller is emergency-stopped")]
    EmergencyStopped,

    #[error("invalid state snapshot: {0}")]
    InvalidState(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ControllerError {
    /// Faults that no operation-level retry can fix.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ControllerError::Communication(_) | ControllerError::EmergencyStopped
        )
    }
}

impl From<ControllerError> for StepFault {
    fn from(err: ControllerError) -> Self {
        StepFault::Unclassified(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// WellTarget
// ---------------------------------------------------------------------------

/// Reference point that offsets are measured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetStart {
    Top,
    #[default]
    Bottom,
}

/// A well on a piece of labware, addressed with a pipette and offsets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellTarget {
    pub labware: String,
    pub well: String,
    pub pipette: String,
    pub offset_start: OffsetStart,
    pub offset: [f64; 3],
    pub speed: Option<f64>,
}

impl WellTarget {
    pub fn new(labware: impl Into<String>, well: impl Into<String>, pipette: impl Into<String>) -> Self {
        Self {
            labware: labware.into(),
            well: well.into(),
            pipette: pipette.into(),
            offset_start: OffsetStart::Bottom,
            offset: [0.0; 3],
            speed: None,
        }
    }

    pub fn from_top(mut self) -> Self {
        self.offset_start = OffsetStart::Top;
        self
    }

    pub fn offset(mut self, x: f64, y: f64, z: f64) -> Self {
        self.offset = [x, y, z];
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// `labware:well`
    pub fn location(&self) -> String {
        format!("{}:{}", self.labware, self.well)
    }
}

// ---------------------------------------------------------------------------
// RecoveryCapabilities
// ---------------------------------------------------------------------------

/// Capabilities the recovery manager calls on the controller.
///
/// Callers must serialize access to one controller instance; implementations
/// are mutated in place across steps.
pub trait RecoveryCapabilities: Send + Sync {
    /// Snapshot of controller state for checkpoints and dumps.
    fn get_state(&self) -> impl Future<Output = Result<Value, ControllerError>> + Send;

    /// Put the controller back into a previously captured state.
    fn restore_state(
        &self,
        snapshot: &Value,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send;

    /// Experiment-data buffers held by the controller.
    fn experiment_data(&self) -> impl Future<Output = ExperimentData> + Send {
        async { ExperimentData::default() }
    }

    fn restore_experiment_data(
        &self,
        _data: &ExperimentData,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send {
        async { Ok(()) }
    }

    /// Clear a latched error so the next attempt can proceed.
    fn clear_error_state(&self) -> impl Future<Output = Result<(), ControllerError>> + Send {
        async { Ok(()) }
    }

    fn stop_all_movements(&self) -> impl Future<Output = Result<(), ControllerError>> + Send {
        async { Ok(()) }
    }

    fn disable_temperature_control(
        &self,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send {
        async { Ok(()) }
    }

    /// Immediate, unconditional halt of all actuation.
    fn emergency_stop(&self) -> impl Future<Output = Result<(), ControllerError>> + Send {
        async { Ok(()) }
    }
}

// ---------------------------------------------------------------------------
// LabController
// ---------------------------------------------------------------------------

/// Device primitives that unit operations are composed of.
pub trait LabController: RecoveryCapabilities {
    fn home(&self) -> impl Future<Output = Result<(), ControllerError>> + Send;

    fn move_to_well(
        &self,
        target: &WellTarget,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send;

    fn pick_up_tip(
        &self,
        target: &WellTarget,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send;

    fn drop_tip(
        &self,
        target: &WellTarget,
        into_disposal: bool,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send;

    /// Volumes are in microlitres.
    fn aspirate(
        &self,
        target: &WellTarget,
        volume: f64,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send;

    fn dispense(
        &self,
        target: &WellTarget,
        volume: f64,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send;

    fn delay(
        &self,
        seconds: f64,
        message: &str,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send;

    /// Reserve the next fresh tip and return its well (`A1`..`H12`).
    fn next_tip_location(&self) -> impl Future<Output = Result<String, ControllerError>> + Send;

    /// Run a measurement, appending rows to the experiment-data buffers.
    fn run_measurement(
        &self,
        plan: &MeasurementPlan,
    ) -> impl Future<Output = Result<MeasurementSummary, ControllerError>> + Send;

    /// Volumes are in millilitres.
    fn run_pump(
        &self,
        pump: u8,
        volume: f64,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send;

    fn run_ultrasonic(&self, millis: u64)
    -> impl Future<Output = Result<(), ControllerError>> + Send;

    fn clear_experiment_data(&self) -> impl Future<Output = ()> + Send;

    fn status(&self) -> impl Future<Output = Value> + Send;
}

/// Convert a 1-based tip id into its well on a 96-tip rack.
pub fn tip_well(tip_id: u32) -> Option<String> {
    if !(1..=96).contains(&tip_id) {
        return None;
    }
    let row = (b'A' + ((tip_id - 1) / 12) as u8) as char;
    let col = (tip_id - 1) % 12 + 1;
    Some(format!("{row}{col}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tip_well_covers_rack() {
        assert_eq!(tip_well(1).as_deref(), Some("A1"));
        assert_eq!(tip_well(12).as_deref(), Some("A12"));
        assert_eq!(tip_well(13).as_deref(), Some("B1"));
        assert_eq!(tip_well(96).as_deref(), Some("H12"));
        assert_eq!(tip_well(0), None);
        assert_eq!(tip_well(97), None);
    }

    #[test]
    fn fatal_errors_are_unclassified() {
        assert!(ControllerError::Communication("usb".into()).is_fatal());
        assert!(!ControllerError::Motion("stall".into()).is_fatal());
        let fault: StepFault = ControllerError::EmergencyStopped.into();
        assert!(matches!(fault, StepFault::Unclassified(_)));
    }

    #[test]
    fn well_target_builder() {
        let target = WellTarget::new("slot_9", "A1", "p1000_single_gen2")
            .from_top()
            .offset(0.5, 0.5, -26.0)
            .speed(50.0);
        assert_eq!(target.offset_start, OffsetStart::Top);
        assert_eq!(target.offset, [0.5, 0.5, -26.0]);
        assert_eq!(target.location(), "slot_9:A1");
    }
}

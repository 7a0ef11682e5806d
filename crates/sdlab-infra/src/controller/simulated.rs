//! Dry-run lab controller.
//!
//! Tracks what a real deck would: pipette position, tip usage, the loaded
//! tip, experiment data and stop flags. Measurements synthesize plausible DC
//! or impedance rows. Nothing leaves the process.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use sdlab_core::controller::{ControllerError, LabController, RecoveryCapabilities, WellTarget, tip_well};
use sdlab_types::config::HardwareConfig;
use sdlab_types::experiment::{
    AcRow, DcRow, ExperimentData, MeasurementPlan, MeasurementSummary, MeasurementType,
};

use super::fault_plan::{FaultPlan, FaultSpec};

/// Cap on synthesized DC rows per measurement.
const MAX_SIMULATED_ROWS: usize = 5_000;

/// Impedance sweep used for simulated PEIS.
const PEIS_START_HZ: f64 = 10_000.0;
const PEIS_END_HZ: f64 = 0.1;
const PEIS_POINTS: usize = 25;

/// Restorable part of the controller state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Snapshot {
    position: Option<String>,
    tip_counter: u32,
    loaded_tip: Option<String>,
    temperature_control: bool,
}

#[derive(Debug, Default)]
struct SimState {
    snapshot: Snapshot,
    data: ExperimentData,
    /// Last error raised, until cleared.
    error_latch: Option<String>,
    movements_stopped: bool,
    emergency_stopped: bool,
}

pub struct SimulatedController {
    hardware: HardwareConfig,
    state: Mutex<SimState>,
    faults: Mutex<FaultPlan>,
}

impl SimulatedController {
    pub fn new(hardware: HardwareConfig) -> Self {
        Self {
            hardware,
            state: Mutex::new(SimState {
                snapshot: Snapshot {
                    tip_counter: 1,
                    ..Default::default()
                },
                ..Default::default()
            }),
            faults: Mutex::new(FaultPlan::default()),
        }
    }

    /// Schedule failures for an operation.
    pub fn inject_fault(&self, spec: FaultSpec) {
        tracing::debug!(operation = %spec.operation, count = spec.count, "fault injected");
        lock(&self.faults).add(spec);
    }

    pub fn is_dry_run(&self) -> bool {
        self.hardware.dry_run
    }

    pub fn is_emergency_stopped(&self) -> bool {
        lock(&self.state).emergency_stopped
    }

    pub fn movements_stopped(&self) -> bool {
        lock(&self.state).movements_stopped
    }

    /// Gate every primitive: emergency latch first, then injected faults.
    fn check(&self, operation: &str) -> Result<(), ControllerError> {
        if lock(&self.state).emergency_stopped {
            return Err(ControllerError::EmergencyStopped);
        }
        if let Some(err) = lock(&self.faults).take(operation) {
            tracing::debug!(operation, error = %err, "raising injected fault");
            lock(&self.state).error_latch = Some(err.to_string());
            return Err(err);
        }
        Ok(())
    }

    /// Sleep for `seconds` when delays are simulated. Negative, NaN and
    /// unrepresentable durations are rejected either way.
    async fn pause(&self, seconds: f64) -> Result<(), ControllerError> {
        let duration = Duration::try_from_secs_f64(seconds).map_err(|e| {
            ControllerError::InvalidArgument(format!("duration of {seconds} s: {e}"))
        })?;
        if self.hardware.simulate_delays && !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
        Ok(())
    }

    fn set_position(&self, target: &WellTarget) {
        lock(&self.state).snapshot.position = Some(target.location());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Measurement synthesis
// ---------------------------------------------------------------------------

fn synthesize_dc(plan: &MeasurementPlan) -> Vec<DcRow> {
    let rows = ((plan.duration_s / plan.sample_interval_s).floor() as usize).clamp(1, MAX_SIMULATED_ROWS);
    let step = plan.duration_s / rows as f64;
    (0..rows)
        .map(|i| {
            let t = i as f64 * step;
            let progress = t / plan.duration_s.max(f64::EPSILON);
            let (current_a, we_voltage_v) = match plan.kind {
                MeasurementType::Ocv => (0.0, 0.25 + 0.005 * progress),
                MeasurementType::Cp => (-0.004, 1.40 + 0.02 * progress),
                MeasurementType::Cva => {
                    // triangle sweep between -0.5 V and 0.5 V
                    let phase = (progress * 2.0) % 2.0;
                    let v = if phase < 1.0 { -0.5 + phase } else { 1.5 - phase };
                    (v * 0.01, v)
                }
                MeasurementType::Lsv | MeasurementType::Peis => {
                    let v = -0.5 + progress;
                    (v * 0.01, v)
                }
            };
            DcRow {
                timestamp_s: t,
                current_a,
                we_voltage_v,
            }
        })
        .collect()
}

fn synthesize_ac() -> Vec<AcRow> {
    let decades = PEIS_START_HZ.log10() - PEIS_END_HZ.log10();
    (0..PEIS_POINTS)
        .map(|i| {
            let exponent = PEIS_START_HZ.log10() - decades * i as f64 / (PEIS_POINTS - 1) as f64;
            let frequency = 10f64.powf(exponent);
            // series resistance plus one RC element
            let omega_rc = frequency / 100.0;
            let real = 10.0 + 50.0 / (1.0 + omega_rc * omega_rc);
            let imag = -50.0 * omega_rc / (1.0 + omega_rc * omega_rc);
            AcRow {
                timestamp: i as f64,
                frequency,
                absolute_impedance: real.hypot(imag),
                real_impedance: real,
                imag_impedance: imag,
                phase_angle: imag.atan2(real).to_degrees(),
                number_of_cycles: 1,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// RecoveryCapabilities
// ---------------------------------------------------------------------------

impl RecoveryCapabilities for SimulatedController {
    async fn get_state(&self) -> Result<Value, ControllerError> {
        let snapshot = lock(&self.state).snapshot.clone();
        serde_json::to_value(snapshot).map_err(|e| ControllerError::InvalidState(e.to_string()))
    }

    async fn restore_state(&self, snapshot: &Value) -> Result<(), ControllerError> {
        let snapshot: Snapshot = serde_json::from_value(snapshot.clone())
            .map_err(|e| ControllerError::InvalidState(e.to_string()))?;
        tracing::debug!(tip_counter = snapshot.tip_counter, "controller state restored");
        lock(&self.state).snapshot = snapshot;
        Ok(())
    }

    async fn experiment_data(&self) -> ExperimentData {
        lock(&self.state).data.clone()
    }

    async fn restore_experiment_data(&self, data: &ExperimentData) -> Result<(), ControllerError> {
        lock(&self.state).data = data.clone();
        Ok(())
    }

    async fn clear_error_state(&self) -> Result<(), ControllerError> {
        lock(&self.state).error_latch = None;
        Ok(())
    }

    async fn stop_all_movements(&self) -> Result<(), ControllerError> {
        tracing::warn!("all movements stopped");
        lock(&self.state).movements_stopped = true;
        Ok(())
    }

    async fn disable_temperature_control(&self) -> Result<(), ControllerError> {
        lock(&self.state).snapshot.temperature_control = false;
        Ok(())
    }

    async fn emergency_stop(&self) -> Result<(), ControllerError> {
        tracing::error!("emergency stop engaged");
        let mut state = lock(&self.state);
        state.emergency_stopped = true;
        state.movements_stopped = true;
        state.snapshot.temperature_control = false;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LabController
// ---------------------------------------------------------------------------

impl LabController for SimulatedController {
    async fn home(&self) -> Result<(), ControllerError> {
        self.check("home")?;
        let mut state = lock(&self.state);
        state.snapshot.position = None;
        state.movements_stopped = false;
        Ok(())
    }

    async fn move_to_well(&self, target: &WellTarget) -> Result<(), ControllerError> {
        self.check("move_to_well")?;
        self.set_position(target);
        Ok(())
    }

    async fn pick_up_tip(&self, target: &WellTarget) -> Result<(), ControllerError> {
        self.check("pick_up_tip")?;
        let mut state = lock(&self.state);
        if let Some(loaded) = &state.snapshot.loaded_tip {
            tracing::warn!(loaded = %loaded, "tip still loaded, discarding it before pickup");
        }
        state.snapshot.loaded_tip = Some(target.location());
        state.snapshot.position = Some(target.location());
        Ok(())
    }

    async fn drop_tip(&self, target: &WellTarget, into_disposal: bool) -> Result<(), ControllerError> {
        self.check("drop_tip")?;
        let mut state = lock(&self.state);
        if state.snapshot.loaded_tip.take().is_none() {
            tracing::debug!("drop_tip with no tip loaded");
        }
        state.snapshot.position = Some(if into_disposal {
            "trash".to_string()
        } else {
            target.location()
        });
        Ok(())
    }

    async fn aspirate(&self, target: &WellTarget, volume: f64) -> Result<(), ControllerError> {
        self.check("aspirate")?;
        if lock(&self.state).snapshot.loaded_tip.is_none() {
            return Err(ControllerError::Liquid("aspirate without a tip".into()));
        }
        tracing::debug!(volume, source = %target.location(), "aspirate");
        self.set_position(target);
        Ok(())
    }

    async fn dispense(&self, target: &WellTarget, volume: f64) -> Result<(), ControllerError> {
        self.check("dispense")?;
        tracing::debug!(volume, target = %target.location(), "dispense");
        self.set_position(target);
        Ok(())
    }

    async fn delay(&self, seconds: f64, message: &str) -> Result<(), ControllerError> {
        self.check("delay")?;
        if !message.is_empty() {
            tracing::debug!(seconds, "{message}");
        }
        self.pause(seconds).await?;
        Ok(())
    }

    async fn next_tip_location(&self) -> Result<String, ControllerError> {
        self.check("next_tip_location")?;
        let mut state = lock(&self.state);
        let well = tip_well(state.snapshot.tip_counter)
            .ok_or_else(|| ControllerError::Liquid("tip rack exhausted".into()))?;
        state.snapshot.tip_counter += 1;
        Ok(well)
    }

    async fn run_measurement(&self, plan: &MeasurementPlan) -> Result<MeasurementSummary, ControllerError> {
        self.check("run_measurement")?;
        tracing::info!(
            kind = plan.kind.as_str(),
            duration_s = plan.duration_s,
            channel = plan.channel,
            port = %self.hardware.squidstat_port,
            "simulating measurement"
        );
        self.pause(plan.duration_s).await?;

        let mut state = lock(&self.state);
        if plan.kind.is_impedance() {
            state.data.ac_rows.extend(synthesize_ac());
        } else {
            state.data.dc_rows.extend(synthesize_dc(plan));
        }
        Ok(MeasurementSummary {
            dc_points: state.data.dc_rows.len(),
            ac_points: state.data.ac_rows.len(),
            simulated: true,
        })
    }

    async fn run_pump(&self, pump: u8, volume: f64) -> Result<(), ControllerError> {
        self.check("run_pump")?;
        tracing::debug!(pump, volume, port = %self.hardware.arduino_port, "pump");
        self.pause(1.0).await?;
        Ok(())
    }

    async fn run_ultrasonic(&self, millis: u64) -> Result<(), ControllerError> {
        self.check("run_ultrasonic")?;
        self.pause(millis as f64 / 1000.0).await?;
        Ok(())
    }

    async fn clear_experiment_data(&self) {
        lock(&self.state).data.clear();
    }

    async fn status(&self) -> Value {
        let state = lock(&self.state);
        json!({
            "mode": if self.hardware.dry_run { "dry_run" } else { "simulated" },
            "robot": format!("{}:{}", self.hardware.robot_ip, self.hardware.robot_port),
            "squidstat_port": self.hardware.squidstat_port,
            "squidstat_channel": self.hardware.squidstat_channel,
            "arduino_port": self.hardware.arduino_port,
            "position": state.snapshot.position,
            "tip_counter": state.snapshot.tip_counter,
            "loaded_tip": state.snapshot.loaded_tip,
            "error": state.error_latch,
            "movements_stopped": state.movements_stopped,
            "emergency_stopped": state.emergency_stopped,
            "dc_rows": state.data.dc_rows.len(),
            "ac_rows": state.data.ac_rows.len(),
        })
    }
}

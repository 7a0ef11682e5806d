//! Scripted controller double shared by core tests.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{Value, json};

use sdlab_types::experiment::{DcRow, ExperimentData, MeasurementPlan, MeasurementSummary};

use crate::controller::{ControllerError, LabController, RecoveryCapabilities, WellTarget, tip_well};

/// Records every call and fails operations on demand.
#[derive(Default)]
pub struct ScriptedController {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, (u32, ControllerError)>>,
    restored: Mutex<Vec<Value>>,
    data: Mutex<ExperimentData>,
    tip_counter: Mutex<u32>,
    fail_restore: Mutex<bool>,
}

impl ScriptedController {
    pub fn new() -> Self {
        Self {
            tip_counter: Mutex::new(1),
            ..Default::default()
        }
    }

    /// Make the next `times` calls of `operation` fail with `error`.
    pub fn fail_next(&self, operation: &str, times: u32, error: ControllerError) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), (times, error));
    }

    pub fn fail_restore(&self, fail: bool) {
        *self.fail_restore.lock().unwrap() = fail;
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    pub fn restored_states(&self) -> Vec<Value> {
        self.restored.lock().unwrap().clone()
    }

    fn call(&self, operation: &str) -> Result<(), ControllerError> {
        self.calls.lock().unwrap().push(operation.to_string());
        let mut failures = self.failures.lock().unwrap();
        if let Some((remaining, error)) = failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(error.clone());
            }
        }
        Ok(())
    }
}

impl RecoveryCapabilities for ScriptedController {
    async fn get_state(&self) -> Result<Value, ControllerError> {
        Ok(json!({ "tip_counter": *self.tip_counter.lock().unwrap() }))
    }

    async fn restore_state(&self, snapshot: &Value) -> Result<(), ControllerError> {
        self.call("restore_state")?;
        if *self.fail_restore.lock().unwrap() {
            return Err(ControllerError::InvalidState("scripted".into()));
        }
        self.restored.lock().unwrap().push(snapshot.clone());
        Ok(())
    }

    async fn experiment_data(&self) -> ExperimentData {
        self.data.lock().unwrap().clone()
    }

    async fn restore_experiment_data(&self, data: &ExperimentData) -> Result<(), ControllerError> {
        *self.data.lock().unwrap() = data.clone();
        Ok(())
    }

    async fn clear_error_state(&self) -> Result<(), ControllerError> {
        self.call("clear_error_state")
    }

    async fn stop_all_movements(&self) -> Result<(), ControllerError> {
        self.call("stop_all_movements")
    }

    async fn disable_temperature_control(&self) -> Result<(), ControllerError> {
        self.call("disable_temperature_control")
    }

    async fn emergency_stop(&self) -> Result<(), ControllerError> {
        self.call("emergency_stop")
    }
}

impl LabController for ScriptedController {
    async fn home(&self) -> Result<(), ControllerError> {
        self.call("home")
    }

    async fn move_to_well(&self, _target: &WellTarget) -> Result<(), ControllerError> {
        self.call("move_to_well")
    }

    async fn pick_up_tip(&self, _target: &WellTarget) -> Result<(), ControllerError> {
        self.call("pick_up_tip")
    }

    async fn drop_tip(&self, _target: &WellTarget, _into_disposal: bool) -> Result<(), ControllerError> {
        self.call("drop_tip")
    }

    async fn aspirate(&self, _target: &WellTarget, _volume: f64) -> Result<(), ControllerError> {
        self.call("aspirate")
    }

    async fn dispense(&self, _target: &WellTarget, _volume: f64) -> Result<(), ControllerError> {
        self.call("dispense")
    }

    async fn delay(&self, _seconds: f64, _message: &str) -> Result<(), ControllerError> {
        self.call("delay")
    }

    async fn next_tip_location(&self) -> Result<String, ControllerError> {
        self.call("next_tip_location")?;
        let mut counter = self.tip_counter.lock().unwrap();
        let well = tip_well(*counter).ok_or_else(|| ControllerError::Liquid("tip rack empty".into()))?;
        *counter += 1;
        Ok(well)
    }

    async fn run_measurement(&self, plan: &MeasurementPlan) -> Result<MeasurementSummary, ControllerError> {
        self.call("run_measurement")?;
        let mut data = self.data.lock().unwrap();
        data.dc_rows.push(DcRow {
            timestamp_s: plan.duration_s,
            current_a: -0.004,
            we_voltage_v: 0.1,
        });
        Ok(MeasurementSummary {
            dc_points: data.dc_rows.len(),
            ac_points: data.ac_rows.len(),
            simulated: true,
        })
    }

    async fn run_pump(&self, _pump: u8, _volume: f64) -> Result<(), ControllerError> {
        self.call("run_pump")
    }

    async fn run_ultrasonic(&self, _millis: u64) -> Result<(), ControllerError> {
        self.call("run_ultrasonic")
    }

    async fn clear_experiment_data(&self) {
        self.data.lock().unwrap().clear();
    }

    async fn status(&self) -> Value {
        json!({ "connected": true, "scripted": true })
    }
}

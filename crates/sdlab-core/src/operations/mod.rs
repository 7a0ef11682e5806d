//! Unit operations: the handlers behind each registered step type.
//!
//! Handlers read their parameters with defaults, drive the controller, and
//! return a JSON payload. Faults are classified here, where the context is
//! known: a failed aspirate inside solution preparation is a pipetting fault,
//! a failed move inside electrode setup is an electrode fault. Lost
//! communication and emergency-stop latches stay unclassified.

pub mod electrochem;
pub mod export;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};

use sdlab_types::fault::{FaultKind, LabFault, StepFault};
use sdlab_types::step::{OperationLogEntry, Params};

use crate::controller::{ControllerError, LabController, WellTarget};
use crate::engine::registry::OperationType;

pub const DEFAULT_PIPETTE: &str = "p1000_single_gen2";
pub const TIP_RACK: &str = "slot_1";
pub const REACTOR: &str = "slot_9";
pub const ELECTRODE_RACK: &str = "slot_10";

const ELECTRODE_TYPES: &[&str] = &["working", "counter", "reference"];

/// Seconds assumed per electrochemical cycle when estimating completion.
const AVERAGE_CYCLE_SECS: u64 = 720;

/// Map a deck alias to its slot. Unknown names pass through unchanged.
pub fn labware_slot(name: &str) -> &str {
    match name {
        "vial_rack_2" => "slot_2",
        "nis_reactor" => REACTOR,
        "electrode_rack" => ELECTRODE_RACK,
        "tip_rack" => TIP_RACK,
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Parameter helpers
// ---------------------------------------------------------------------------

pub(crate) fn str_param<'a>(params: &'a Params, key: &str, default: &'a str) -> &'a str {
    params.get(key).and_then(Value::as_str).unwrap_or(default)
}

pub(crate) fn f64_param(params: &Params, key: &str, default: f64) -> f64 {
    params.get(key).and_then(Value::as_f64).unwrap_or(default)
}

pub(crate) fn u64_param(params: &Params, key: &str, default: u64) -> u64 {
    match params.get(key) {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(default),
        None => default,
    }
}

pub(crate) fn bool_param(params: &Params, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn classify(kind: FaultKind, context: &str) -> impl Fn(ControllerError) -> StepFault + '_ {
    move |err| {
        if err.is_fatal() {
            StepFault::Unclassified(format!("{context}: {err}"))
        } else {
            LabFault::new(kind, format!("{context}: {err}")).into()
        }
    }
}

// ---------------------------------------------------------------------------
// UnitOperations
// ---------------------------------------------------------------------------

pub struct UnitOperations<C: LabController> {
    controller: Arc<C>,
    export_dir: PathBuf,
}

impl<C: LabController> UnitOperations<C> {
    pub fn new(controller: Arc<C>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            controller,
            export_dir: export_dir.into(),
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Run the handler for `op`.
    ///
    /// `operation_log` is only read by data export, which embeds it in the
    /// metadata file.
    pub async fn run(
        &self,
        op: OperationType,
        params: &Params,
        operation_log: &[OperationLogEntry],
    ) -> Result<Value, StepFault> {
        match op {
            OperationType::HomeRobot => self.home_robot().await,
            OperationType::MoveToWell => self.move_to_well(params).await,
            OperationType::PickupTip => self.pickup_tip(params).await,
            OperationType::DropTip => self.drop_tip(params).await,
            OperationType::Aspirate => self.aspirate(params).await,
            OperationType::Dispense => self.dispense(params).await,
            OperationType::Delay => self.delay(params).await,
            OperationType::GetStatus => Ok(self.controller.status().await),
            OperationType::ExperimentSetup => self.experiment_setup(params).await,
            OperationType::SolutionPreparation => self.solution_preparation(params).await,
            OperationType::ElectrodeSetup => self.electrode_setup(params).await,
            OperationType::ElectrochemicalMeasurement => {
                self.electrochemical_measurement(params).await
            }
            OperationType::WashCleaning => self.wash_cleaning(params).await,
            OperationType::DataExport => self.data_export(params, operation_log).await,
            OperationType::SequenceControl => Ok(sequence_control(params)),
            OperationType::CycleCounter => self.cycle_counter(params).await,
        }
    }

    // -----------------------------------------------------------------------
    // Primitives
    // -----------------------------------------------------------------------

    async fn home_robot(&self) -> Result<Value, StepFault> {
        self.controller.home().await?;
        Ok(json!({"status": "success", "operation": "robot_homed"}))
    }

    fn target(params: &Params) -> WellTarget {
        let mut target = WellTarget::new(
            labware_slot(str_param(params, "labware", REACTOR)),
            str_param(params, "well", "A1"),
            str_param(params, "pipette", DEFAULT_PIPETTE),
        )
        .offset(
            f64_param(params, "offset_x", 0.0),
            f64_param(params, "offset_y", 0.0),
            f64_param(params, "offset_z", 0.0),
        );
        if str_param(params, "offset_start", "bottom") == "top" {
            target = target.from_top();
        }
        if let Some(speed) = params.get("speed").and_then(Value::as_f64) {
            target = target.speed(speed);
        }
        target
    }

    async fn move_to_well(&self, params: &Params) -> Result<Value, StepFault> {
        let target = Self::target(params);
        self.controller.move_to_well(&target).await?;
        Ok(json!({"status": "success", "position": target.location()}))
    }

    async fn pickup_tip(&self, params: &Params) -> Result<Value, StepFault> {
        let mut target = Self::target(params);
        if !params.contains_key("well") {
            target.labware = TIP_RACK.to_string();
            target.well = self.controller.next_tip_location().await?;
        }
        self.controller.pick_up_tip(&target).await?;
        Ok(json!({"status": "success", "tip_location": target.location()}))
    }

    async fn drop_tip(&self, params: &Params) -> Result<Value, StepFault> {
        let target = Self::target(params);
        let into_disposal = bool_param(params, "drop_in_disposal", true);
        self.controller.drop_tip(&target, into_disposal).await?;
        Ok(json!({"status": "success", "operation": "tip_dropped"}))
    }

    async fn aspirate(&self, params: &Params) -> Result<Value, StepFault> {
        let target = Self::target(params);
        let volume = checked_volume(params)?;
        self.controller
            .aspirate(&target, volume)
            .await
            .map_err(classify(FaultKind::Pipetting, "aspirate failed"))?;
        Ok(json!({"status": "success", "volume": volume, "source": target.location()}))
    }

    async fn dispense(&self, params: &Params) -> Result<Value, StepFault> {
        let target = Self::target(params);
        let volume = checked_volume(params)?;
        self.controller
            .dispense(&target, volume)
            .await
            .map_err(classify(FaultKind::Pipetting, "dispense failed"))?;
        Ok(json!({"status": "success", "volume": volume, "target": target.location()}))
    }

    async fn delay(&self, params: &Params) -> Result<Value, StepFault> {
        let seconds = f64_param(params, "seconds", 1.0);
        let message = str_param(params, "message", "");
        self.controller.delay(seconds, message).await?;
        Ok(json!({"status": "success", "delay": seconds}))
    }

    // -----------------------------------------------------------------------
    // SDL1 unit operations
    // -----------------------------------------------------------------------

    async fn experiment_setup(&self, params: &Params) -> Result<Value, StepFault> {
        let experiment_id = str_param(params, "experiment_id", "Unknown_Experiment");
        let test_well = str_param(params, "test_well_address", "A1");

        let metadata = json!({
            "experiment_id": experiment_id,
            "test_well": test_well,
            "run_number": u64_param(params, "run_number", 1),
            "start_time": Utc::now().to_rfc3339(),
            "robot_ip": str_param(params, "robot_ip", "169.254.69.185"),
            "robot_port": u64_param(params, "robot_port", 80),
            "squidstat_port": str_param(params, "squidstat_port", "COM4"),
            "squidstat_channel": u64_param(params, "squidstat_channel", 0),
            "notes": str_param(params, "experiment_notes", ""),
        });

        let mut robot = "not_checked";
        let mut squidstat = "not_checked";
        if bool_param(params, "validate_hardware_connection", false) {
            self.controller.delay(2.0, "Validating robot connection").await?;
            robot = "connected";
            self.controller.delay(1.0, "Validating squidstat connection").await?;
            squidstat = "connected";
        }

        let mut well_status = "available";
        if bool_param(params, "verify_well_availability", true) {
            self.controller
                .delay(1.0, &format!("Verifying well {test_well} availability"))
                .await?;
            well_status = "verified_available";
        }

        let mut tip_status = "not_checked";
        if bool_param(params, "check_pipette_tips", false) {
            self.controller.delay(1.0, "Checking pipette tip availability").await?;
            tip_status = "sufficient_tips_available";
        }

        Ok(json!({
            "status": "success",
            "operation": "experiment_setup",
            "experiment_metadata": metadata,
            "hardware_status": {"robot": robot, "squidstat": squidstat},
            "well_status": well_status,
            "tip_status": tip_status,
            "message": format!("Experiment {experiment_id} setup completed successfully"),
        }))
    }

    /// Tip pickup, aspirate, dispense, tip drop.
    async fn solution_preparation(&self, params: &Params) -> Result<Value, StepFault> {
        let fault = classify(FaultKind::Pipetting, "Pipetting operation failed");
        let source = labware_slot(str_param(params, "source_labware", "vial_rack_2"));
        let source_well = str_param(params, "source_well", "A1");
        let target = labware_slot(str_param(params, "target_labware", "nis_reactor"));
        let target_well = str_param(params, "target_well", "A1");
        let pipette = str_param(params, "pipette_type", DEFAULT_PIPETTE);
        let volume = f64_param(params, "volume", 5000.0);
        if volume <= 0.0 {
            return Err(LabFault::pipetting(format!("Invalid volume: {volume}")).into());
        }

        let tip = self.controller.next_tip_location().await.map_err(&fault)?;
        let tip_target = WellTarget::new(TIP_RACK, &tip, pipette)
            .from_top()
            .offset(0.0, 1.0, 0.0)
            .speed(100.0);
        self.controller.move_to_well(&tip_target).await.map_err(&fault)?;
        self.controller.pick_up_tip(&tip_target).await.map_err(&fault)?;

        let source_target = WellTarget::new(source, source_well, pipette).offset(
            0.0,
            0.0,
            f64_param(params, "aspiration_offset_z", 8.0),
        );
        self.controller
            .aspirate(&source_target, volume)
            .await
            .map_err(&fault)?;

        let dest_target = WellTarget::new(target, target_well, pipette).offset(
            f64_param(params, "dispense_offset_x", -1.0),
            f64_param(params, "dispense_offset_y", 0.5),
            f64_param(params, "dispense_offset_z", 0.0),
        );
        self.controller
            .dispense(&dest_target, volume)
            .await
            .map_err(&fault)?;

        if let Err(e) = self.controller.drop_tip(&tip_target, true).await {
            if e.is_fatal() {
                return Err(fault(e));
            }
            tracing::warn!(error = %e, tip = %tip, "failed to drop tip cleanly");
        }

        Ok(json!({
            "status": "success",
            "volume_transferred": volume,
            "source": source_target.location(),
            "target": dest_target.location(),
            "tip_used": tip,
        }))
    }

    /// Validate the electrode, pick it up from the rack and insert it into
    /// the reactor well.
    async fn electrode_setup(&self, params: &Params) -> Result<Value, StepFault> {
        let fault = classify(FaultKind::Electrode, "Electrode setup failed");
        let electrode_type = str_param(params, "electrode_type", "working");
        if !ELECTRODE_TYPES.contains(&electrode_type) {
            return Err(LabFault::electrode(format!("Invalid electrode type: {electrode_type}")).into());
        }
        let surface_area = f64_param(params, "surface_area", 1.0);
        if surface_area <= 0.0 {
            return Err(LabFault::electrode(format!("Invalid surface area: {surface_area}")).into());
        }

        let position = str_param(params, "electrode_position", "A2");
        let target_well = str_param(params, "target_well", "A1");
        let depth = f64_param(params, "insertion_depth", 26.0);
        let dx = f64_param(params, "lateral_offset_x", 0.5);
        let dy = f64_param(params, "lateral_offset_y", 0.5);
        let speed = f64_param(params, "movement_speed", 50.0);
        let pipette = str_param(params, "pipette_type", DEFAULT_PIPETTE);

        let rack = WellTarget::new(ELECTRODE_RACK, position, pipette)
            .from_top()
            .offset(0.6, 0.5, 3.0)
            .speed(100.0);
        self.controller.move_to_well(&rack).await.map_err(&fault)?;
        self.controller.pick_up_tip(&rack).await.map_err(&fault)?;

        let approach = WellTarget::new(REACTOR, target_well, pipette)
            .from_top()
            .offset(dx, dy, 5.0)
            .speed(speed);
        self.controller.move_to_well(&approach).await.map_err(&fault)?;

        let inserted = approach.clone().offset(dx, dy, -depth);
        self.controller.move_to_well(&inserted).await.map_err(&fault)?;

        Ok(json!({
            "status": "success",
            "operation": "electrode_setup",
            "electrode_type": electrode_type,
            "material": str_param(params, "material", "platinum"),
            "surface_area": surface_area,
            "electrode_position": position,
            "target_well": target_well,
            "insertion_depth": depth,
            "final_position": inserted.location(),
        }))
    }

    async fn electrochemical_measurement(&self, params: &Params) -> Result<Value, StepFault> {
        let plan = electrochem::plan_measurement(params)?;
        let summary = self
            .controller
            .run_measurement(&plan)
            .await
            .map_err(classify(FaultKind::Electrochemical, "Measurement failed"))?;

        Ok(json!({
            "status": if summary.simulated { "simulated" } else { "success" },
            "operation": "electrochemical_measurement",
            "measurement_type": plan.kind.as_str(),
            "estimated_duration_s": plan.duration_s,
            "channel": plan.channel,
            "data_points": {
                "dc_count": summary.dc_points,
                "ac_count": summary.ac_points,
            },
            "data_collection_enabled": bool_param(params, "data_collection_enabled", true),
        }))
    }

    /// Park the electrode, run pump/ultrasonic cycles with the cleaning
    /// tool, then park the tool.
    async fn wash_cleaning(&self, params: &Params) -> Result<Value, StepFault> {
        let tool = str_param(params, "cleaning_tool_position", "B1");
        let electrode = str_param(params, "electrode_position", "A2");
        let target_well = str_param(params, "target_well", "A1");
        let pump1 = f64_param(params, "pump1_volume", 10.0);
        let pump2 = f64_param(params, "pump2_volume", 4.0);
        let final_wash = f64_param(params, "final_wash_volume", 10.0);
        let ultrasonic_ms = u64_param(params, "ultrasonic_time", 5000);
        let depth = f64_param(params, "insertion_depth", 57.0);
        let cycles = u64_param(params, "cleaning_cycles", 2);
        let pipette = str_param(params, "pipette_type", DEFAULT_PIPETTE);

        let park = |well: &str| {
            WellTarget::new(ELECTRODE_RACK, well, pipette)
                .from_top()
                .offset(0.6, 0.5, 0.0)
                .speed(50.0)
        };
        let release = |well: &str| WellTarget::new(ELECTRODE_RACK, well, pipette).offset(0.6, 0.5, 6.0);

        self.controller.move_to_well(&park(electrode)).await?;
        self.controller.drop_tip(&release(electrode), false).await?;

        self.controller.move_to_well(&park(tool)).await?;
        self.controller.pick_up_tip(&park(tool)).await?;

        let above = WellTarget::new(REACTOR, target_well, pipette)
            .from_top()
            .offset(0.5, 0.5, 5.0)
            .speed(50.0);
        self.controller.move_to_well(&above).await?;
        self.controller
            .move_to_well(&above.clone().offset(0.5, 0.5, -depth))
            .await?;

        for cycle in 0..cycles {
            tracing::debug!(cycle = cycle + 1, cycles, "cleaning cycle");
            self.controller.run_pump(2, pump2).await?;
            self.controller.run_pump(1, pump1).await?;
            self.controller.run_ultrasonic(ultrasonic_ms).await?;
            self.controller.run_pump(2, final_wash).await?;
        }

        self.controller.move_to_well(&park(tool)).await?;
        self.controller.drop_tip(&release(tool), false).await?;

        Ok(json!({
            "status": "success",
            "operation": "wash_cleaning",
            "cleaning_status": "completed",
            "cycles_completed": cycles,
            "cleaning_tool": tool,
            "target_well": target_well,
        }))
    }

    async fn data_export(
        &self,
        params: &Params,
        operation_log: &[OperationLogEntry],
    ) -> Result<Value, StepFault> {
        let data = self.controller.experiment_data().await;
        export::export_experiment_data(&self.export_dir, params, &data, operation_log)
            .await
            .map_err(|e| StepFault::Unclassified(e.to_string()))
    }

    async fn cycle_counter(&self, params: &Params) -> Result<Value, StepFault> {
        let current = u64_param(params, "current_cycle", 1);
        let total = u64_param(params, "total_cycles", 1);
        let progress = if total > 0 {
            ((current as f64 / total as f64) * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };
        let remaining = total.saturating_sub(current);

        if bool_param(params, "display_enabled", true) {
            self.controller
                .delay(
                    f64_param(params, "update_interval", 1.0),
                    &format!("Monitoring cycle {current}/{total}"),
                )
                .await?;
        }

        Ok(json!({
            "status": "success",
            "operation": "cycle_counter",
            "cycle_statistics": {
                "current_cycle": current,
                "total_cycles": total,
                "progress_percentage": progress,
                "remaining_cycles": remaining,
                "cycle_type": str_param(params, "cycle_type", "electrochemical"),
                "status": if current <= total { "active" } else { "completed" },
            },
            "performance_metrics": {
                "average_cycle_time": AVERAGE_CYCLE_SECS,
                "estimated_completion_time": remaining * AVERAGE_CYCLE_SECS,
            },
        }))
    }
}

fn checked_volume(params: &Params) -> Result<f64, StepFault> {
    let volume = f64_param(params, "volume", 0.0);
    if volume <= 0.0 {
        return Err(LabFault::pipetting(format!("Invalid volume: {volume}")).into());
    }
    Ok(volume)
}

/// Configuration node; loops are expanded by whoever builds the step list.
fn sequence_control(params: &Params) -> Value {
    json!({
        "status": "success",
        "operation": "sequence_control",
        "loop_type": str_param(params, "loop_type", "fixed_count"),
        "configured_loops": u64_param(params, "loop_count", 1),
        "condition": str_param(params, "loop_condition", "none"),
        "break_condition": str_param(params, "break_condition", ""),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedController;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    fn ops() -> (Arc<ScriptedController>, UnitOperations<ScriptedController>) {
        let controller = Arc::new(ScriptedController::new());
        (controller.clone(), UnitOperations::new(controller, "unused"))
    }

    #[test]
    fn labware_aliases_map_to_slots() {
        assert_eq!(labware_slot("vial_rack_2"), "slot_2");
        assert_eq!(labware_slot("nis_reactor"), "slot_9");
        assert_eq!(labware_slot("electrode_rack"), "slot_10");
        assert_eq!(labware_slot("tip_rack"), "slot_1");
        assert_eq!(labware_slot("slot_4"), "slot_4");
    }

    #[test]
    fn integer_params_accept_floats() {
        let p = params(json!({"a": 3.0, "b": -1, "c": "x"}));
        assert_eq!(u64_param(&p, "a", 0), 3);
        assert_eq!(u64_param(&p, "b", 7), 7);
        assert_eq!(u64_param(&p, "c", 9), 9);
        assert_eq!(u64_param(&p, "missing", 2), 2);
    }

    #[tokio::test]
    async fn solution_preparation_transfers_with_fresh_tip() {
        let (controller, ops) = ops();
        let result = ops
            .run(
                OperationType::SolutionPreparation,
                &params(json!({"volume": 500, "source_well": "B2"})),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(result["volume_transferred"], 500.0);
        assert_eq!(result["source"], "slot_2:B2");
        assert_eq!(result["target"], "slot_9:A1");
        assert_eq!(result["tip_used"], "A1");
        assert_eq!(controller.count("aspirate"), 1);
        assert_eq!(controller.count("dispense"), 1);
        assert_eq!(controller.count("drop_tip"), 1);
    }

    #[tokio::test]
    async fn non_positive_volume_is_a_pipetting_fault() {
        let (controller, ops) = ops();
        let err = ops
            .run(OperationType::SolutionPreparation, &params(json!({"volume": 0})), &[])
            .await
            .unwrap_err();
        match err {
            StepFault::Classified(fault) => assert_eq!(fault.kind, FaultKind::Pipetting),
            other => panic!("expected pipetting fault, got {other:?}"),
        }
        assert_eq!(controller.count("next_tip_location"), 0);
    }

    #[tokio::test]
    async fn controller_errors_take_the_operation_kind() {
        let (controller, ops) = ops();
        controller.fail_next("aspirate", 1, ControllerError::Liquid("clot".into()));
        let err = ops
            .run(OperationType::SolutionPreparation, &params(json!({"volume": 100})), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StepFault::Classified(ref f) if f.kind == FaultKind::Pipetting));

        controller.fail_next("aspirate", 1, ControllerError::Communication("robot offline".into()));
        let err = ops
            .run(OperationType::SolutionPreparation, &params(json!({"volume": 100})), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StepFault::Unclassified(_)));
    }

    #[tokio::test]
    async fn drop_tip_failure_only_warns() {
        let (controller, ops) = ops();
        controller.fail_next("drop_tip", 1, ControllerError::Motion("tip stuck".into()));
        let result = ops
            .run(OperationType::SolutionPreparation, &params(json!({"volume": 100})), &[])
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn electrode_setup_validates_type_and_area() {
        let (_, ops) = ops();
        let err = ops
            .run(
                OperationType::ElectrodeSetup,
                &params(json!({"electrode_type": "auxiliary"})),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StepFault::Classified(ref f) if f.kind == FaultKind::Electrode));

        let err = ops
            .run(
                OperationType::ElectrodeSetup,
                &params(json!({"surface_area": -1.0})),
                &[],
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid surface area"));
    }

    #[tokio::test]
    async fn electrode_setup_inserts_to_depth() {
        let (controller, ops) = ops();
        let result = ops
            .run(
                OperationType::ElectrodeSetup,
                &params(json!({"insertion_depth": 20, "target_well": "B3"})),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(result["final_position"], "slot_9:B3");
        assert_eq!(result["insertion_depth"], 20.0);
        assert_eq!(controller.count("move_to_well"), 3);
        assert_eq!(controller.count("pick_up_tip"), 1);
    }

    #[tokio::test]
    async fn measurement_records_data_points() {
        let (_, ops) = ops();
        let result = ops
            .run(
                OperationType::ElectrochemicalMeasurement,
                &params(json!({"measurement_type": "OCV", "ocv_duration": 30})),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(result["status"], "simulated");
        assert_eq!(result["measurement_type"], "OCV");
        assert_eq!(result["estimated_duration_s"], 30.0);
        assert_eq!(result["data_points"]["dc_count"], 1);
    }

    #[tokio::test]
    async fn wash_cleaning_runs_each_cycle() {
        let (controller, ops) = ops();
        let result = ops
            .run(
                OperationType::WashCleaning,
                &params(json!({"cleaning_cycles": 3})),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(result["cycles_completed"], 3);
        assert_eq!(controller.count("run_pump"), 9);
        assert_eq!(controller.count("run_ultrasonic"), 3);
        assert_eq!(controller.count("drop_tip"), 2);
    }

    #[tokio::test]
    async fn cycle_counter_reports_progress() {
        let (_, ops) = ops();
        let result = ops
            .run(
                OperationType::CycleCounter,
                &params(json!({"current_cycle": 1, "total_cycles": 3, "display_enabled": false})),
                &[],
            )
            .await
            .unwrap();
        let stats = &result["cycle_statistics"];
        assert_eq!(stats["progress_percentage"], 33.33);
        assert_eq!(stats["remaining_cycles"], 2);
        assert_eq!(stats["status"], "active");
        assert_eq!(result["performance_metrics"]["estimated_completion_time"], 1440);
    }

    #[tokio::test]
    async fn sequence_control_echoes_configuration() {
        let (_, ops) = ops();
        let result = ops
            .run(
                OperationType::SequenceControl,
                &params(json!({"loop_count": 4})),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(result["configured_loops"], 4);
        assert_eq!(result["loop_type"], "fixed_count");
    }

    #[tokio::test]
    async fn pickup_tip_without_well_uses_tip_rack() {
        let (_, ops) = ops();
        let first = ops
            .run(OperationType::PickupTip, &Params::new(), &[])
            .await
            .unwrap();
        let second = ops
            .run(OperationType::PickupTip, &Params::new(), &[])
            .await
            .unwrap();
        assert_eq!(first["tip_location"], "slot_1:A1");
        assert_eq!(second["tip_location"], "slot_1:A2");
    }
}

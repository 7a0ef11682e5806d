//! Execution engine: dispatches steps in declared order and folds their
//! results into a workflow summary.
//!
//! # Execution flow
//!
//! 1. Start a run: fresh logs, checkpoints, statistics and experiment data.
//! 2. For each step, resolve its type through the registry and run the
//!    handler. Recoverable operations run under the recovery manager.
//! 3. Every dispatch yields exactly one `StepResult`; faults never escape.
//! 4. Stop early when a failing step asks for `error_handling = "stop"` or
//!    when recovery halted the hardware.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use sdlab_types::config::GlobalConfig;
use sdlab_types::fault::StepFault;
use sdlab_types::recovery::RecoveryReport;
use sdlab_types::step::{
    ErrorHandling, FailedNode, Params, Step, StepResult, StepStatus, ValidationReport,
    WorkflowDocument, WorkflowEnvelope, WorkflowStatus, WorkflowSummary,
};

use super::registry::{OperationRegistry, OperationType};
use super::run::{WorkflowRun, operation_entry};
use crate::controller::LabController;
use crate::operations::UnitOperations;
use crate::recovery::manager::{RecoveryManager, RecoveryRequest};
use crate::repository::checkpoint::CheckpointRepository;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub recovery_enabled: bool,
    /// Default attempt budget; a step's `max_retries` parameter overrides it.
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Default directory for data export.
    pub export_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recovery_enabled: true,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            export_dir: PathBuf::from("data"),
        }
    }
}

impl EngineConfig {
    pub fn from_global(config: &GlobalConfig, data_dir: &Path) -> Self {
        Self {
            recovery_enabled: config.recovery.enabled,
            max_retries: config.recovery.max_retries,
            retry_delay: Duration::from_millis(config.recovery.retry_delay_ms),
            export_dir: config
                .export
                .data_dir
                .clone()
                .unwrap_or_else(|| data_dir.join("data")),
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionEngine
// ---------------------------------------------------------------------------

struct Dispatched {
    result: StepResult,
    /// Recovery stopped the hardware; nothing else may run.
    halted: bool,
}

impl Dispatched {
    fn done(result: StepResult) -> Self {
        Self {
            result,
            halted: false,
        }
    }
}

/// Sequential step dispatcher. One engine drives one controller; runs on
/// the same engine reuse it and reset all per-run state.
pub struct ExecutionEngine<C, R>
where
    C: LabController,
    R: CheckpointRepository,
{
    controller: Arc<C>,
    registry: OperationRegistry,
    operations: UnitOperations<C>,
    recovery: RecoveryManager<C, R>,
    config: EngineConfig,
    run: WorkflowRun,
}

impl<C, R> ExecutionEngine<C, R>
where
    C: LabController,
    R: CheckpointRepository,
{
    pub fn new(controller: Arc<C>, repo: R, config: EngineConfig) -> Self {
        Self {
            registry: OperationRegistry::new(),
            operations: UnitOperations::new(controller.clone(), config.export_dir.clone()),
            recovery: RecoveryManager::new(controller.clone(), repo, config.retry_delay),
            controller,
            config,
            run: WorkflowRun::start(""),
        }
    }

    pub fn controller(&self) -> &Arc<C> {
        &self.controller
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn recovery(&self) -> &RecoveryManager<C, R> {
        &self.recovery
    }

    pub fn recovery_mut(&mut self) -> &mut RecoveryManager<C, R> {
        &mut self.recovery
    }

    pub fn run(&self) -> &WorkflowRun {
        &self.run
    }

    pub fn supported_operations(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    pub fn validate_workflow(&self, steps: &[Step]) -> ValidationReport {
        self.registry.validate(steps)
    }

    pub fn recovery_statistics(&self) -> RecoveryReport {
        self.recovery.statistics()
    }

    /// Begin a new run, generating an id when none is given.
    pub async fn start_run(&mut self, workflow_id: Option<String>) -> String {
        let workflow_id =
            workflow_id.unwrap_or_else(|| format!("wf_{}", Uuid::now_v7().simple()));
        self.run = WorkflowRun::start(workflow_id.clone());
        self.recovery.start_workflow(workflow_id.clone());
        self.controller.clear_experiment_data().await;
        workflow_id
    }

    /// Dispatch one step. Always yields a result.
    pub async fn execute_step(&mut self, index: usize, step: &Step) -> StepResult {
        self.dispatch(index, step).await.result
    }

    /// Run `steps` as a new workflow.
    pub async fn execute_workflow(&mut self, steps: &[Step]) -> WorkflowSummary {
        self.run_workflow(None, steps).await
    }

    pub async fn run_workflow(
        &mut self,
        workflow_id: Option<String>,
        steps: &[Step],
    ) -> WorkflowSummary {
        let workflow_id = self.start_run(workflow_id).await;
        tracing::info!(workflow_id = %workflow_id, total_nodes = steps.len(), "workflow started");

        let mut results = Vec::with_capacity(steps.len());
        let mut failed_nodes = Vec::new();
        let mut aborted_at = None;

        for (index, step) in steps.iter().enumerate() {
            let span = info_span!(
                "step",
                workflow_id = %workflow_id,
                step_index = index,
                node_type = %step.step_type
            );
            let Dispatched { result, halted } = self.dispatch(index, step).instrument(span).await;

            let failed = result.is_error();
            if failed {
                failed_nodes.push(FailedNode {
                    index,
                    node_id: result.node_id.clone(),
                    node_type: result.node_type.clone(),
                    error: result.message.clone().unwrap_or_default(),
                });
            }
            results.push(result);

            if halted {
                tracing::error!(step_index = index, "hardware halted, aborting workflow");
                aborted_at = Some(index);
                break;
            }
            if failed && step.error_handling() == ErrorHandling::Stop {
                tracing::warn!(step_index = index, "step failed with stop policy, aborting workflow");
                aborted_at = Some(index);
                break;
            }
        }

        let executed_nodes = results.len();
        let status = if failed_nodes.is_empty() {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::CompletedWithErrors
        };
        tracing::info!(
            workflow_id = %workflow_id,
            status = %status,
            executed_nodes,
            failed = failed_nodes.len(),
            "workflow finished"
        );

        WorkflowSummary {
            status,
            workflow_id,
            total_nodes: steps.len(),
            executed_nodes,
            successful_nodes: executed_nodes - failed_nodes.len(),
            failed_nodes,
            results,
            execution_log: self.run.execution_log.clone(),
            operation_log: self.run.operation_log.clone(),
            aborted_at,
            workflow_name: None,
            metadata: None,
        }
    }

    /// Run an envelope document and merge its metadata into the summary.
    /// `workflow_id` wins over the envelope's own id.
    pub async fn execute_envelope(
        &mut self,
        envelope: &WorkflowEnvelope,
        workflow_id: Option<String>,
    ) -> WorkflowSummary {
        let workflow_id = workflow_id.or_else(|| envelope.metadata.id.clone());
        let mut summary = self.run_workflow(workflow_id, &envelope.workflow.nodes).await;

        let mut metadata = envelope.metadata.extra.clone();
        if let Some(id) = &envelope.metadata.id {
            metadata.insert("id".to_string(), json!(id));
        }
        if let Some(name) = &envelope.metadata.name {
            metadata.insert("name".to_string(), json!(name));
        }
        summary.workflow_name = envelope.metadata.name.clone();
        summary.metadata = Some(metadata);
        summary
    }

    pub async fn execute_document(
        &mut self,
        document: &WorkflowDocument,
        workflow_id: Option<String>,
    ) -> WorkflowSummary {
        match document {
            WorkflowDocument::Envelope(envelope) => {
                self.execute_envelope(envelope, workflow_id).await
            }
            other => self.run_workflow(workflow_id, other.steps()).await,
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    async fn dispatch(&mut self, index: usize, step: &Step) -> Dispatched {
        let node_id = step.node_id(index);
        self.run
            .record_dispatch(&node_id, &step.step_type, &step.parameters);

        let Some(op) = self.registry.resolve(&step.step_type) else {
            tracing::warn!(node_id = %node_id, node_type = %step.step_type, "unknown node type");
            return Dispatched::done(failure(
                index,
                node_id,
                &step.step_type,
                format!("Unknown node type: {}", step.step_type),
                None,
            ));
        };

        let Self {
            operations,
            recovery,
            config,
            run,
            ..
        } = self;
        let params = &step.parameters;

        if config.recovery_enabled && op.is_recoverable() {
            let request = RecoveryRequest {
                step_name: op.as_str(),
                step_index: index,
                checkpoint: op.completion_checkpoint(),
                max_retries: retry_budget(params, config.max_retries),
            };

            let invocations = Mutex::new(Vec::new());
            let outcome = {
                let operations = &*operations;
                let history = run.operation_log.as_slice();
                let log = &invocations;
                recovery
                    .run_with_recovery(request, move || async move {
                        let outcome = operations.run(op, params, history).await;
                        log.lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(operation_entry(op.as_str(), params, &outcome));
                        outcome
                    })
                    .await
            };
            run.operation_log
                .extend(invocations.into_inner().unwrap_or_else(PoisonError::into_inner));

            return match outcome {
                Ok(recovered) => Dispatched::done(success(
                    index,
                    node_id,
                    op,
                    recovered.value,
                    Some(recovered.attempts),
                )),
                Err(escalation) => {
                    tracing::error!(
                        node_id = %node_id,
                        cause = %escalation.cause,
                        attempts = escalation.attempts,
                        error = %escalation.fault,
                        "recovery escalated"
                    );
                    Dispatched {
                        halted: escalation.cause.halts_hardware(),
                        result: failure(
                            index,
                            node_id,
                            op.as_str(),
                            escalation.to_string(),
                            Some(escalation.attempts),
                        ),
                    }
                }
            };
        }

        let outcome = operations.run(op, params, &run.operation_log).await;
        run.record_operation(operation_entry(op.as_str(), params, &outcome));

        match outcome {
            Ok(value) => {
                if config.recovery_enabled {
                    if let Some(name) = op.completion_checkpoint() {
                        recovery
                            .checkpoint_step(name, op.as_str(), index, &value)
                            .await;
                    }
                }
                Dispatched::done(success(index, node_id, op, value, None))
            }
            Err(StepFault::Unclassified(message)) if config.recovery_enabled => {
                let escalation = recovery
                    .escalate_unclassified(op.as_str(), index, &message)
                    .await;
                tracing::error!(node_id = %node_id, error = %escalation.fault, "step escalated");
                Dispatched {
                    halted: escalation.cause.halts_hardware(),
                    result: failure(index, node_id, op.as_str(), escalation.to_string(), None),
                }
            }
            Err(fault) => {
                tracing::warn!(node_id = %node_id, error = %fault, "step failed");
                Dispatched::done(failure(index, node_id, op.as_str(), fault.to_string(), None))
            }
        }
    }
}

/// Upper bound on attempts for a single step, whatever the configuration asks for.
pub const MAX_STEP_RETRIES: u32 = 10;

/// The step's `max_retries` parameter, else `default`, capped at
/// [`MAX_STEP_RETRIES`].
fn retry_budget(params: &Params, default: u32) -> u32 {
    let requested = params
        .get("max_retries")
        .and_then(Value::as_u64)
        .unwrap_or(u64::from(default));
    if requested > u64::from(MAX_STEP_RETRIES) {
        tracing::warn!(requested, cap = MAX_STEP_RETRIES, "max_retries capped");
        return MAX_STEP_RETRIES;
    }
    requested as u32
}

fn success(
    index: usize,
    node_id: String,
    op: OperationType,
    value: Value,
    attempts: Option<u32>,
) -> StepResult {
    let payload = match value {
        Value::Object(map) => map,
        other => {
            let mut map = Params::new();
            map.insert("result".to_string(), other);
            map
        }
    };
    StepResult {
        status: StepStatus::Success,
        node_index: index,
        node_id,
        node_type: op.as_str().to_string(),
        payload,
        message: None,
        attempts,
    }
}

fn failure(
    index: usize,
    node_id: String,
    node_type: &str,
    message: String,
    attempts: Option<u32>,
) -> StepResult {
    StepResult {
        status: StepStatus::Error,
        node_index: index,
        node_id,
        node_type: node_type.to_string(),
        payload: Params::new(),
        message: Some(message),
        attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerError;
    use crate::repository::checkpoint::MemoryCheckpointRepository;
    use crate::test_support::ScriptedController;
    use sdlab_types::step::{EnvelopeMetadata, StepList};

    type Engine = ExecutionEngine<ScriptedController, MemoryCheckpointRepository>;

    fn engine_with(recovery_enabled: bool) -> (Arc<ScriptedController>, Engine) {
        let controller = Arc::new(ScriptedController::new());
        let config = EngineConfig {
            recovery_enabled,
            max_retries: 3,
            retry_delay: Duration::ZERO,
            export_dir: PathBuf::from("unused"),
        };
        let engine = ExecutionEngine::new(
            controller.clone(),
            MemoryCheckpointRepository::new(),
            config,
        );
        (controller, engine)
    }

    fn engine() -> (Arc<ScriptedController>, Engine) {
        engine_with(true)
    }

    fn step(id: &str, step_type: &str, params: Value) -> Step {
        Step::new(id, step_type, params.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn unknown_type_is_an_error_result_not_an_abort() {
        let (_, mut engine) = engine();
        let summary = engine
            .execute_workflow(&[
                step("a", "sdl1Teleport", json!({})),
                step("b", "home_robot", json!({})),
            ])
            .await;

        assert_eq!(summary.executed_nodes, 2);
        assert_eq!(summary.successful_nodes, 1);
        assert_eq!(summary.status, WorkflowStatus::CompletedWithErrors);
        assert_eq!(
            summary.results[0].message.as_deref(),
            Some("Unknown node type: sdl1Teleport")
        );
        assert_eq!(summary.failed_nodes[0].index, 0);
        assert_eq!(summary.failed_nodes[0].node_id, "a");
    }

    #[tokio::test]
    async fn stop_policy_halts_remaining_steps() {
        let (_, mut engine) = engine();
        let summary = engine
            .execute_workflow(&[
                step("a", "aspirate", json!({"volume": 0, "error_handling": "stop"})),
                step("b", "home_robot", json!({})),
            ])
            .await;
        assert_eq!(summary.total_nodes, 2);
        assert_eq!(summary.executed_nodes, 1);
        assert_eq!(summary.aborted_at, Some(0));
    }

    #[tokio::test]
    async fn continue_policy_runs_every_step() {
        let (_, mut engine) = engine();
        let summary = engine
            .execute_workflow(&[
                step("a", "aspirate", json!({"volume": 0})),
                step("b", "dispense", json!({"volume": -1, "error_handling": "continue"})),
                step("c", "home_robot", json!({})),
            ])
            .await;
        assert_eq!(summary.executed_nodes, 3);
        assert_eq!(summary.successful_nodes, 1);
        assert_eq!(summary.failed_nodes.len(), 2);
        assert_eq!(summary.aborted_at, None);
        assert_eq!(summary.execution_log.len(), 3);
    }

    #[tokio::test]
    async fn transient_pipetting_fault_recovers_within_budget() {
        let (controller, mut engine) = engine();
        controller.fail_next("aspirate", 2, ControllerError::Liquid("bubble".into()));

        let summary = engine
            .execute_workflow(&[
                step("a", "sdl1ExperimentSetup", json!({"experiment_id": "NiS_01"})),
                step("b", "sdl1SolutionPreparation", json!({"volume": 500, "max_retries": 3})),
                step("c", "sdl1CycleCounter", json!({"display_enabled": false})),
            ])
            .await;

        assert_eq!(summary.status, WorkflowStatus::Completed);
        assert_eq!(summary.successful_nodes, 3);
        assert!(summary.failed_nodes.is_empty());
        assert_eq!(summary.results[1].attempts, Some(3));
        assert_eq!(controller.count("aspirate"), 3);
        assert_eq!(controller.count("clear_error_state"), 2);

        // one operation-log entry per handler invocation
        let prep_calls = summary
            .operation_log
            .iter()
            .filter(|e| e.operation == "sdl1SolutionPreparation")
            .count();
        assert_eq!(prep_calls, 3);

        let stats = engine.recovery_statistics();
        assert_eq!(stats.stats.total_errors, 2);
        assert_eq!(stats.total_checkpoints, 2);
    }

    #[tokio::test]
    async fn unclassified_fault_aborts_regardless_of_policy() {
        let (controller, mut engine) = engine();
        controller.fail_next("aspirate", 1, ControllerError::Communication("robot offline".into()));

        let summary = engine
            .execute_workflow(&[
                step("a", "sdl1SolutionPreparation", json!({"volume": 500, "error_handling": "continue"})),
                step("b", "home_robot", json!({})),
            ])
            .await;

        assert_eq!(summary.executed_nodes, 1);
        assert_eq!(summary.aborted_at, Some(0));
        assert_eq!(summary.status, WorkflowStatus::CompletedWithErrors);
        assert!(summary.failed_nodes[0].error.contains("critical system"));
        assert_eq!(engine.recovery_statistics().stats.total_errors, 1);
        assert_eq!(engine.recovery().store().repo().dumps().len(), 1);
        assert_eq!(controller.count("stop_all_movements"), 1);
        assert_eq!(controller.count("home"), 0);
    }

    #[tokio::test]
    async fn unclassified_fault_in_plain_step_halts_the_run() {
        let (controller, mut engine) = engine();
        controller.fail_next("home", 1, ControllerError::Communication("robot offline".into()));

        let summary = engine
            .execute_workflow(&[
                step("a", "home_robot", json!({"error_handling": "continue"})),
                step("b", "get_status", json!({})),
            ])
            .await;

        assert_eq!(summary.executed_nodes, 1);
        assert_eq!(summary.aborted_at, Some(0));
        assert!(summary.failed_nodes[0].error.contains("critical system"));
        assert_eq!(summary.results[0].attempts, None);
        assert_eq!(engine.recovery_statistics().stats.total_errors, 1);
        assert_eq!(engine.recovery().store().repo().dumps().len(), 1);
        assert_eq!(controller.count("stop_all_movements"), 1);
    }

    #[tokio::test]
    async fn unclassified_fault_without_recovery_only_fails_the_step() {
        let (controller, mut engine) = engine_with(false);
        controller.fail_next("home", 1, ControllerError::Communication("robot offline".into()));

        let summary = engine
            .execute_workflow(&[
                step("a", "home_robot", json!({})),
                step("b", "get_status", json!({})),
            ])
            .await;

        assert_eq!(summary.executed_nodes, 2);
        assert_eq!(summary.aborted_at, None);
        assert_eq!(controller.count("stop_all_movements"), 0);
    }

    #[test]
    fn retry_budget_is_capped() {
        let params = |v: Value| v.as_object().cloned().unwrap_or_default();
        assert_eq!(retry_budget(&Params::new(), 3), 3);
        assert_eq!(retry_budget(&params(json!({"max_retries": 0})), 3), 0);
        assert_eq!(retry_budget(&params(json!({"max_retries": 5})), 3), 5);
        assert_eq!(
            retry_budget(&params(json!({"max_retries": 4_294_967_296u64})), 3),
            MAX_STEP_RETRIES
        );
        assert_eq!(retry_budget(&Params::new(), u32::MAX), MAX_STEP_RETRIES);
    }

    #[tokio::test]
    async fn oversized_step_budget_stops_after_the_cap() {
        let (controller, mut engine) = engine();
        controller.fail_next("aspirate", 1_000, ControllerError::Liquid("clot".into()));

        let summary = engine
            .execute_workflow(&[step(
                "a",
                "sdl1SolutionPreparation",
                json!({"volume": 500, "max_retries": 1_000_000_000_000u64}),
            )])
            .await;

        assert!(summary.results[0].is_error());
        assert_eq!(controller.count("aspirate"), MAX_STEP_RETRIES as usize + 1);
    }

    #[tokio::test]
    async fn electrode_fault_rolls_back_to_previous_checkpoint() {
        let (controller, mut engine) = engine();
        let steps = [
            step("prep", "sdl1SolutionPreparation", json!({"volume": 500})),
            step("electrode", "sdl1ElectrodeSetup", json!({})),
        ];
        engine.start_run(Some("wf_rollback".into())).await;
        let prep = engine.execute_step(0, &steps[0]).await;
        assert!(!prep.is_error());

        controller.fail_next("move_to_well", 2, ControllerError::Motion("stall".into()));
        let electrode = engine.execute_step(1, &steps[1]).await;
        assert!(!electrode.is_error(), "{electrode:?}");
        assert_eq!(electrode.attempts, Some(3));

        let stats = engine.recovery_statistics();
        assert_eq!(stats.stats.successful_recoveries, 1);
        assert_eq!(stats.success_rate, 100.0);
        assert_eq!(stats.workflow_id.as_deref(), Some("wf_rollback"));
        assert_eq!(controller.restored_states().len(), 1);
    }

    #[tokio::test]
    async fn step_budget_override_applies() {
        let (controller, mut engine) = engine();
        controller.fail_next("aspirate", 1, ControllerError::Liquid("clot".into()));

        let summary = engine
            .execute_workflow(&[
                step("a", "sdl1SolutionPreparation", json!({"volume": 500, "max_retries": 0})),
                step("b", "home_robot", json!({})),
            ])
            .await;

        // no retry budget and no prior checkpoint: escalates without halting
        assert_eq!(summary.results[0].attempts, Some(1));
        assert!(summary.results[0].is_error());
        assert_eq!(summary.executed_nodes, 2);
        assert_eq!(engine.recovery_statistics().stats.failed_recoveries, 1);
    }

    #[tokio::test]
    async fn recovery_disabled_runs_handlers_once() {
        let (controller, mut engine) = engine_with(false);
        controller.fail_next("aspirate", 1, ControllerError::Liquid("clot".into()));

        let summary = engine
            .execute_workflow(&[step("a", "sdl1SolutionPreparation", json!({"volume": 500}))])
            .await;

        assert!(summary.results[0].is_error());
        assert_eq!(summary.results[0].attempts, None);
        assert_eq!(controller.count("aspirate"), 1);
        assert_eq!(engine.recovery_statistics().total_checkpoints, 0);
    }

    #[tokio::test]
    async fn new_run_resets_logs_and_experiment_data() {
        let (controller, mut engine) = engine();
        let measure = [step("m", "sdl1ElectrochemicalMeasurement", json!({"measurement_type": "OCV"}))];

        let first = engine.execute_workflow(&measure).await;
        assert_eq!(first.results[0].payload["data_points"]["dc_count"], 1);

        let second = engine.execute_workflow(&measure).await;
        assert_eq!(second.results[0].payload["data_points"]["dc_count"], 1);
        assert_eq!(second.execution_log.len(), 1);
        assert_ne!(first.workflow_id, second.workflow_id);
        assert_eq!(engine.recovery_statistics().total_checkpoints, 1);
        assert_eq!(controller.count("run_measurement"), 2);
    }

    #[tokio::test]
    async fn envelope_metadata_is_merged_into_summary() {
        let (_, mut engine) = engine();
        let mut extra = Params::new();
        extra.insert("operator".to_string(), json!("lab"));
        let envelope = WorkflowEnvelope {
            metadata: EnvelopeMetadata {
                id: Some("wf_nis_01".to_string()),
                name: Some("NiS deposition".to_string()),
                extra,
            },
            workflow: StepList {
                nodes: vec![step("a", "home_robot", json!({}))],
            },
        };

        let summary = engine
            .execute_document(&WorkflowDocument::Envelope(envelope), None)
            .await;
        assert_eq!(summary.workflow_id, "wf_nis_01");
        assert_eq!(summary.workflow_name.as_deref(), Some("NiS deposition"));
        let metadata = summary.metadata.unwrap();
        assert_eq!(metadata["operator"], "lab");
        assert_eq!(metadata["name"], "NiS deposition");
    }

    #[tokio::test]
    async fn blank_ids_and_non_object_payloads() {
        let (_, mut engine) = engine();
        let result = engine.execute_step(4, &step("", "home_robot", json!({}))).await;
        assert_eq!(result.node_id, "node_4");
        assert_eq!(result.node_index, 4);
        assert_eq!(result.payload["operation"], "robot_homed");
    }

    #[test]
    fn config_from_global_fills_export_dir() {
        let config = EngineConfig::from_global(&GlobalConfig::default(), Path::new("/tmp/sdlab"));
        assert!(config.recovery_enabled);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(2_000));
        assert_eq!(config.export_dir, PathBuf::from("/tmp/sdlab/data"));
    }
}

//! Recovery manager: runs one step function under a bounded
//! retry / restart / stop policy.
//!
//! Attempt `i` runs in `0..=max_retries`. A classified fault is resolved to a
//! [`RecoveryAction`] by [`resolve_action`], which depends only on the fault's
//! severity and where `i` sits in the budget. Retries and checkpoint restarts
//! draw from the same attempt budget: a successful restore still consumes an
//! attempt. Unclassified faults are never retried; they trigger a safe stop
//! and come back re-typed as `CriticalSystem`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};

use sdlab_types::checkpoint::Checkpoint;
use sdlab_types::experiment::ExperimentData;
use sdlab_types::fault::{LabFault, RecoveryAction, Severity, StepFault};
use sdlab_types::recovery::{DiagnosticDump, RecoveryReport, RecoveryStats};
use sdlab_types::step::Params;

use super::checkpoint::{CheckpointError, CheckpointStore};
use crate::controller::RecoveryCapabilities;
use crate::repository::checkpoint::CheckpointRepository;

// ---------------------------------------------------------------------------
// Action resolution
// ---------------------------------------------------------------------------

/// Pick the recovery action for a fault of `severity` raised on attempt
/// `attempt` (0-based) with a budget of `max_retries`.
pub fn resolve_action(severity: Severity, attempt: u32, max_retries: u32) -> RecoveryAction {
    match severity {
        Severity::Minor if attempt < max_retries => RecoveryAction::Retry,
        Severity::Minor => RecoveryAction::RestartFromCheckpoint,
        Severity::Moderate if attempt == 0 && attempt < max_retries => RecoveryAction::Retry,
        Severity::Moderate => RecoveryAction::RestartFromCheckpoint,
        Severity::Severe => RecoveryAction::SafeStop,
        Severity::Critical => RecoveryAction::EmergencyStop,
    }
}

// ---------------------------------------------------------------------------
// Request / outcome types
// ---------------------------------------------------------------------------

/// Describes the step being run.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryRequest<'a> {
    pub step_name: &'a str,
    pub step_index: usize,
    /// Checkpoint saved after a successful attempt.
    pub checkpoint: Option<&'a str>,
    pub max_retries: u32,
}

/// A step that eventually succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    /// Number of times the step function was invoked.
    pub attempts: u32,
}

/// Why a step was given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationCause {
    /// No usable checkpoint, or restoring it failed.
    RestoreFailed,
    SafeStop,
    EmergencyStop,
    ManualIntervention,
    /// An unclassified fault; a safe stop was performed.
    Unclassified,
    /// The attempt budget ran out after a successful restore.
    AttemptsExhausted,
}

impl EscalationCause {
    /// Whether hardware actuation was halted on the way out.
    pub fn halts_hardware(self) -> bool {
        matches!(
            self,
            EscalationCause::SafeStop
                | EscalationCause::EmergencyStop
                | EscalationCause::Unclassified
        )
    }
}

impl fmt::Display for EscalationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationCause::RestoreFailed => write!(f, "checkpoint restore failed"),
            EscalationCause::SafeStop => write!(f, "safe stop"),
            EscalationCause::EmergencyStop => write!(f, "emergency stop"),
            EscalationCause::ManualIntervention => write!(f, "manual intervention required"),
            EscalationCause::Unclassified => write!(f, "unclassified fault"),
            EscalationCause::AttemptsExhausted => write!(f, "attempts exhausted"),
        }
    }
}

/// A fault the recovery manager could not resolve.
///
/// `fault` is the original fault, except for unclassified faults and budget
/// exhaustion, which are re-typed as `CriticalSystem`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{fault} ({cause})")]
pub struct Escalation {
    pub fault: LabFault,
    pub cause: EscalationCause,
    pub attempts: u32,
}

// ---------------------------------------------------------------------------
// RecoveryManager
// ---------------------------------------------------------------------------

/// Owns the checkpoint store and statistics for the active run.
pub struct RecoveryManager<C, R>
where
    C: RecoveryCapabilities,
    R: CheckpointRepository,
{
    controller: Arc<C>,
    store: CheckpointStore<R>,
    stats: RecoveryStats,
    retry_delay: Duration,
}

impl<C, R> RecoveryManager<C, R>
where
    C: RecoveryCapabilities,
    R: CheckpointRepository,
{
    pub fn new(controller: Arc<C>, repo: R, retry_delay: Duration) -> Self {
        Self {
            controller,
            store: CheckpointStore::new(repo),
            stats: RecoveryStats::default(),
            retry_delay,
        }
    }

    pub fn store(&self) -> &CheckpointStore<R> {
        &self.store
    }

    pub fn stats(&self) -> RecoveryStats {
        self.stats
    }

    /// Begin a new run: clear checkpoints and reset statistics.
    pub fn start_workflow(&mut self, workflow_id: impl Into<String>) {
        let workflow_id = workflow_id.into();
        tracing::info!(workflow_id = %workflow_id, "recovery tracking started");
        self.store.begin(workflow_id);
        self.stats = RecoveryStats::default();
    }

    /// Snapshot of counters plus success rate, checkpoint count and run id.
    pub fn statistics(&self) -> RecoveryReport {
        RecoveryReport {
            stats: self.stats,
            success_rate: self.stats.success_rate(),
            total_checkpoints: self.store.len(),
            workflow_id: self.store.workflow_id().map(str::to_string),
        }
    }

    /// Save a checkpoint directly. Failure to persist is logged, not fatal.
    pub async fn create_checkpoint(
        &mut self,
        name: &str,
        step_index: usize,
        state: Params,
    ) -> Option<String> {
        match self.store.save(name, step_index, state).await {
            Ok(id) => {
                if self.store.latest(None).is_some_and(Checkpoint::is_critical) {
                    tracing::info!(checkpoint_id = %id, step_index, "critical checkpoint created");
                }
                Some(id)
            }
            Err(CheckpointError::Persistence { checkpoint_id, message }) => {
                tracing::warn!(
                    checkpoint_id = %checkpoint_id,
                    error = %message,
                    "checkpoint not persisted, keeping in-memory copy"
                );
                Some(checkpoint_id)
            }
            Err(e) => {
                tracing::warn!(name, step_index, error = %e, "checkpoint rejected");
                None
            }
        }
    }

    /// Run `step` under the recovery policy.
    ///
    /// `step` is invoked once per attempt and must produce a fresh future
    /// each time.
    pub async fn run_with_recovery<F, Fut>(
        &mut self,
        request: RecoveryRequest<'_>,
        mut step: F,
    ) -> Result<Recovered, Escalation>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, StepFault>>,
    {
        for attempt in 0..=request.max_retries {
            let attempts = attempt + 1;
            let fault = match step().await {
                Ok(value) => {
                    if let Some(name) = request.checkpoint {
                        self.checkpoint_step(name, request.step_name, request.step_index, &value)
                            .await;
                    }
                    if attempt > 0 {
                        tracing::info!(
                            step = request.step_name,
                            attempts,
                            "step succeeded after recovery"
                        );
                    }
                    return Ok(Recovered { value, attempts });
                }
                Err(StepFault::Unclassified(message)) => {
                    let escalation = self
                        .escalate_unclassified(request.step_name, request.step_index, &message)
                        .await;
                    return Err(Escalation {
                        attempts,
                        ..escalation
                    });
                }
                Err(StepFault::Classified(fault)) => fault,
            };

            self.stats.total_errors += 1;
            let action = resolve_action(fault.severity(), attempt, request.max_retries);
            tracing::warn!(
                step = request.step_name,
                step_index = request.step_index,
                attempt,
                kind = %fault.kind,
                severity = %fault.severity(),
                action = %action,
                error = %fault.message,
                "step fault"
            );

            let reason = format!("{}: {fault}", request.step_name);
            match action {
                RecoveryAction::Retry => self.prepare_retry().await,
                RecoveryAction::RestartFromCheckpoint => {
                    if !self.restart_from_checkpoint(request.step_index).await {
                        self.write_dump(&reason).await;
                        return Err(Escalation {
                            fault,
                            cause: EscalationCause::RestoreFailed,
                            attempts,
                        });
                    }
                }
                RecoveryAction::SafeStop => {
                    self.safe_stop(&reason).await;
                    return Err(Escalation {
                        fault,
                        cause: EscalationCause::SafeStop,
                        attempts,
                    });
                }
                RecoveryAction::EmergencyStop => {
                    self.emergency_stop(&reason).await;
                    return Err(Escalation {
                        fault,
                        cause: EscalationCause::EmergencyStop,
                        attempts,
                    });
                }
                RecoveryAction::ManualIntervention => {
                    self.request_manual_intervention(&reason).await;
                    return Err(Escalation {
                        fault,
                        cause: EscalationCause::ManualIntervention,
                        attempts,
                    });
                }
            }
        }

        tracing::error!(step = request.step_name, "recovery attempts exhausted");
        let reason = format!(
            "unexpected: {} exhausted {} attempts",
            request.step_name,
            u64::from(request.max_retries) + 1
        );
        self.write_dump(&reason).await;
        Err(Escalation {
            fault: LabFault::critical_system(reason),
            cause: EscalationCause::AttemptsExhausted,
            attempts: request.max_retries.saturating_add(1),
        })
    }

    /// Safe-stop on a fault outside the taxonomy and re-type it as
    /// `CriticalSystem`. Also used for steps that run without the retry loop.
    pub async fn escalate_unclassified(
        &mut self,
        step_name: &str,
        step_index: usize,
        message: &str,
    ) -> Escalation {
        self.stats.total_errors += 1;
        tracing::error!(
            step = step_name,
            step_index,
            error = %message,
            "unclassified fault, performing safe stop"
        );
        let reason = format!("unclassified fault in {step_name}: {message}");
        self.safe_stop(&reason).await;
        Escalation {
            fault: LabFault::critical_system(reason),
            cause: EscalationCause::Unclassified,
            attempts: 1,
        }
    }

    // -----------------------------------------------------------------------
    // Action effects
    // -----------------------------------------------------------------------

    async fn prepare_retry(&self) {
        if !self.retry_delay.is_zero() {
            tokio::time::sleep(self.retry_delay).await;
        }
        if let Err(e) = self.controller.clear_error_state().await {
            tracing::warn!(error = %e, "failed to clear controller error state");
        }
    }

    /// Roll back to the newest checkpoint before `step_index`.
    async fn restart_from_checkpoint(&mut self, step_index: usize) -> bool {
        let Some(checkpoint) = self.store.find_prior_to(step_index).cloned() else {
            tracing::warn!(step_index, "no checkpoint before failing step");
            self.stats.failed_recoveries += 1;
            return false;
        };

        if self.restore_from_checkpoint(&checkpoint).await {
            self.stats.successful_recoveries += 1;
            tracing::info!(
                checkpoint_id = %checkpoint.id,
                checkpoint_step = checkpoint.step_index,
                "restarting from checkpoint"
            );
            true
        } else {
            self.stats.failed_recoveries += 1;
            false
        }
    }

    /// Push a checkpoint's state back into the controller. Failures are
    /// logged and reported as `false`.
    pub async fn restore_from_checkpoint(&self, checkpoint: &Checkpoint) -> bool {
        if let Some(snapshot) = checkpoint.state.get("controller_state") {
            if let Err(e) = self.controller.restore_state(snapshot).await {
                tracing::error!(checkpoint_id = %checkpoint.id, error = %e, "controller state restore failed");
                return false;
            }
        }

        if let Some(data) = checkpoint.state.get("experiment_data") {
            let data = match serde_json::from_value::<ExperimentData>(data.clone()) {
                Ok(data) => data,
                Err(e) => {
                    tracing::error!(checkpoint_id = %checkpoint.id, error = %e, "corrupt experiment data in checkpoint");
                    return false;
                }
            };
            if let Err(e) = self.controller.restore_experiment_data(&data).await {
                tracing::error!(checkpoint_id = %checkpoint.id, error = %e, "experiment data restore failed");
                return false;
            }
        }

        tracing::info!(checkpoint_id = %checkpoint.id, name = %checkpoint.name, "restored from checkpoint");
        true
    }

    /// Halt actuation and disable heating, then dump diagnostics.
    pub async fn safe_stop(&self, reason: &str) {
        tracing::warn!(reason, "performing safe stop");
        if let Err(e) = self.controller.stop_all_movements().await {
            tracing::error!(error = %e, "stop_all_movements failed");
        }
        if let Err(e) = self.controller.disable_temperature_control().await {
            tracing::error!(error = %e, "disable_temperature_control failed");
        }
        self.write_dump(reason).await;
    }

    /// Halt all hardware immediately, then dump diagnostics.
    pub async fn emergency_stop(&self, reason: &str) {
        tracing::error!(reason, "performing emergency stop");
        if let Err(e) = self.controller.emergency_stop().await {
            tracing::error!(error = %e, "emergency_stop failed");
        }
        self.write_dump(reason).await;
    }

    /// Record that an operator must step in, then dump diagnostics.
    pub async fn request_manual_intervention(&mut self, reason: &str) {
        self.stats.manual_interventions += 1;
        tracing::error!(reason, "manual intervention required");
        self.write_dump(reason).await;
    }

    async fn write_dump(&self, reason: &str) -> Option<String> {
        let controller_state = match self.controller.get_state().await {
            Ok(state) => state,
            Err(e) => json!({ "error": e.to_string() }),
        };
        let experiment_data = serde_json::to_value(self.controller.experiment_data().await)
            .unwrap_or(Value::Null);

        let dump = DiagnosticDump {
            timestamp: Utc::now(),
            workflow_id: self.store.workflow_id().map(str::to_string),
            reason: reason.to_string(),
            controller_state,
            experiment_data,
            checkpoints: self.store.checkpoints().to_vec(),
            recovery_stats: self.stats,
        };

        match self.store.repo().write_dump(&dump).await {
            Ok(location) => {
                tracing::info!(location = %location, "diagnostic dump written");
                Some(location)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to write diagnostic dump");
                None
            }
        }
    }

    /// Checkpoint a completed step together with the controller state and
    /// experiment data needed to roll back to it.
    pub async fn checkpoint_step(
        &mut self,
        name: &str,
        step_name: &str,
        step_index: usize,
        result: &Value,
    ) -> Option<String> {
        let controller_state = match self.controller.get_state().await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "could not capture controller state for checkpoint");
                Value::Null
            }
        };
        let experiment_data = serde_json::to_value(self.controller.experiment_data().await)
            .unwrap_or(Value::Null);

        let mut state = Params::new();
        state.insert("step_result".to_string(), result.clone());
        state.insert("controller_state".to_string(), controller_state);
        state.insert("experiment_data".to_string(), experiment_data);
        state.insert("step_name".to_string(), json!(step_name));
        state.insert("step_index".to_string(), json!(step_index));

        self.create_checkpoint(name, step_index, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::checkpoint::MemoryCheckpointRepository;
    use crate::test_support::ScriptedController;

    type Manager = RecoveryManager<ScriptedController, MemoryCheckpointRepository>;

    fn manager() -> (Arc<ScriptedController>, Manager) {
        let controller = Arc::new(ScriptedController::new());
        let mut manager = RecoveryManager::new(
            controller.clone(),
            MemoryCheckpointRepository::new(),
            Duration::ZERO,
        );
        manager.start_workflow("wf-test");
        (controller, manager)
    }

    fn request(step_index: usize, max_retries: u32) -> RecoveryRequest<'static> {
        RecoveryRequest {
            step_name: "Solution Preparation",
            step_index,
            checkpoint: Some("solution_preparation_complete"),
            max_retries,
        }
    }

    #[test]
    fn resolve_action_matches_table() {
        use RecoveryAction::*;
        let max = 3;
        let cases = [
            (Severity::Minor, 0, Retry),
            (Severity::Minor, max - 1, Retry),
            (Severity::Minor, max, RestartFromCheckpoint),
            (Severity::Moderate, 0, Retry),
            (Severity::Moderate, max - 1, RestartFromCheckpoint),
            (Severity::Moderate, max, RestartFromCheckpoint),
            (Severity::Severe, 0, SafeStop),
            (Severity::Severe, max - 1, SafeStop),
            (Severity::Severe, max, SafeStop),
            (Severity::Critical, 0, EmergencyStop),
            (Severity::Critical, max - 1, EmergencyStop),
            (Severity::Critical, max, EmergencyStop),
        ];
        for (severity, attempt, expected) in cases {
            assert_eq!(
                resolve_action(severity, attempt, max),
                expected,
                "{severity} at attempt {attempt}"
            );
        }
    }

    #[test]
    fn moderate_with_zero_budget_restarts() {
        assert_eq!(
            resolve_action(Severity::Moderate, 0, 0),
            RecoveryAction::RestartFromCheckpoint
        );
        assert_eq!(
            resolve_action(Severity::Minor, 0, 0),
            RecoveryAction::RestartFromCheckpoint
        );
    }

    #[tokio::test]
    async fn succeeds_after_k_failures_with_k_plus_one_calls() {
        for k in 0..=3u32 {
            let (_, mut manager) = manager();
            let mut calls = 0u32;
            let outcome = manager
                .run_with_recovery(request(0, 3), || {
                    calls += 1;
                    let n = calls;
                    async move {
                        if n <= k {
                            Err(LabFault::pipetting("tip not detected").into())
                        } else {
                            Ok(json!({"status": "success"}))
                        }
                    }
                })
                .await
                .unwrap();
            assert_eq!(calls, k + 1);
            assert_eq!(outcome.attempts, k + 1);
            assert_eq!(manager.stats().total_errors, k);
        }
    }

    #[tokio::test]
    async fn success_saves_named_checkpoint_with_captured_state() {
        let (_, mut manager) = manager();
        manager
            .run_with_recovery(request(2, 3), || async { Ok(json!({"volume_transferred": 500})) })
            .await
            .unwrap();

        let cp = manager
            .store()
            .latest(Some("solution_preparation_complete"))
            .unwrap();
        assert_eq!(cp.step_index, 2);
        assert_eq!(cp.state["step_result"]["volume_transferred"], 500);
        assert_eq!(cp.state["step_name"], "Solution Preparation");
        assert!(cp.state.contains_key("controller_state"));
        assert!(cp.state.contains_key("experiment_data"));
        assert_eq!(manager.store().repo().keys().len(), 1);
    }

    #[tokio::test]
    async fn retry_clears_controller_error_latch() {
        let (controller, mut manager) = manager();
        let mut calls = 0;
        manager
            .run_with_recovery(request(0, 3), || {
                calls += 1;
                let n = calls;
                async move {
                    if n == 1 {
                        Err(LabFault::pipetting("clog").into())
                    } else {
                        Ok(json!({}))
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(controller.count("clear_error_state"), 1);
    }

    #[tokio::test]
    async fn moderate_fault_restores_prior_checkpoint() {
        let (controller, mut manager) = manager();
        let mut state = Params::new();
        state.insert("controller_state".into(), json!({"position": "slot_10:A2"}));
        manager.create_checkpoint("electrode_setup_complete", 1, state).await;

        let mut calls = 0;
        let outcome = manager
            .run_with_recovery(
                RecoveryRequest {
                    step_name: "Electrochemical Measurement",
                    step_index: 3,
                    checkpoint: None,
                    max_retries: 3,
                },
                || {
                    calls += 1;
                    let n = calls;
                    async move {
                        if n <= 2 {
                            Err(LabFault::electrochemical("potentiostat overload").into())
                        } else {
                            Ok(json!({"status": "success"}))
                        }
                    }
                },
            )
            .await
            .unwrap();

        // attempt 0 retries, attempt 1 restarts from the checkpoint
        assert_eq!(outcome.attempts, 3);
        assert_eq!(manager.stats().successful_recoveries, 1);
        assert_eq!(manager.stats().total_errors, 2);
        assert_eq!(
            controller.restored_states(),
            vec![json!({"position": "slot_10:A2"})]
        );
    }

    #[tokio::test]
    async fn restart_without_prior_checkpoint_escalates_original_fault() {
        let (_, mut manager) = manager();
        let err = manager
            .run_with_recovery(request(0, 0), || async {
                Err::<Value, _>(LabFault::electrode("no electrode in gripper").into())
            })
            .await
            .unwrap_err();

        assert_eq!(err.cause, EscalationCause::RestoreFailed);
        assert_eq!(err.fault.message, "no electrode in gripper");
        assert_eq!(manager.stats().failed_recoveries, 1);
        assert_eq!(manager.statistics().success_rate, 0.0);
        let dumps = manager.store().repo().dumps();
        assert_eq!(dumps.len(), 1);
        assert!(dumps[0].reason.contains("no electrode in gripper"));
    }

    #[tokio::test]
    async fn checkpoint_at_failing_step_is_not_used() {
        let (_, mut manager) = manager();
        manager.create_checkpoint("same_step", 2, Params::new()).await;
        let err = manager
            .run_with_recovery(request(2, 0), || async {
                Err::<Value, _>(LabFault::pipetting("drip").into())
            })
            .await
            .unwrap_err();
        assert_eq!(err.cause, EscalationCause::RestoreFailed);
    }

    #[tokio::test]
    async fn failed_restore_escalates() {
        let (controller, mut manager) = manager();
        let mut state = Params::new();
        state.insert("controller_state".into(), json!({"bad": true}));
        manager.create_checkpoint("before", 0, state).await;
        controller.fail_restore(true);

        let err = manager
            .run_with_recovery(request(1, 0), || async {
                Err::<Value, _>(LabFault::pipetting("drip").into())
            })
            .await
            .unwrap_err();
        assert_eq!(err.cause, EscalationCause::RestoreFailed);
        assert_eq!(manager.stats().failed_recoveries, 1);
    }

    #[tokio::test]
    async fn critical_fault_triggers_emergency_stop_and_dump() {
        let (controller, mut manager) = manager();
        let mut calls = 0;
        let err = manager
            .run_with_recovery(request(0, 3), || {
                calls += 1;
                async { Err::<Value, _>(LabFault::critical_system("enclosure door open").into()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls, 1);
        assert_eq!(err.cause, EscalationCause::EmergencyStop);
        assert!(err.cause.halts_hardware());
        assert_eq!(controller.count("emergency_stop"), 1);
        let dumps = manager.store().repo().dumps();
        assert_eq!(dumps.len(), 1);
        assert_eq!(dumps[0].workflow_id.as_deref(), Some("wf-test"));
        assert_eq!(dumps[0].recovery_stats.total_errors, 1);
    }

    #[tokio::test]
    async fn unclassified_fault_safe_stops_once_and_retypes() {
        let (controller, mut manager) = manager();
        let mut calls = 0;
        let err = manager
            .run_with_recovery(request(0, 3), || {
                calls += 1;
                async { Err::<Value, _>(StepFault::unclassified("serial port closed")) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls, 1);
        assert_eq!(err.cause, EscalationCause::Unclassified);
        assert_eq!(err.fault.kind, sdlab_types::fault::FaultKind::CriticalSystem);
        assert_eq!(manager.stats().total_errors, 1);
        assert_eq!(controller.count("stop_all_movements"), 1);
        assert_eq!(controller.count("disable_temperature_control"), 1);
        assert_eq!(manager.store().repo().dumps().len(), 1);
    }

    #[tokio::test]
    async fn restore_success_on_final_attempt_exhausts_budget() {
        let (_, mut manager) = manager();
        manager.create_checkpoint("start", 0, Params::new()).await;
        let mut calls = 0;
        let err = manager
            .run_with_recovery(request(1, 1), || {
                calls += 1;
                async { Err::<Value, _>(LabFault::pipetting("drip").into()) }
            })
            .await
            .unwrap_err();

        // attempt 0 retries, attempt 1 restores, then the budget is gone
        assert_eq!(calls, 2);
        assert_eq!(err.cause, EscalationCause::AttemptsExhausted);
        assert_eq!(err.fault.kind, sdlab_types::fault::FaultKind::CriticalSystem);
        assert_eq!(manager.stats().successful_recoveries, 1);
        let dumps = manager.store().repo().dumps();
        assert_eq!(dumps.len(), 1);
        assert!(dumps[0].reason.starts_with("unexpected"));
    }

    #[tokio::test]
    async fn unclassified_outside_retry_loop_counts_and_dumps() {
        let (controller, mut manager) = manager();
        let escalation = manager
            .escalate_unclassified("home_robot", 4, "communication lost: robot offline")
            .await;

        assert_eq!(escalation.cause, EscalationCause::Unclassified);
        assert_eq!(escalation.attempts, 1);
        assert!(escalation.fault.message.contains("home_robot"));
        assert_eq!(manager.stats().total_errors, 1);
        assert_eq!(controller.count("stop_all_movements"), 1);
        assert_eq!(manager.store().repo().dumps().len(), 1);
    }

    #[tokio::test]
    async fn manual_intervention_counts_and_dumps() {
        let (_, mut manager) = manager();
        manager.request_manual_intervention("reagent bottle empty").await;
        assert_eq!(manager.stats().manual_interventions, 1);
        let dumps = manager.store().repo().dumps();
        assert_eq!(dumps[0].reason, "reagent bottle empty");
    }

    #[tokio::test]
    async fn persistence_failure_does_not_fail_step() {
        let (_, mut manager) = manager();
        manager.store().repo().set_unavailable(true);
        let outcome = manager
            .run_with_recovery(request(0, 3), || async { Ok(json!({"ok": true})) })
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(manager.statistics().total_checkpoints, 1);
    }

    #[tokio::test]
    async fn start_workflow_resets_run_state() {
        let (_, mut manager) = manager();
        let _ = manager
            .run_with_recovery(request(0, 0), || async {
                Err::<Value, _>(LabFault::pipetting("drip").into())
            })
            .await;
        assert_eq!(manager.stats().total_errors, 1);

        manager.start_workflow("wf-next");
        let report = manager.statistics();
        assert_eq!(report.stats, RecoveryStats::default());
        assert_eq!(report.total_checkpoints, 0);
        assert_eq!(report.workflow_id.as_deref(), Some("wf-next"));
    }
}

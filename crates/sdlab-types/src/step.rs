//! Workflow step and result types.
//!
//! A workflow is an ordered list of [`Step`]s. Each dispatched step yields
//! exactly one [`StepResult`]; the engine folds them into a
//! [`WorkflowSummary`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters mapping carried by a step.
pub type Params = Map<String, Value>;

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One declared, typed action in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub step_type: String,
    #[serde(default, alias = "params")]
    pub parameters: Params,
}

impl Step {
    pub fn new(id: impl Into<String>, step_type: impl Into<String>, parameters: Params) -> Self {
        Self {
            id: id.into(),
            step_type: step_type.into(),
            parameters,
        }
    }

    /// Policy applied when this step fails. Anything but `"stop"` continues.
    pub fn error_handling(&self) -> ErrorHandling {
        match self.parameters.get("error_handling").and_then(Value::as_str) {
            Some("stop") => ErrorHandling::Stop,
            _ => ErrorHandling::Continue,
        }
    }

    /// The step id, or `node_{index}` when the workflow left it blank.
    pub fn node_id(&self, index: usize) -> String {
        if self.id.is_empty() {
            format!("node_{index}")
        } else {
            self.id.clone()
        }
    }
}

/// Per-step failure policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
    #[default]
    Continue,
    Stop,
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Error,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Success => write!(f, "success"),
            StepStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of a single dispatched step. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub status: StepStatus,
    pub node_index: usize,
    pub node_id: String,
    pub node_type: String,
    #[serde(default)]
    pub payload: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Attempts consumed when the step ran under recovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl StepResult {
    pub fn is_error(&self) -> bool {
        self.status == StepStatus::Error
    }
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// One entry per dispatched step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub node_id: String,
    pub node_type: String,
    pub params: Params,
    pub timestamp: DateTime<Utc>,
}

/// One entry per handler invocation, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub operation: String,
    pub params: Params,
    pub result: Value,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// WorkflowSummary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Completed,
    CompletedWithErrors,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::CompletedWithErrors => write!(f, "completed_with_errors"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedNode {
    pub index: usize,
    pub node_id: String,
    pub node_type: String,
    pub error: String,
}

/// Workflow-level result returned once the run finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub status: WorkflowStatus,
    pub workflow_id: String,
    pub total_nodes: usize,
    pub executed_nodes: usize,
    pub successful_nodes: usize,
    pub failed_nodes: Vec<FailedNode>,
    pub results: Vec<StepResult>,
    pub execution_log: Vec<ExecutionLogEntry>,
    pub operation_log: Vec<OperationLogEntry>,
    /// Set when the run was cut short by a stop policy or a hardware halt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_at: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Params>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub total_nodes: usize,
}

// ---------------------------------------------------------------------------
// Workflow documents
// ---------------------------------------------------------------------------

/// Metadata carried by an envelope document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Params,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepList {
    #[serde(default)]
    pub nodes: Vec<Step>,
}

/// A wrapper object with metadata plus the step list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEnvelope {
    #[serde(default)]
    pub metadata: EnvelopeMetadata,
    pub workflow: StepList,
}

/// Any of the accepted workflow file shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowDocument {
    Steps(Vec<Step>),
    Envelope(WorkflowEnvelope),
    Nodes(StepList),
}

impl WorkflowDocument {
    pub fn steps(&self) -> &[Step] {
        match self {
            WorkflowDocument::Envelope(env) => &env.workflow.nodes,
            WorkflowDocument::Nodes(list) => &list.nodes,
            WorkflowDocument::Steps(steps) => steps,
        }
    }
}

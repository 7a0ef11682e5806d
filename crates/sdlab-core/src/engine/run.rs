//! Per-run bookkeeping: the execution and operation logs.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use sdlab_types::fault::StepFault;
use sdlab_types::step::{ExecutionLogEntry, OperationLogEntry, Params};

/// One end-to-end execution of a step list.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub workflow_id: String,
    pub started_at: DateTime<Utc>,
    pub execution_log: Vec<ExecutionLogEntry>,
    pub operation_log: Vec<OperationLogEntry>,
}

impl WorkflowRun {
    pub fn start(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            started_at: Utc::now(),
            execution_log: Vec::new(),
            operation_log: Vec::new(),
        }
    }

    pub fn record_dispatch(&mut self, node_id: &str, node_type: &str, params: &Params) {
        self.execution_log.push(ExecutionLogEntry {
            node_id: node_id.to_string(),
            node_type: node_type.to_string(),
            params: params.clone(),
            timestamp: Utc::now(),
        });
    }

    pub fn record_operation(&mut self, entry: OperationLogEntry) {
        self.operation_log.push(entry);
    }
}

/// Log entry for one handler invocation.
pub fn operation_entry(
    operation: &str,
    params: &Params,
    outcome: &Result<Value, StepFault>,
) -> OperationLogEntry {
    let result = match outcome {
        Ok(value) => value.clone(),
        Err(fault) => json!({ "status": "error", "message": fault.to_string() }),
    };
    OperationLogEntry {
        operation: operation.to_string(),
        params: params.clone(),
        result,
        timestamp: Utc::now(),
    }
}

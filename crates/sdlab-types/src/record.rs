//! Persisted execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recovery::RecoveryReport;
use crate::step::{WorkflowDocument, WorkflowSummary};

/// Where an execution was requested from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionSource {
    Http { request_id: String },
    Watch { file: String },
}

/// One finished execution: the document that was run, how it was asked for
/// and what came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub timestamp: DateTime<Utc>,
    pub source: ExecutionSource,
    pub dry_run: bool,
    pub workflow: WorkflowDocument,
    pub summary: WorkflowSummary,
    pub recovery_statistics: RecoveryReport,
}

//! Workflow validation and execution handlers.
//!
//! Execution validates first and refuses invalid workflows with a 400, so a
//! document with an unknown step type never reaches the lab.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sdlab_types::record::{ExecutionRecord, ExecutionSource};
use sdlab_types::recovery::RecoveryReport;
use sdlab_types::step::{Params, ValidationReport, WorkflowDocument, WorkflowSummary};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, elapsed_ms};
use crate::state::HttpState;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub workflow: WorkflowDocument,
    #[serde(default)]
    pub config: ExecuteOptions,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExecuteOptions {
    /// Run on a throwaway dry-run engine instead of the shared lab engine.
    #[serde(default)]
    pub dry_run: bool,
    /// Overrides `[results] save`.
    #[serde(default)]
    pub save_results: Option<bool>,
    #[serde(default)]
    pub workflow_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowInfo {
    pub total_nodes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Params>,
}

impl WorkflowInfo {
    fn of(document: &WorkflowDocument) -> Self {
        let (name, metadata) = match document {
            WorkflowDocument::Envelope(envelope) => (
                envelope.metadata.name.clone(),
                Some(envelope.metadata.extra.clone()),
            ),
            _ => (None, None),
        };
        Self {
            total_nodes: document.steps().len(),
            name,
            metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidateView {
    pub validation: ValidationReport,
    pub workflow_info: WorkflowInfo,
}

#[derive(Debug, Serialize)]
pub struct ExecuteView {
    pub execution: WorkflowSummary,
    pub recovery_statistics: RecoveryReport,
    pub workflow_info: WorkflowInfo,
    pub dry_run: bool,
    /// Path of the saved execution record, when one was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/validate - Check step types without running anything.
pub async fn validate_workflow(
    State(state): State<HttpState>,
    Json(document): Json<WorkflowDocument>,
) -> Result<Json<ApiResponse<ValidateView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let validation = state.registry.validate(document.steps());
    tracing::debug!(%request_id, valid = validation.valid, nodes = validation.total_nodes, "workflow validated");

    Ok(Json(ApiResponse::success(
        ValidateView {
            validation,
            workflow_info: WorkflowInfo::of(&document),
        },
        request_id,
        elapsed_ms(start),
    )))
}

/// POST /api/v1/execute - Validate, then run on the lab engine.
pub async fn execute_workflow(
    State(state): State<HttpState>,
    Json(body): Json<ExecuteRequest>,
) -> Result<Json<ApiResponse<ExecuteView>>, AppError> {
    let dry_run = body.config.dry_run;
    execute(state, body, dry_run).await
}

/// POST /api/v1/execute/dry-run - Validate, then run on a dry-run engine.
pub async fn execute_dry_run(
    State(state): State<HttpState>,
    Json(body): Json<ExecuteRequest>,
) -> Result<Json<ApiResponse<ExecuteView>>, AppError> {
    execute(state, body, true).await
}

async fn execute(
    state: HttpState,
    body: ExecuteRequest,
    dry_run: bool,
) -> Result<Json<ApiResponse<ExecuteView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let ExecuteRequest { workflow, config } = body;

    let report = state.registry.validate(workflow.steps());
    if !report.valid {
        tracing::warn!(%request_id, errors = ?report.errors, "rejected invalid workflow");
        return Err(AppError::InvalidWorkflow(report));
    }

    let (execution, recovery_statistics) = if dry_run {
        let mut engine = state.dry_run_engine();
        let summary = engine.execute_document(&workflow, config.workflow_id).await;
        (summary, engine.recovery_statistics())
    } else {
        let mut engine = state.engine.lock().await;
        let summary = engine.execute_document(&workflow, config.workflow_id).await;
        (summary, engine.recovery_statistics())
    };
    tracing::info!(
        %request_id,
        workflow_id = %execution.workflow_id,
        status = %execution.status,
        dry_run,
        "workflow executed over http"
    );

    let workflow_info = WorkflowInfo::of(&workflow);
    let saved_to = if config.save_results.unwrap_or(state.config.results.save) {
        let record = ExecutionRecord {
            timestamp: chrono::Utc::now(),
            source: ExecutionSource::Http {
                request_id: request_id.clone(),
            },
            dry_run,
            workflow,
            summary: execution.clone(),
            recovery_statistics: recovery_statistics.clone(),
        };
        match state.results.save(&record).await {
            Ok(path) => Some(path.display().to_string()),
            Err(e) => {
                // The run already happened; report it even if the record is lost.
                tracing::warn!(%request_id, error = %e, "failed to save execution record");
                None
            }
        }
    } else {
        None
    };

    Ok(Json(ApiResponse::success(
        ExecuteView {
            execution,
            recovery_statistics,
            workflow_info,
            dry_run,
            saved_to,
        },
        request_id,
        elapsed_ms(start),
    )))
}

//! Lab-level handlers: supported operations and controller status.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use uuid::Uuid;

use sdlab_core::controller::LabController;
use sdlab_types::recovery::RecoveryReport;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, elapsed_ms};
use crate::state::HttpState;

#[derive(Debug, Serialize)]
pub struct OperationsView {
    pub supported_operations: Vec<&'static str>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub robot: serde_json::Value,
    /// A workflow is executing right now.
    pub busy: bool,
    /// Statistics from the last run, when the engine is idle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RecoveryReport>,
}

/// GET /api/v1/operations - Step types the engine accepts.
pub async fn list_operations(
    State(state): State<HttpState>,
) -> Result<Json<ApiResponse<OperationsView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let supported_operations = state.registry.names();
    let view = OperationsView {
        count: supported_operations.len(),
        supported_operations,
    };

    Ok(Json(
        ApiResponse::success(view, request_id, elapsed_ms(start))
            .with_link("self", "/api/v1/operations"),
    ))
}

/// GET /api/v1/status - Controller snapshot.
pub async fn lab_status(
    State(state): State<HttpState>,
) -> Result<Json<ApiResponse<StatusView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let robot = state.controller.status().await;
    let (busy, last_run) = match state.engine.try_lock() {
        Ok(engine) => {
            let report = engine.recovery_statistics();
            (false, report.workflow_id.is_some().then_some(report))
        }
        Err(_) => (true, None),
    };

    Ok(Json(ApiResponse::success(
        StatusView {
            robot,
            busy,
            last_run,
        },
        request_id,
        elapsed_ms(start),
    )))
}

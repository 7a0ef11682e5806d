//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`, plus `/health`.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::HttpState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: HttpState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/operations", get(handlers::lab::list_operations))
        .route("/status", get(handlers::lab::lab_status))
        .route("/validate", post(handlers::workflow::validate_workflow))
        .route("/execute", post(handlers::workflow::execute_workflow))
        .route("/execute/dry-run", post(handlers::workflow::execute_dry_run));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

//! HTTP/REST API layer for sdlab.
//!
//! Axum-based REST API at `/api/v1/` with envelope responses and CORS.
//! Started by `sdlab serve`.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;

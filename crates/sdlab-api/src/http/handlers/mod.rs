//! HTTP request handlers for the REST API.

pub mod lab;
pub mod workflow;

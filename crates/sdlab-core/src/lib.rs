//! Business logic and port definitions for sdlab.
//!
//! This crate defines the "ports" (controller and checkpoint repository
//! traits) that the infrastructure layer implements, plus the recovery
//! manager and execution engine that drive them. It depends only on
//! `sdlab-types` -- never on `sdlab-infra`.

pub mod controller;
pub mod engine;
pub mod operations;
pub mod recovery;
pub mod repository;

#[cfg(test)]
pub(crate) mod test_support;

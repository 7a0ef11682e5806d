//! Shared domain types for sdlab.
//!
//! Fault taxonomy, workflow steps and results, checkpoints, recovery
//! statistics and global configuration.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod experiment;
pub mod fault;
pub mod record;
pub mod recovery;
pub mod step;

//! Checkpoint-based recovery.
//!
//! - [`checkpoint`]: ordered, append-only checkpoint store for one run.
//! - [`manager`]: the `run_with_recovery` state machine and its statistics.

pub mod checkpoint;
pub mod manager;

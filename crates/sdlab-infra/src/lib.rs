//! Infrastructure layer for sdlab.
//!
//! Contains implementations of the port traits defined in `sdlab-core`: a
//! file-backed checkpoint repository and a simulated lab controller, plus
//! configuration loading, engine wiring, execution records and the
//! workflow inbox watcher.

pub mod checkpoint;
pub mod config;
pub mod controller;
pub mod filesystem;
pub mod lab;
pub mod results;
pub mod watch;

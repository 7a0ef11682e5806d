//! Persistence ports.
//!
//! Each sub-module defines a trait that the infrastructure layer implements.
//! Core logic depends on these traits, never on concrete backends.

pub mod checkpoint;

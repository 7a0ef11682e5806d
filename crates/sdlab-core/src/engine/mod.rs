//! Step dispatch and workflow execution.

pub mod definition;
pub mod executor;
pub mod registry;
pub mod run;

pub use executor::{EngineConfig, ExecutionEngine};
pub use registry::{OperationRegistry, OperationType};

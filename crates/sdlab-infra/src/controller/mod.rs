//! Lab controller implementations.

pub mod fault_plan;
pub mod simulated;

pub use fault_plan::{FaultPlan, FaultSpec, FaultSpecError, InjectedKind};
pub use simulated::SimulatedController;

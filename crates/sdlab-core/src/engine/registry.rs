//! Operation registry: the closed set of step types the engine can run.

use std::collections::HashMap;
use std::fmt;

use sdlab_types::step::{Step, ValidationReport};

/// Every registered step type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    HomeRobot,
    MoveToWell,
    PickupTip,
    DropTip,
    Aspirate,
    Dispense,
    Delay,
    GetStatus,
    ExperimentSetup,
    SolutionPreparation,
    ElectrodeSetup,
    ElectrochemicalMeasurement,
    WashCleaning,
    DataExport,
    SequenceControl,
    CycleCounter,
}

impl OperationType {
    pub const ALL: [OperationType; 16] = [
        OperationType::HomeRobot,
        OperationType::MoveToWell,
        OperationType::PickupTip,
        OperationType::DropTip,
        OperationType::Aspirate,
        OperationType::Dispense,
        OperationType::Delay,
        OperationType::GetStatus,
        OperationType::ExperimentSetup,
        OperationType::SolutionPreparation,
        OperationType::ElectrodeSetup,
        OperationType::ElectrochemicalMeasurement,
        OperationType::WashCleaning,
        OperationType::DataExport,
        OperationType::SequenceControl,
        OperationType::CycleCounter,
    ];

    /// Type name as written in workflow files.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::HomeRobot => "home_robot",
            OperationType::MoveToWell => "move_to_well",
            OperationType::PickupTip => "pickup_tip",
            OperationType::DropTip => "drop_tip",
            OperationType::Aspirate => "aspirate",
            OperationType::Dispense => "dispense",
            OperationType::Delay => "delay",
            OperationType::GetStatus => "get_status",
            OperationType::ExperimentSetup => "sdl1ExperimentSetup",
            OperationType::SolutionPreparation => "sdl1SolutionPreparation",
            OperationType::ElectrodeSetup => "sdl1ElectrodeSetup",
            OperationType::ElectrochemicalMeasurement => "sdl1ElectrochemicalMeasurement",
            OperationType::WashCleaning => "sdl1WashCleaning",
            OperationType::DataExport => "sdl1DataExport",
            OperationType::SequenceControl => "sdl1SequenceControl",
            OperationType::CycleCounter => "sdl1CycleCounter",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            OperationType::HomeRobot => "Home robot",
            OperationType::MoveToWell => "Move to well",
            OperationType::PickupTip => "Pick up tip",
            OperationType::DropTip => "Drop tip",
            OperationType::Aspirate => "Aspirate",
            OperationType::Dispense => "Dispense",
            OperationType::Delay => "Delay",
            OperationType::GetStatus => "Get status",
            OperationType::ExperimentSetup => "Experiment setup",
            OperationType::SolutionPreparation => "Solution preparation",
            OperationType::ElectrodeSetup => "Electrode setup",
            OperationType::ElectrochemicalMeasurement => "Electrochemical measurement",
            OperationType::WashCleaning => "Wash and cleaning",
            OperationType::DataExport => "Data export",
            OperationType::SequenceControl => "Sequence control",
            OperationType::CycleCounter => "Cycle counter",
        }
    }

    /// Checkpoint saved when this operation completes.
    pub fn completion_checkpoint(self) -> Option<&'static str> {
        match self {
            OperationType::ExperimentSetup => Some("experiment_setup_complete"),
            OperationType::SolutionPreparation => Some("solution_preparation_complete"),
            OperationType::ElectrodeSetup => Some("electrode_setup_complete"),
            OperationType::ElectrochemicalMeasurement => Some("measurement_cycle_complete"),
            OperationType::WashCleaning => Some("cleaning_complete"),
            _ => None,
        }
    }

    /// Operations run under the recovery manager's retry/restart policy.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            OperationType::SolutionPreparation
                | OperationType::ElectrodeSetup
                | OperationType::ElectrochemicalMeasurement
        )
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OperationRegistry
// ---------------------------------------------------------------------------

/// Lookup from step-type string to operation. Built once per engine.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    by_name: HashMap<&'static str, OperationType>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            by_name: OperationType::ALL
                .iter()
                .map(|op| (op.as_str(), *op))
                .collect(),
        }
    }

    pub fn resolve(&self, step_type: &str) -> Option<OperationType> {
        self.by_name.get(step_type).copied()
    }

    /// Registered type names, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        OperationType::ALL.iter().map(|op| op.as_str()).collect()
    }

    /// Check that every step names a registered type.
    pub fn validate(&self, steps: &[Step]) -> ValidationReport {
        let mut errors = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            let node_id = step.node_id(index);
            if step.step_type.is_empty() {
                errors.push(format!("Node {node_id} missing type"));
            } else if self.resolve(&step.step_type).is_none() {
                errors.push(format!(
                    "Node {node_id} has unknown type: {}",
                    step.step_type
                ));
            }
        }
        ValidationReport {
            valid: errors.is_empty(),
            errors,
            total_nodes: steps.len(),
        }
    }
}

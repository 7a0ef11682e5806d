//! Engine wiring: simulated controller plus file checkpoints.

use std::path::Path;
use std::sync::Arc;

use sdlab_core::engine::{EngineConfig, ExecutionEngine};
use sdlab_types::config::GlobalConfig;

use crate::checkpoint::FileCheckpointRepository;
use crate::controller::SimulatedController;
use crate::filesystem::checkpoint_dir;

/// Engine type the CLI runs.
pub type LabEngine = ExecutionEngine<SimulatedController, FileCheckpointRepository>;

/// Build an engine from configuration rooted at `data_dir`.
pub fn build_engine(config: &GlobalConfig, data_dir: &Path) -> LabEngine {
    build_engine_with(config, data_dir, EngineConfig::from_global(config, data_dir))
}

/// Like [`build_engine`], with explicit engine settings.
pub fn build_engine_with(config: &GlobalConfig, data_dir: &Path, engine: EngineConfig) -> LabEngine {
    let checkpoints = checkpoint_dir(config, data_dir);
    tracing::debug!(
        checkpoint_dir = %checkpoints.display(),
        export_dir = %engine.export_dir.display(),
        recovery = engine.recovery_enabled,
        "building engine"
    );
    let controller = Arc::new(SimulatedController::new(config.hardware.clone()));
    ExecutionEngine::new(controller, FileCheckpointRepository::new(checkpoints), engine)
}

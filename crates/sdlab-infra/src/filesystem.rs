//! Data directory layout.

use std::path::{Path, PathBuf};

use sdlab_types::config::GlobalConfig;

/// Resolve the sdlab data directory.
///
/// Priority:
/// 1. `SDLAB_DATA_DIR` environment variable
/// 2. `~/.sdlab`
/// 3. `.sdlab` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SDLAB_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".sdlab");
    }

    PathBuf::from(".sdlab")
}

/// Where checkpoint files and diagnostic dumps live.
pub fn checkpoint_dir(config: &GlobalConfig, data_dir: &Path) -> PathBuf {
    config
        .recovery
        .checkpoint_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("checkpoints"))
}

/// Where `serve` and `watch` save execution records.
pub fn results_dir(config: &GlobalConfig, data_dir: &Path) -> PathBuf {
    config
        .results
        .dir
        .clone()
        .unwrap_or_else(|| data_dir.join("execution_results"))
}

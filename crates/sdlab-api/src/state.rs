//! Application state shared by CLI commands and the HTTP server.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use sdlab_core::engine::OperationRegistry;
use sdlab_infra::config::load_global_config;
use sdlab_infra::controller::SimulatedController;
use sdlab_infra::filesystem::{resolve_data_dir, results_dir};
use sdlab_infra::lab::{LabEngine, build_engine};
use sdlab_infra::results::ResultStore;
use sdlab_types::config::GlobalConfig;

pub struct AppState {
    pub data_dir: PathBuf,
    pub config: GlobalConfig,
}

impl AppState {
    /// Resolve the data directory, make sure it exists and load `config.toml`.
    pub async fn init(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(resolve_data_dir);
        tokio::fs::create_dir_all(&data_dir).await?;
        let config = load_global_config(&data_dir).await;
        Ok(Self { data_dir, config })
    }

    pub fn results(&self) -> ResultStore {
        ResultStore::new(results_dir(&self.config, &self.data_dir))
    }

    /// State for the HTTP server: one engine driving the lab, shared by all
    /// requests.
    pub fn http(&self) -> HttpState {
        let engine = build_engine(&self.config, &self.data_dir);
        HttpState {
            controller: engine.controller().clone(),
            engine: Arc::new(Mutex::new(engine)),
            registry: Arc::new(OperationRegistry::new()),
            config: Arc::new(self.config.clone()),
            data_dir: self.data_dir.clone(),
            results: self.results(),
        }
    }
}

/// Cloned into every handler. Executions take the engine lock, so runs on
/// the lab are serialized; status and validation don't wait for them.
#[derive(Clone)]
pub struct HttpState {
    pub engine: Arc<Mutex<LabEngine>>,
    pub controller: Arc<SimulatedController>,
    pub registry: Arc<OperationRegistry>,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
    pub results: ResultStore,
}

impl HttpState {
    /// A throwaway engine for dry runs: dry-run hardware, no simulated
    /// delays, separate controller state.
    pub fn dry_run_engine(&self) -> LabEngine {
        let mut config = (*self.config).clone();
        config.hardware.dry_run = true;
        config.hardware.simulate_delays = false;
        build_engine(&config, &self.data_dir)
    }
}

//! Global configuration types for sdlab.
//!
//! `GlobalConfig` is the top-level `config.toml` in the data directory.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub results: ResultsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Recovery manager settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Attempt budget shared by retries and checkpoint restarts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause before a plain retry.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Defaults to `{data_dir}/checkpoints`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_dir: Option<PathBuf>,
    #[serde(default = "default_checkpoint_max_age_hours")]
    pub checkpoint_max_age_hours: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

fn default_checkpoint_max_age_hours() -> u64 {
    24
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            checkpoint_dir: None,
            checkpoint_max_age_hours: default_checkpoint_max_age_hours(),
        }
    }
}

/// Instrument endpoints. Only informational while `dry_run` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default = "default_robot_ip")]
    pub robot_ip: String,
    #[serde(default = "default_robot_port")]
    pub robot_port: u16,
    #[serde(default = "default_squidstat_port")]
    pub squidstat_port: String,
    #[serde(default)]
    pub squidstat_channel: u8,
    #[serde(default = "default_arduino_port")]
    pub arduino_port: String,
    #[serde(default = "default_true")]
    pub dry_run: bool,
    /// Actually sleep for simulated delays instead of returning at once.
    #[serde(default)]
    pub simulate_delays: bool,
}

fn default_robot_ip() -> String {
    "169.254.69.185".to_string()
}

fn default_robot_port() -> u16 {
    80
}

fn default_squidstat_port() -> String {
    "COM4".to_string()
}

fn default_arduino_port() -> String {
    "COM3".to_string()
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            robot_ip: default_robot_ip(),
            robot_port: default_robot_port(),
            squidstat_port: default_squidstat_port(),
            squidstat_channel: 0,
            arduino_port: default_arduino_port(),
            dry_run: true,
            simulate_delays: false,
        }
    }
}

/// Where data export writes files. Defaults to `{data_dir}/data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// Persisted execution records from `serve` and `watch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsConfig {
    /// Default for requests that don't say otherwise.
    #[serde(default = "default_true")]
    pub save: bool,
    /// Defaults to `{data_dir}/execution_results`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self { save: true, dir: None }
    }
}

/// HTTP listener for `sdlab serve`. CLI flags take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Inbox folders for `sdlab watch`. Each directory defaults to
/// `{data_dir}/workflows/{input,processing,completed,failed}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_dir: Option<PathBuf>,
    /// Quiet period before a burst of file events is delivered.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Execute claimed workflows. When off, valid files are only filed as completed.
    #[serde(default)]
    pub auto_execute: bool,
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            input_dir: None,
            processing_dir: None,
            completed_dir: None,
            failed_dir: None,
            debounce_ms: default_debounce_ms(),
            auto_execute: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GlobalConfig::default();
        assert!(config.recovery.enabled);
        assert_eq!(config.recovery.max_retries, 3);
        assert_eq!(config.recovery.retry_delay_ms, 2_000);
        assert_eq!(config.recovery.checkpoint_max_age_hours, 24);
        assert_eq!(config.hardware.robot_ip, "169.254.69.185");
        assert!(config.hardware.dry_run);
        assert!(config.results.save);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.watch.debounce_ms, 500);
        assert!(!config.watch.auto_execute);
    }

    #[test]
    fn watch_and_server_sections_parse() {
        let config: GlobalConfig = toml::from_str(
            r#"
[server]
port = 9100

[results]
save = false

[watch]
input_dir = "/srv/inbox"
auto_execute = true
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(!config.results.save);
        assert_eq!(config.watch.input_dir, Some(PathBuf::from("/srv/inbox")));
        assert!(config.watch.processing_dir.is_none());
        assert!(config.watch.auto_execute);
        assert_eq!(config.watch.debounce_ms, 500);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: GlobalConfig = toml::from_str(
            r#"
[recovery]
max_retries = 5

[hardware]
squidstat_port = "/dev/ttyACM0"
"#,
        )
        .unwrap();
        assert_eq!(config.recovery.max_retries, 5);
        assert!(config.recovery.enabled);
        assert_eq!(config.hardware.squidstat_port, "/dev/ttyACM0");
        assert_eq!(config.hardware.robot_port, 80);
        assert!(config.export.data_dir.is_none());
    }

    #[test]
    fn empty_toml_is_default() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config, GlobalConfig::default());
    }
}

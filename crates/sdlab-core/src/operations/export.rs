//! Data export: experiment buffers to CSV or JSON files.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use serde_json::{Value, json};

use sdlab_types::experiment::ExperimentData;
use sdlab_types::step::{OperationLogEntry, Params};

use super::{bool_param, str_param};

const DEFAULT_FILE_NAMING: &str = "{experiment_id}_{data_type}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "CSV" => Some(ExportFormat::Csv),
            "JSON" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Substitute `{experiment_id}` and `{data_type}` in a file-name template.
pub fn render_file_name(template: &str, experiment_id: &str, data_type: &str) -> String {
    template
        .replace("{experiment_id}", experiment_id)
        .replace("{data_type}", data_type)
}

/// Write the experiment data described by `params` under `default_dir`.
///
/// `data_path` in `params` overrides the directory. DC and AC rows each get a
/// file only when non-empty; metadata is written unless
/// `include_metadata = false`.
pub async fn export_experiment_data(
    default_dir: &Path,
    params: &Params,
    data: &ExperimentData,
    operation_log: &[OperationLogEntry],
) -> Result<Value, ExportError> {
    let format_name = str_param(params, "export_format", "CSV");
    let format = ExportFormat::parse(format_name)
        .ok_or_else(|| ExportError::UnsupportedFormat(format_name.to_string()))?;
    let template = str_param(params, "file_naming", DEFAULT_FILE_NAMING);
    let include_metadata = bool_param(params, "include_metadata", true);
    let dir = params
        .get("data_path")
        .and_then(Value::as_str)
        .map(PathBuf::from)
        .unwrap_or_else(|| default_dir.to_path_buf());

    let now = Local::now();
    let experiment_id = params
        .get("experiment_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| now.format("%Y%m%d_%H%M%S").to_string());

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|source| ExportError::Io {
            path: dir.clone(),
            source,
        })?;

    let mut exported = Vec::new();
    match format {
        ExportFormat::Csv => {
            if !data.dc_rows.is_empty() {
                let path = dir.join(render_file_name(template, &experiment_id, "dc") + ".csv");
                write_file(&path, &to_csv(&data.dc_rows)?).await?;
                exported.push(path);
            }
            if !data.ac_rows.is_empty() {
                let path = dir.join(render_file_name(template, &experiment_id, "ac") + ".csv");
                write_file(&path, &to_csv(&data.ac_rows)?).await?;
                exported.push(path);
            }
        }
        ExportFormat::Json => {
            let path = dir.join(render_file_name(template, &experiment_id, "data") + ".json");
            write_file(&path, &serde_json::to_vec_pretty(data)?).await?;
            exported.push(path);
        }
    }

    let data_points = json!({
        "dc_count": data.dc_rows.len(),
        "ac_count": data.ac_rows.len(),
    });

    if include_metadata {
        let metadata = json!({
            "experiment_id": experiment_id,
            "date": now.format("%Y-%m-%d").to_string(),
            "time": now.format("%H:%M:%S").to_string(),
            "status": "completed",
            "data_points": data_points,
            "operation_log": operation_log,
        });
        let path = dir.join(render_file_name(template, &experiment_id, "metadata") + ".json");
        write_file(&path, &serde_json::to_vec_pretty(&metadata)?).await?;
        exported.push(path);
    }

    tracing::info!(
        experiment_id = %experiment_id,
        files = exported.len(),
        dir = %dir.display(),
        "experiment data exported"
    );

    let files: Vec<String> = exported.iter().map(|p| p.display().to_string()).collect();
    Ok(json!({
        "status": "success",
        "operation": "data_export",
        "experiment_id": experiment_id,
        "file_count": files.len(),
        "exported_files": files,
        "export_format": format_name,
        "data_summary": {
            "dc_points": data.dc_rows.len(),
            "ac_points": data.ac_rows.len(),
        },
    }))
}

fn to_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })
}

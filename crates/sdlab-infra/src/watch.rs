//! Workflow inbox: a watched folder of workflow files.
//!
//! Provides:
//! - `WorkflowInbox` -- the input/processing/completed/failed folder set
//! - `start_inbox_watcher()` -- debounced watcher on the input folder
//! - `process_inbox_file()` -- claim, validate, optionally run, then file away
//!
//! A dropped-in `.json` file is claimed by moving it to the processing
//! folder as `{%Y%m%d_%H%M%S}_{name}`, then moved to completed or failed
//! under that same name.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
// notify types come through the debouncer's re-export so both agree on
// the notify version.
use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tokio::sync::mpsc;

use sdlab_core::engine::definition::parse_workflow;
use sdlab_types::config::WatchConfig;
use sdlab_types::record::{ExecutionRecord, ExecutionSource};
use sdlab_types::step::{WorkflowStatus, WorkflowSummary};

use crate::lab::LabEngine;
use crate::results::ResultStore;

/// Size checks made before a file that keeps growing is given up on.
const MAX_STABLE_CHECKS: u32 = 10;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watcher creation failed: {0}")]
    WatcherCreation(String),

    #[error("failed to watch path '{path}': {reason}")]
    WatchPath { path: String, reason: String },

    #[error("io error: {0}")]
    Io(String),
}

fn io_error(path: &Path, e: std::io::Error) -> WatchError {
    WatchError::Io(format!("{}: {e}", path.display()))
}

/// `.json` files only; editors' dotfiles are ignored.
pub fn is_workflow_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('.'));
    !hidden && path.extension().and_then(|e| e.to_str()) == Some("json")
}

// ---------------------------------------------------------------------------
// WorkflowInbox
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WorkflowInbox {
    pub input: PathBuf,
    pub processing: PathBuf,
    pub completed: PathBuf,
    pub failed: PathBuf,
    /// Pause between size checks while a file is still being written.
    pub stable_interval: Duration,
}

impl WorkflowInbox {
    /// Folders from `[watch]`, each defaulting to `{data_dir}/workflows/<name>`.
    pub fn from_config(config: &WatchConfig, data_dir: &Path) -> Self {
        let base = data_dir.join("workflows");
        let pick = |dir: &Option<PathBuf>, name: &str| dir.clone().unwrap_or_else(|| base.join(name));
        Self {
            input: pick(&config.input_dir, "input"),
            processing: pick(&config.processing_dir, "processing"),
            completed: pick(&config.completed_dir, "completed"),
            failed: pick(&config.failed_dir, "failed"),
            stable_interval: Duration::from_secs(1),
        }
    }

    pub async fn ensure_dirs(&self) -> Result<(), WatchError> {
        for dir in [&self.input, &self.processing, &self.completed, &self.failed] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| io_error(dir, e))?;
        }
        Ok(())
    }

    /// Workflow files already waiting in the input folder, oldest name first.
    pub async fn pending(&self) -> Result<Vec<PathBuf>, WatchError> {
        let mut entries = match tokio::fs::read_dir(&self.input).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.input, e)),
        };
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.input, e))?
        {
            let path = entry.path();
            if is_workflow_file(&path) && entry.file_type().await.is_ok_and(|t| t.is_file()) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Wait until `path` has a non-zero size that stopped changing.
    /// `false` when the file vanished or kept changing.
    pub async fn wait_until_stable(&self, path: &Path) -> bool {
        let Ok(meta) = tokio::fs::metadata(path).await else {
            return false;
        };
        let mut last = meta.len();
        for _ in 0..MAX_STABLE_CHECKS {
            tokio::time::sleep(self.stable_interval).await;
            let Ok(meta) = tokio::fs::metadata(path).await else {
                return false;
            };
            if meta.len() == last && last > 0 {
                return true;
            }
            last = meta.len();
        }
        false
    }

    /// Move an input file into the processing folder under a timestamped name.
    pub async fn claim(&self, path: &Path) -> Result<PathBuf, WatchError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| WatchError::Io(format!("{}: no file name", path.display())))?;
        let claimed = self
            .processing
            .join(format!("{}_{name}", Utc::now().format("%Y%m%d_%H%M%S")));
        tokio::fs::rename(path, &claimed)
            .await
            .map_err(|e| io_error(path, e))?;
        tracing::info!(from = %path.display(), to = %claimed.display(), "workflow file claimed");
        Ok(claimed)
    }

    /// Move a claimed file to the completed or failed folder.
    pub async fn finish(&self, claimed: &Path, succeeded: bool) -> Result<PathBuf, WatchError> {
        let dir = if succeeded { &self.completed } else { &self.failed };
        let name = claimed
            .file_name()
            .ok_or_else(|| WatchError::Io(format!("{}: no file name", claimed.display())))?;
        let target = dir.join(name);
        tokio::fs::rename(claimed, &target)
            .await
            .map_err(|e| io_error(claimed, e))?;
        Ok(target)
    }
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum InboxOutcome {
    /// Valid, and either run to completion or filed without running.
    Completed {
        filed: PathBuf,
        summary: Option<WorkflowSummary>,
    },
    /// Unparseable, invalid, or finished with failed steps.
    Failed { filed: PathBuf, reason: String },
    /// Gone or never settled; left where it was.
    Skipped { reason: String },
}

/// Options for one inbox pass.
#[derive(Debug, Clone, Copy)]
pub struct InboxRun<'a> {
    pub auto_execute: bool,
    pub results: Option<&'a ResultStore>,
}

/// Claim `path`, check it, run it when `auto_execute` is set, and file it.
pub async fn process_inbox_file(
    engine: &mut LabEngine,
    inbox: &WorkflowInbox,
    path: &Path,
    run: InboxRun<'_>,
) -> Result<InboxOutcome, WatchError> {
    if !inbox.wait_until_stable(path).await {
        tracing::warn!(path = %path.display(), "workflow file incomplete, skipping");
        return Ok(InboxOutcome::Skipped {
            reason: "file missing, empty or still being written".to_string(),
        });
    }

    let claimed = match inbox.claim(path).await {
        Ok(claimed) => claimed,
        Err(WatchError::Io(reason)) if !path.exists() => {
            // Another pass got there first.
            return Ok(InboxOutcome::Skipped { reason });
        }
        Err(e) => return Err(e),
    };
    let file = claimed.display().to_string();

    let content = match tokio::fs::read_to_string(&claimed).await {
        Ok(content) => content,
        Err(e) => return file_failure(inbox, &claimed, format!("read error: {e}")).await,
    };
    let document = match parse_workflow(&content) {
        Ok(document) => document,
        Err(e) => return file_failure(inbox, &claimed, e.to_string()).await,
    };
    if document.steps().is_empty() {
        return file_failure(inbox, &claimed, "workflow has no nodes".to_string()).await;
    }
    let report = engine.validate_workflow(document.steps());
    if !report.valid {
        return file_failure(inbox, &claimed, report.errors.join("; ")).await;
    }

    if !run.auto_execute {
        tracing::info!(file = %file, nodes = report.total_nodes, "auto execute off, filing as completed");
        let filed = inbox.finish(&claimed, true).await?;
        return Ok(InboxOutcome::Completed {
            filed,
            summary: None,
        });
    }

    let summary = engine.execute_document(&document, None).await;
    if let Some(store) = run.results {
        let record = ExecutionRecord {
            timestamp: Utc::now(),
            source: ExecutionSource::Watch { file: file.clone() },
            dry_run: engine.controller().is_dry_run(),
            workflow: document,
            summary: summary.clone(),
            recovery_statistics: engine.recovery_statistics(),
        };
        if let Err(e) = store.save(&record).await {
            tracing::warn!(error = %e, "failed to save execution record");
        }
    }

    if summary.status == WorkflowStatus::Completed {
        tracing::info!(file = %file, workflow_id = %summary.workflow_id, "workflow file completed");
        let filed = inbox.finish(&claimed, true).await?;
        Ok(InboxOutcome::Completed {
            filed,
            summary: Some(summary),
        })
    } else {
        let reason = format!(
            "{} of {} nodes failed",
            summary.failed_nodes.len(),
            summary.total_nodes
        );
        let filed = inbox.finish(&claimed, false).await?;
        tracing::error!(file = %file, workflow_id = %summary.workflow_id, reason = %reason, "workflow file failed");
        Ok(InboxOutcome::Failed { filed, reason })
    }
}

async fn file_failure(
    inbox: &WorkflowInbox,
    claimed: &Path,
    reason: String,
) -> Result<InboxOutcome, WatchError> {
    tracing::error!(file = %claimed.display(), reason = %reason, "workflow file rejected");
    let filed = inbox.finish(claimed, false).await?;
    Ok(InboxOutcome::Failed { filed, reason })
}

// ---------------------------------------------------------------------------
// Watcher lifecycle
// ---------------------------------------------------------------------------

/// Keeps the inbox watcher alive; dropping it stops the watch.
pub struct WatcherHandle {
    _debouncer: Debouncer<RecommendedWatcher>,
    watched: PathBuf,
}

impl WatcherHandle {
    pub fn watched_path(&self) -> &Path {
        &self.watched
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        tracing::debug!(path = %self.watched.display(), "inbox watcher dropped");
    }
}

/// Watch `dir` (not recursively) and emit batches of workflow file paths.
pub fn start_inbox_watcher(
    dir: &Path,
    debounce_ms: u64,
) -> Result<(WatcherHandle, mpsc::Receiver<Vec<PathBuf>>), WatchError> {
    let (tx, rx) = mpsc::channel::<Vec<PathBuf>>(64);

    let mut debouncer = new_debouncer(
        Duration::from_millis(debounce_ms),
        move |result: DebounceEventResult| match result {
            Ok(events) => {
                let mut paths: Vec<PathBuf> = events
                    .into_iter()
                    .map(|e| e.path)
                    .filter(|p| is_workflow_file(p) && p.is_file())
                    .collect();
                paths.sort();
                paths.dedup();
                if paths.is_empty() {
                    return;
                }
                tracing::debug!(count = paths.len(), "inbox events");
                // Dropped batches are picked up by the next pending() scan.
                let _ = tx.try_send(paths);
            }
            Err(err) => {
                tracing::warn!(error = %err, "inbox watcher error");
            }
        },
    )
    .map_err(|e| WatchError::WatcherCreation(e.to_string()))?;

    debouncer
        .watcher()
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| WatchError::WatchPath {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
    tracing::info!(path = %dir.display(), "inbox watcher started");

    Ok((
        WatcherHandle {
            _debouncer: debouncer,
            watched: dir.to_path_buf(),
        },
        rx,
    ))
}

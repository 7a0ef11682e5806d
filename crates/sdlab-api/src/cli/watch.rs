//! `sdlab watch`: process workflow files dropped into the inbox folder.

use std::future::Future;
use std::path::Path;

use anyhow::Result;
use console::style;
use serde::Serialize;

use sdlab_infra::lab::{LabEngine, build_engine};
use sdlab_infra::watch::{
    InboxOutcome, InboxRun, WorkflowInbox, process_inbox_file, start_inbox_watcher,
};

use crate::state::AppState;

pub struct WatchOptions {
    pub execute: bool,
    pub once: bool,
}

/// One processed file, as printed with `--json` (one object per line).
#[derive(Debug, Serialize)]
struct Processed {
    file: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl Processed {
    fn from_outcome(file: &Path, outcome: &InboxOutcome) -> Self {
        let file = file.display().to_string();
        match outcome {
            InboxOutcome::Completed { filed, summary } => Self {
                file,
                outcome: "completed",
                filed: Some(filed.display().to_string()),
                workflow_id: summary.as_ref().map(|s| s.workflow_id.clone()),
                reason: None,
            },
            InboxOutcome::Failed { filed, reason } => Self {
                file,
                outcome: "failed",
                filed: Some(filed.display().to_string()),
                workflow_id: None,
                reason: Some(reason.clone()),
            },
            InboxOutcome::Skipped { reason } => Self {
                file,
                outcome: "skipped",
                filed: None,
                workflow_id: None,
                reason: Some(reason.clone()),
            },
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    completed: usize,
    failed: usize,
    skipped: usize,
}

struct Watcher<'a> {
    engine: LabEngine,
    inbox: WorkflowInbox,
    run: InboxRun<'a>,
    tally: Tally,
    json: bool,
    quiet: bool,
}

impl Watcher<'_> {
    async fn handle(&mut self, path: &Path) {
        let outcome = match process_inbox_file(&mut self.engine, &self.inbox, path, self.run).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "inbox processing failed");
                InboxOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        };
        match &outcome {
            InboxOutcome::Completed { .. } => self.tally.completed += 1,
            InboxOutcome::Failed { .. } => self.tally.failed += 1,
            InboxOutcome::Skipped { .. } => self.tally.skipped += 1,
        }
        self.report(&Processed::from_outcome(path, &outcome));
    }

    fn report(&self, processed: &Processed) {
        if self.json {
            match serde_json::to_string(processed) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to serialize inbox outcome"),
            }
            return;
        }
        if self.quiet {
            return;
        }
        let marker = match processed.outcome {
            "completed" => style("✓").green().bold(),
            "failed" => style("✗").red().bold(),
            _ => style("-").dim(),
        };
        let detail = processed
            .reason
            .as_deref()
            .or(processed.workflow_id.as_deref())
            .unwrap_or("");
        println!(
            "  {marker} {} {}",
            style(&processed.file).bold(),
            style(detail).dim()
        );
    }
}

/// Run the inbox until `shutdown` resolves, or drain it once with `--once`.
/// Returns `false` when any file failed.
pub async fn watch(
    state: &AppState,
    options: WatchOptions,
    shutdown: impl Future<Output = ()>,
    json: bool,
    quiet: bool,
) -> Result<bool> {
    let inbox = WorkflowInbox::from_config(&state.config.watch, &state.data_dir);
    inbox.ensure_dirs().await?;

    let results = state.config.results.save.then(|| state.results());
    let auto_execute = options.execute || state.config.watch.auto_execute;
    let mut watcher = Watcher {
        engine: build_engine(&state.config, &state.data_dir),
        inbox,
        run: InboxRun {
            auto_execute,
            results: results.as_ref(),
        },
        tally: Tally::default(),
        json,
        quiet,
    };

    // Files that arrived while nobody was watching.
    for path in watcher.inbox.pending().await? {
        watcher.handle(&path).await;
    }

    if !options.once {
        let (handle, mut rx) =
            start_inbox_watcher(&watcher.inbox.input, state.config.watch.debounce_ms)?;
        if !json && !quiet {
            println!(
                "  {} Watching {} (auto execute {})",
                style("👁").bold(),
                style(handle.watched_path().display()).cyan(),
                if auto_execute { "on" } else { "off" }
            );
            println!("  {}", style("Press Ctrl+C to stop").dim());
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                batch = rx.recv() => {
                    let Some(batch) = batch else { break };
                    for path in batch {
                        // Already handled by an earlier batch.
                        if path.exists() {
                            watcher.handle(&path).await;
                        }
                    }
                }
            }
        }
        drop(handle);
    }

    let tally = &watcher.tally;
    tracing::info!(
        completed = tally.completed,
        failed = tally.failed,
        skipped = tally.skipped,
        "inbox watch finished"
    );
    if !json && !quiet {
        println!(
            "\n  {} completed, {} failed, {} skipped",
            style(tally.completed).green(),
            style(tally.failed).red(),
            style(tally.skipped).dim()
        );
    }
    Ok(tally.failed == 0)
}

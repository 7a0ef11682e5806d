//! `sdlab run`: execute a workflow file.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;

use sdlab_core::engine::EngineConfig;
use sdlab_core::engine::definition::load_workflow_file;
use sdlab_infra::controller::FaultSpec;
use sdlab_infra::lab::build_engine_with;
use sdlab_types::recovery::RecoveryReport;
use sdlab_types::step::{StepStatus, WorkflowStatus, WorkflowSummary};

use crate::state::AppState;

pub struct RunOptions {
    pub no_recovery: bool,
    pub max_retries: Option<u32>,
    pub workflow_id: Option<String>,
    pub inject_fault: Vec<FaultSpec>,
}

#[derive(Serialize)]
struct RunReport<'a> {
    summary: &'a WorkflowSummary,
    recovery_statistics: &'a RecoveryReport,
}

/// Run the workflow at `file`. Returns whether it completed without errors.
pub async fn run_workflow(
    state: &AppState,
    file: &Path,
    options: RunOptions,
    json: bool,
    quiet: bool,
) -> Result<bool> {
    let document = load_workflow_file(file)
        .with_context(|| format!("failed to load workflow {}", file.display()))?;
    tracing::debug!(path = %file.display(), steps = document.steps().len(), "workflow loaded");

    let mut settings = EngineConfig::from_global(&state.config, &state.data_dir);
    if options.no_recovery {
        settings.recovery_enabled = false;
    }
    if let Some(max_retries) = options.max_retries {
        settings.max_retries = max_retries;
    }

    let mut engine = build_engine_with(&state.config, &state.data_dir, settings);
    for spec in options.inject_fault {
        engine.controller().inject_fault(spec);
    }

    let report = engine.validate_workflow(document.steps());
    if !report.valid && !json && !quiet {
        for error in &report.errors {
            eprintln!("  {} {error}", style("!").yellow().bold());
        }
    }

    let summary = engine.execute_document(&document, options.workflow_id).await;
    let stats = engine.recovery_statistics();
    let ok = summary.status == WorkflowStatus::Completed;

    if json {
        let report = RunReport {
            summary: &summary,
            recovery_statistics: &stats,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ok);
    }
    if quiet {
        return Ok(ok);
    }

    print_summary(&summary, &stats);
    Ok(ok)
}

fn print_summary(summary: &WorkflowSummary, stats: &RecoveryReport) {
    println!();
    let title = summary.workflow_name.as_deref().unwrap_or("Workflow");
    println!(
        "  {} {} ({})",
        style("▶").bold(),
        style(title).cyan().bold(),
        style(&summary.workflow_id).dim()
    );
    println!();

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(Color::Cyan),
            Cell::new("Node"),
            Cell::new("Type"),
            Cell::new("Status"),
            Cell::new("Attempts"),
            Cell::new("Message"),
        ]);

    for result in &summary.results {
        let status_cell = match result.status {
            StepStatus::Success => Cell::new("success").fg(Color::Green),
            StepStatus::Error => Cell::new("error").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(result.node_index),
            Cell::new(&result.node_id),
            Cell::new(&result.node_type),
            status_cell,
            Cell::new(result.attempts.map(|n| n.to_string()).unwrap_or_else(|| "-".into())),
            Cell::new(result.message.as_deref().unwrap_or("")),
        ]);
    }
    println!("{table}");
    println!();

    let status = match summary.status {
        WorkflowStatus::Completed => style(summary.status.to_string()).green(),
        WorkflowStatus::CompletedWithErrors => style(summary.status.to_string()).red(),
    };
    println!("  Status:     {status}");
    println!(
        "  Executed:   {}/{} ({} successful, {} failed)",
        summary.executed_nodes,
        summary.total_nodes,
        summary.successful_nodes,
        summary.failed_nodes.len()
    );
    if let Some(index) = summary.aborted_at {
        println!("  {}", style(format!("Aborted at step {index}")).yellow());
    }

    println!();
    println!("  {}", style("── Recovery ──").dim());
    println!("  Errors:       {}", stats.stats.total_errors);
    println!(
        "  Recoveries:   {} ok, {} failed ({}%)",
        stats.stats.successful_recoveries, stats.stats.failed_recoveries, stats.success_rate
    );
    if stats.stats.manual_interventions > 0 {
        println!(
            "  Manual:       {}",
            style(stats.stats.manual_interventions).yellow()
        );
    }
    println!("  Checkpoints:  {}", stats.total_checkpoints);
    println!();
}

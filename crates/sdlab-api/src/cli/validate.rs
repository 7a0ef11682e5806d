//! `sdlab validate`: check step types without running anything.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use sdlab_core::engine::OperationRegistry;
use sdlab_core::engine::definition::load_workflow_file;

/// Returns whether the workflow is valid.
pub async fn validate(file: &Path, json: bool) -> Result<bool> {
    let document = load_workflow_file(file)
        .with_context(|| format!("failed to load workflow {}", file.display()))?;
    let report = OperationRegistry::new().validate(document.steps());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.valid);
    }

    println!();
    if report.valid {
        println!(
            "  {} {} ({} steps)",
            style("✓").green(),
            file.display(),
            report.total_nodes
        );
    } else {
        println!(
            "  {} {} ({} steps, {} problems)",
            style("✗").red(),
            file.display(),
            report.total_nodes,
            report.errors.len()
        );
        for error in &report.errors {
            println!("    {error}");
        }
    }
    println!();
    Ok(report.valid)
}

//! `sdlab status`: configuration and checkpoint storage overview.

use std::path::Path;

use anyhow::Result;
use console::style;

use sdlab_core::engine::EngineConfig;
use sdlab_infra::filesystem::checkpoint_dir;

use crate::state::AppState;

#[derive(Debug, Default, PartialEq, Eq)]
struct StorageCounts {
    checkpoints: usize,
    dumps: usize,
}

async fn count_files(dir: &Path) -> StorageCounts {
    let mut counts = StorageCounts::default();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return counts;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.ends_with(".json") {
            continue;
        }
        if name.starts_with("emergency_") {
            counts.dumps += 1;
        } else {
            counts.checkpoints += 1;
        }
    }
    counts
}

pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let engine = EngineConfig::from_global(&state.config, &state.data_dir);
    let checkpoints = checkpoint_dir(&state.config, &state.data_dir);
    let counts = count_files(&checkpoints).await;
    let hardware = &state.config.hardware;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "recovery": {
                "enabled": engine.recovery_enabled,
                "max_retries": engine.max_retries,
                "retry_delay_ms": engine.retry_delay.as_millis() as u64,
                "checkpoint_dir": checkpoints.display().to_string(),
                "checkpoint_max_age_hours": state.config.recovery.checkpoint_max_age_hours,
            },
            "storage": {
                "checkpoints": counts.checkpoints,
                "dumps": counts.dumps,
            },
            "export_dir": engine.export_dir.display().to_string(),
            "hardware": hardware,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} sdlab v{}", style("⚗").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Recovery ──").dim());
    let enabled = if engine.recovery_enabled {
        style("enabled").green()
    } else {
        style("disabled").yellow()
    };
    println!("  Recovery:     {enabled}");
    println!("  Max retries:  {}", engine.max_retries);
    println!("  Retry delay:  {} ms", engine.retry_delay.as_millis());
    println!();

    println!("  {}", style("── Storage ──").dim());
    println!("  Data:         {}", state.data_dir.display());
    println!("  Checkpoints:  {} ({} files)", checkpoints.display(), counts.checkpoints);
    if counts.dumps > 0 {
        println!("  Dumps:        {}", style(counts.dumps).red());
    }
    println!("  Export:       {}", engine.export_dir.display());
    println!();

    println!("  {}", style("── Hardware ──").dim());
    let mode = if hardware.dry_run {
        style("dry run").yellow()
    } else {
        style("simulated").cyan()
    };
    println!("  Mode:         {mode}");
    println!("  Robot:        {}:{}", hardware.robot_ip, hardware.robot_port);
    println!(
        "  Potentiostat: {} (channel {})",
        hardware.squidstat_port, hardware.squidstat_channel
    );
    println!("  Pumps:        {}", hardware.arduino_port);
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn counts_checkpoints_and_dumps_separately() {
        let tmp = TempDir::new().unwrap();
        for name in ["wf_1_a.json", "wf_1_b.json", "emergency_wf_1_1.json", "notes.txt"] {
            tokio::fs::write(tmp.path().join(name), "{}").await.unwrap();
        }
        let counts = count_files(tmp.path()).await;
        assert_eq!(counts, StorageCounts { checkpoints: 2, dumps: 1 });

        let missing = count_files(&tmp.path().join("missing")).await;
        assert_eq!(missing, StorageCounts::default());
    }
}

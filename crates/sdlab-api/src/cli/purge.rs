//! `sdlab purge`: remove stale checkpoint files and dumps.

use std::time::Duration;

use anyhow::Result;
use console::style;

use sdlab_core::repository::checkpoint::CheckpointRepository;
use sdlab_infra::checkpoint::FileCheckpointRepository;
use sdlab_infra::filesystem::checkpoint_dir;

use crate::state::AppState;

pub async fn purge(state: &AppState, max_age_hours: Option<u64>, json: bool) -> Result<()> {
    let hours = max_age_hours.unwrap_or(state.config.recovery.checkpoint_max_age_hours);
    let dir = checkpoint_dir(&state.config, &state.data_dir);
    let repo = FileCheckpointRepository::new(&dir);
    let removed = repo
        .purge_older_than(Duration::from_secs(hours.saturating_mul(3600)))
        .await?;

    if json {
        let out = serde_json::json!({
            "checkpoint_dir": dir.display().to_string(),
            "max_age_hours": hours,
            "removed": removed,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "  {} Removed {} file(s) older than {hours}h from {}",
            style("✓").green(),
            style(removed).bold(),
            dir.display()
        );
    }
    Ok(())
}

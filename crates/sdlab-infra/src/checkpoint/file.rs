//! File-backed checkpoint repository.
//!
//! Implements `CheckpointRepository` from `sdlab-core`. Each checkpoint is a
//! pretty-printed JSON file named `{workflow_id}_{checkpoint_id}.json`; each
//! diagnostic dump is `emergency_{workflow_id}_{unix_ts}.json`. Files are
//! created with `create_new`, so an existing record is never overwritten.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tokio::io::AsyncWriteExt;

use sdlab_core::repository::checkpoint::CheckpointRepository;
use sdlab_types::checkpoint::Checkpoint;
use sdlab_types::error::RepositoryError;
use sdlab_types::recovery::DiagnosticDump;

/// Upper bound on `_n` suffixes tried when two dumps land in the same second.
const MAX_DUMP_SUFFIX: u32 = 100;

pub struct FileCheckpointRepository {
    dir: PathBuf,
}

impl FileCheckpointRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a checkpoint of `workflow_id`.
    pub fn checkpoint_path(&self, workflow_id: &str, checkpoint_id: &str) -> PathBuf {
        self.dir.join(format!("{workflow_id}_{checkpoint_id}.json"))
    }

    async fn ensure_dir(&self) -> Result<(), RepositoryError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| RepositoryError::Io(format!("{}: {e}", self.dir.display())))
    }
}

/// Write `bytes` to a file that must not exist yet.
pub(crate) async fn write_new(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await
}

impl CheckpointRepository for FileCheckpointRepository {
    async fn persist(&self, workflow_id: &str, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        self.ensure_dir().await?;
        let json = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let path = self.checkpoint_path(workflow_id, &checkpoint.id);

        write_new(&path, &json).await.map_err(|e| {
            RepositoryError::Io(format!("{}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "checkpoint written");
        Ok(())
    }

    async fn write_dump(&self, dump: &DiagnosticDump) -> Result<String, RepositoryError> {
        self.ensure_dir().await?;
        let json = serde_json::to_vec_pretty(dump)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let workflow_id = dump.workflow_id.as_deref().unwrap_or("unscoped");
        let stem = format!("emergency_{workflow_id}_{}", Utc::now().timestamp());

        for n in 0..MAX_DUMP_SUFFIX {
            let name = if n == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{n}.json")
            };
            let path = self.dir.join(name);
            match write_new(&path, &json).await {
                Ok(()) => return Ok(path.display().to_string()),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(RepositoryError::Io(format!("{}: {e}", path.display()))),
            }
        }
        Err(RepositoryError::Io(format!(
            "no free dump file name for {stem} in {}",
            self.dir.display()
        )))
    }

    async fn purge_older_than(&self, max_age: Duration) -> Result<usize, RepositoryError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(RepositoryError::Io(format!("{}: {e}", self.dir.display()))),
        };

        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RepositoryError::Io(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            if modified < cutoff {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| RepositoryError::Io(format!("{}: {e}", path.display())))?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, dir = %self.dir.display(), "purged old checkpoint files");
        }
        Ok(removed)
    }
}

//! Checkpoint repository trait and an in-memory implementation.
//!
//! The durable backend (`FileCheckpointRepository` in sdlab-infra) writes one
//! JSON file per checkpoint and per diagnostic dump. The in-memory backend
//! keeps the same records in vectors so recovery logic can be exercised
//! without touching the filesystem.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use sdlab_types::checkpoint::Checkpoint;
use sdlab_types::error::RepositoryError;
use sdlab_types::recovery::DiagnosticDump;

/// Storage backend for checkpoints and diagnostic dumps.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait CheckpointRepository: Send + Sync {
    /// Durably record a checkpoint under `{workflow_id}_{checkpoint.id}`.
    fn persist(
        &self,
        workflow_id: &str,
        checkpoint: &Checkpoint,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Write a diagnostic dump. Returns where it landed.
    fn write_dump(
        &self,
        dump: &DiagnosticDump,
    ) -> impl Future<Output = Result<String, RepositoryError>> + Send;

    /// Delete records older than `max_age`. Returns how many were removed.
    fn purge_older_than(
        &self,
        max_age: Duration,
    ) -> impl Future<Output = Result<usize, RepositoryError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryCheckpointRepository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredCheckpoint {
    key: String,
    checkpoint: Checkpoint,
    stored_at: DateTime<Utc>,
}

/// In-memory repository. Records are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryCheckpointRepository {
    checkpoints: Mutex<Vec<StoredCheckpoint>>,
    dumps: Mutex<Vec<DiagnosticDump>>,
    unavailable: Mutex<bool>,
}

impl MemoryCheckpointRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, simulating a full or missing disk.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut flag) = self.unavailable.lock() {
            *flag = unavailable;
        }
    }

    /// Keys (`{workflow_id}_{checkpoint_id}`) of every persisted checkpoint.
    pub fn keys(&self) -> Vec<String> {
        self.checkpoints
            .lock()
            .map(|stored| stored.iter().map(|s| s.key.clone()).collect())
            .unwrap_or_default()
    }

    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.checkpoints
            .lock()
            .map(|stored| stored.iter().map(|s| s.checkpoint.clone()).collect())
            .unwrap_or_default()
    }

    pub fn dumps(&self) -> Vec<DiagnosticDump> {
        self.dumps.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        match self.unavailable.lock() {
            Ok(flag) if *flag => Err(RepositoryError::Unavailable(
                "memory repository marked unavailable".to_string(),
            )),
            Ok(_) => Ok(()),
            Err(_) => Err(RepositoryError::Unavailable("lock poisoned".to_string())),
        }
    }
}

impl CheckpointRepository for MemoryCheckpointRepository {
    async fn persist(&self, workflow_id: &str, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        self.check_available()?;
        let key = format!("{workflow_id}_{}", checkpoint.id);
        let mut stored = self
            .checkpoints
            .lock()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))?;
        if stored.iter().any(|s| s.key == key) {
            return Err(RepositoryError::Io(format!("checkpoint {key} already exists")));
        }
        stored.push(StoredCheckpoint {
            key,
            checkpoint: checkpoint.clone(),
            stored_at: Utc::now(),
        });
        Ok(())
    }

    async fn write_dump(&self, dump: &DiagnosticDump) -> Result<String, RepositoryError> {
        self.check_available()?;
        let mut dumps = self
            .dumps
            .lock()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))?;
        dumps.push(dump.clone());
        Ok(format!("memory://dumps/{}", dumps.len() - 1))
    }

    async fn purge_older_than(&self, max_age: Duration) -> Result<usize, RepositoryError> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let cutoff = Utc::now() - max_age;

        let mut stored = self
            .checkpoints
            .lock()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))?;
        let before = stored.len();
        stored.retain(|s| s.stored_at >= cutoff);
        let mut removed = before - stored.len();

        let mut dumps = self
            .dumps
            .lock()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))?;
        let before = dumps.len();
        dumps.retain(|d| d.timestamp >= cutoff);
        removed += before - dumps.len();

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdlab_types::step::Params;

    #[tokio::test]
    async fn persist_keys_by_workflow_and_checkpoint() {
        let repo = MemoryCheckpointRepository::new();
        let cp = Checkpoint::new("solution_preparation_complete", 1, Params::new());
        repo.persist("wf-1", &cp).await.unwrap();
        assert_eq!(repo.keys(), vec![format!("wf-1_{}", cp.id)]);
    }

    #[tokio::test]
    async fn persist_refuses_to_overwrite() {
        let repo = MemoryCheckpointRepository::new();
        let cp = Checkpoint::new("a", 0, Params::new());
        repo.persist("wf", &cp).await.unwrap();
        assert!(repo.persist("wf", &cp).await.is_err());
        assert_eq!(repo.checkpoints().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_repository_fails_writes() {
        let repo = MemoryCheckpointRepository::new();
        repo.set_unavailable(true);
        let cp = Checkpoint::new("a", 0, Params::new());
        assert!(matches!(
            repo.persist("wf", &cp).await,
            Err(RepositoryError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn purge_with_zero_age_removes_everything() {
        let repo = MemoryCheckpointRepository::new();
        repo.persist("wf", &Checkpoint::new("a", 0, Params::new()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let removed = repo.purge_older_than(Duration::ZERO).await.unwrap();
        assert_eq!(removed, 1);
        assert!(repo.checkpoints().is_empty());
    }

    #[tokio::test]
    async fn purge_keeps_fresh_records() {
        let repo = MemoryCheckpointRepository::new();
        repo.persist("wf", &Checkpoint::new("a", 0, Params::new()))
            .await
            .unwrap();
        let removed = repo
            .purge_older_than(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(repo.checkpoints().len(), 1);
    }
}

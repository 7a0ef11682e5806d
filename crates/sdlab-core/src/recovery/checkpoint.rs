//! Run-scoped checkpoint store.
//!
//! Keeps the ordered in-memory list of checkpoints for the active run and
//! mirrors every save to a [`CheckpointRepository`]. The in-memory list is
//! authoritative: a failed durable write is reported but the checkpoint stays
//! usable for rollback.

use std::time::Duration;

use sdlab_types::checkpoint::Checkpoint;
use sdlab_types::step::Params;

use crate::repository::checkpoint::CheckpointRepository;

/// Workflow id used before any run has started.
const UNSCOPED_WORKFLOW: &str = "unscoped";

// ---------------------------------------------------------------------------
// CheckpointStore
// ---------------------------------------------------------------------------

pub struct CheckpointStore<R: CheckpointRepository> {
    repo: R,
    workflow_id: Option<String>,
    checkpoints: Vec<Checkpoint>,
}

impl<R: CheckpointRepository> CheckpointStore<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            workflow_id: None,
            checkpoints: Vec::new(),
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Start a new run: forget every checkpoint of the previous one.
    pub fn begin(&mut self, workflow_id: impl Into<String>) {
        self.workflow_id = Some(workflow_id.into());
        self.checkpoints.clear();
    }

    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Append a checkpoint and write it to the repository.
    ///
    /// Rejects a `step_index` lower than the previous checkpoint's. When the
    /// durable write fails the checkpoint is still kept in memory and
    /// [`CheckpointError::Persistence`] carries its id.
    pub async fn save(
        &mut self,
        name: &str,
        step_index: usize,
        state: Params,
    ) -> Result<String, CheckpointError> {
        if let Some(last) = self.checkpoints.last() {
            if step_index < last.step_index {
                return Err(CheckpointError::OutOfOrder {
                    step_index,
                    previous: last.step_index,
                });
            }
        }

        let mut checkpoint = Checkpoint::new(name, step_index, state);
        let base_id = checkpoint.id.clone();
        let mut suffix = 1;
        while self.checkpoints.iter().any(|c| c.id == checkpoint.id) {
            checkpoint.id = format!("{base_id}_{suffix}");
            suffix += 1;
        }

        let id = checkpoint.id.clone();
        let workflow_id = self
            .workflow_id
            .clone()
            .unwrap_or_else(|| UNSCOPED_WORKFLOW.to_string());
        let persisted = self.repo.persist(&workflow_id, &checkpoint).await;
        self.checkpoints.push(checkpoint);

        match persisted {
            Ok(()) => {
                tracing::debug!(workflow_id, checkpoint_id = %id, step_index, "checkpoint saved");
                Ok(id)
            }
            Err(e) => Err(CheckpointError::Persistence {
                checkpoint_id: id,
                message: e.to_string(),
            }),
        }
    }

    /// Most recent checkpoint, optionally restricted to one name.
    pub fn latest(&self, name: Option<&str>) -> Option<&Checkpoint> {
        match name {
            None => self.checkpoints.last(),
            Some(name) => self.checkpoints.iter().rev().find(|c| c.name == name),
        }
    }

    /// Newest checkpoint taken strictly before `step_index`.
    pub fn find_prior_to(&self, step_index: usize) -> Option<&Checkpoint> {
        self.checkpoints
            .iter()
            .rev()
            .find(|c| c.step_index < step_index)
    }

    /// Delete durable records older than `max_age`. The in-memory list is
    /// left alone.
    pub async fn purge_older_than(&self, max_age: Duration) -> Result<usize, CheckpointError> {
        let removed = self
            .repo
            .purge_older_than(max_age)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))?;
        tracing::info!(removed, max_age_secs = max_age.as_secs(), "purged old checkpoint files");
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// CheckpointError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint at step {step_index} precedes previous checkpoint at step {previous}")]
    OutOfOrder { step_index: usize, previous: usize },

    #[error("checkpoint {checkpoint_id} kept in memory but not persisted: {message}")]
    Persistence {
        checkpoint_id: String,
        message: String,
    },

    #[error("repository error: {0}")]
    Repository(String),
}

//! Execution record store.
//!
//! Each record is a pretty-printed JSON file named
//! `execution_{%Y%m%d_%H%M%S}.json`, with a `_n` suffix when two executions
//! finish in the same second. Records are never overwritten.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;

use sdlab_types::error::RepositoryError;
use sdlab_types::record::ExecutionRecord;

use crate::checkpoint::file::write_new;

const MAX_NAME_SUFFIX: u32 = 100;

#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `record` and return the path of the new file.
    pub async fn save(&self, record: &ExecutionRecord) -> Result<PathBuf, RepositoryError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| RepositoryError::Io(format!("{}: {e}", self.dir.display())))?;
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let stem = format!("execution_{}", Utc::now().format("%Y%m%d_%H%M%S"));
        for n in 0..MAX_NAME_SUFFIX {
            let name = if n == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{n}.json")
            };
            let path = self.dir.join(name);
            match write_new(&path, &json).await {
                Ok(()) => {
                    tracing::info!(
                        path = %path.display(),
                        workflow_id = %record.summary.workflow_id,
                        "execution record saved"
                    );
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(RepositoryError::Io(format!("{}: {e}", path.display()))),
            }
        }
        Err(RepositoryError::Io(format!(
            "no free record file name for {stem} in {}",
            self.dir.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdlab_types::record::ExecutionSource;
    use sdlab_types::recovery::{RecoveryReport, RecoveryStats};
    use sdlab_types::step::{WorkflowDocument, WorkflowStatus, WorkflowSummary};
    use tempfile::TempDir;

    fn record() -> ExecutionRecord {
        ExecutionRecord {
            timestamp: Utc::now(),
            source: ExecutionSource::Http {
                request_id: "req-1".to_string(),
            },
            dry_run: true,
            workflow: WorkflowDocument::Steps(Vec::new()),
            summary: WorkflowSummary {
                status: WorkflowStatus::Completed,
                workflow_id: "wf_saved".to_string(),
                total_nodes: 0,
                executed_nodes: 0,
                successful_nodes: 0,
                failed_nodes: Vec::new(),
                results: Vec::new(),
                execution_log: Vec::new(),
                operation_log: Vec::new(),
                aborted_at: None,
                workflow_name: None,
                metadata: None,
            },
            recovery_statistics: RecoveryReport {
                stats: RecoveryStats::default(),
                success_rate: 0.0,
                total_checkpoints: 0,
                workflow_id: Some("wf_saved".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn save_creates_the_directory_and_reads_back() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path().join("execution_results"));

        let path = store.save(&record()).await.unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("execution_") && name.ends_with(".json"), "{name}");
        let loaded: ExecutionRecord =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(loaded.summary.workflow_id, "wf_saved");
        assert_eq!(
            loaded.source,
            ExecutionSource::Http {
                request_id: "req-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn records_in_the_same_second_get_distinct_files() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path());

        let first = store.save(&record()).await.unwrap();
        let second = store.save(&record()).await.unwrap();

        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }
}

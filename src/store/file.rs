use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{RaasError, Result};
use crate::scheduler::{Job, JobId, JobStatus};
use crate::store::table::JobTable;
use crate::store::JobStore;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    #[serde(default)]
    reset_watermark: u64,
    jobs: Vec<Job>,
}

/// Job table persisted as a single JSON document.
///
/// Every mutation is applied to a copy of the table, written to a sibling
/// temp file and renamed over the snapshot; the in-memory table only changes
/// once the rename succeeds.
#[derive(Debug)]
pub struct FileJobStore {
    path: PathBuf,
    table: RwLock<JobTable>,
}

impl FileJobStore {
    /// Load an existing snapshot, or start empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                if snapshot.version != SNAPSHOT_VERSION {
                    return Err(RaasError::Store(format!(
                        "unsupported snapshot version {} in {}",
                        snapshot.version,
                        path.display()
                    )));
                }
                tracing::info!(path = %path.display(), jobs = snapshot.jobs.len(), "Loaded job store");
                JobTable::from_jobs(snapshot.jobs).with_reset_watermark(snapshot.reset_watermark)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Creating new job store");
                JobTable::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn mutate<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut JobTable) -> Result<()>,
    {
        let mut table = self.table.write().await;
        let mut next = table.clone();
        apply(&mut next)?;
        write_snapshot(&self.path, &next).await?;
        *table = next;
        Ok(())
    }
}

async fn write_snapshot(path: &Path, table: &JobTable) -> Result<()> {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        reset_watermark: table.reset_watermark(),
        jobs: table.all_jobs().into_iter().cloned().collect(),
    };
    let bytes = serde_json::to_vec_pretty(&snapshot)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create_job(&self, job: &Job) -> Result<()> {
        self.mutate(|t| t.insert(job)).await
    }

    async fn mark_started(&self, id: JobId, hardware_name: &str, at: DateTime<Utc>) -> Result<()> {
        self.mutate(|t| t.mark_started(id, hardware_name, at)).await
    }

    async fn mark_terminal(
        &self,
        id: JobId,
        status: JobStatus,
        output: &str,
        result_data: Option<&serde_json::Value>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.mutate(|t| t.mark_terminal(id, status, output, result_data, at))
            .await
    }

    async fn mark_reset(&self, watermark: u64) -> Result<()> {
        self.mutate(|t| {
            t.mark_reset(watermark);
            Ok(())
        })
        .await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.table.read().await.get(&id).cloned())
    }

    async fn all_queued(&self) -> Result<Vec<Job>> {
        Ok(self.table.read().await.queued())
    }

    async fn all_running(&self) -> Result<Vec<Job>> {
        Ok(self.table.read().await.running())
    }

    async fn all_completed(&self) -> Result<Vec<Job>> {
        Ok(self.table.read().await.completed())
    }

    async fn next_seq(&self) -> Result<u64> {
        Ok(self.table.read().await.next_seq())
    }
}

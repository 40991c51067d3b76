use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::scheduler::{Job, JobId, JobStatus};
use crate::store::table::JobTable;
use crate::store::JobStore;

/// Non-durable store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    table: RwLock<JobTable>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, job: &Job) -> Result<()> {
        self.table.write().await.insert(job)
    }

    async fn mark_started(&self, id: JobId, hardware_name: &str, at: DateTime<Utc>) -> Result<()> {
        self.table.write().await.mark_started(id, hardware_name, at)
    }

    async fn mark_terminal(
        &self,
        id: JobId,
        status: JobStatus,
        output: &str,
        result_data: Option<&serde_json::Value>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.table
            .write()
            .await
            .mark_terminal(id, status, output, result_data, at)
    }

    async fn mark_reset(&self, watermark: u64) -> Result<()> {
        self.table.write().await.mark_reset(watermark);
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::NewJob;
    use chrono::Duration;

    #[tokio::test]
    async fn lists_are_ordered_newest_first() {
        let store = MemoryJobStore::new();
        let t0 = Utc::now();

        let first = Job::new(NewJob::new("a", "p1", "u"), t0);
        let second = Job::new(NewJob::new("b", "p2", "u"), t0 + Duration::seconds(1));
        store.create_job(&first).await.unwrap();
        store.create_job(&second).await.unwrap();

        let queued = store.all_queued().await.unwrap();
        assert_eq!(
            queued.iter().map(|j| j.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        store
            .mark_started(first.id, "rig1", t0 + Duration::seconds(2))
            .await
            .unwrap();
        store
            .mark_started(second.id, "rig2", t0 + Duration::seconds(3))
            .await
            .unwrap();
        let running = store.all_running().await.unwrap();
        assert_eq!(running[0].id, second.id);
        assert!(store.all_queued().await.unwrap().is_empty());

        store
            .mark_terminal(second.id, JobStatus::Failed, "bad", None, t0 + Duration::seconds(4))
            .await
            .unwrap();
        store
            .mark_terminal(
                first.id,
                JobStatus::Complete,
                "ok",
                Some(&serde_json::json!([1])),
                t0 + Duration::seconds(5),
            )
            .await
            .unwrap();
        let completed = store.all_completed().await.unwrap();
        assert_eq!(
            completed.iter().map(|j| j.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
        assert_eq!(completed[1].status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn rejects_out_of_order_transitions() {
        let store = MemoryJobStore::new();
        let job = Job::new(NewJob::new("a", "p1", "u"), Utc::now());
        store.create_job(&job).await.unwrap();

        assert!(store.create_job(&job).await.is_err());
        assert!(store
            .mark_terminal(job.id, JobStatus::Complete, "", None, Utc::now())
            .await
            .is_err());
        assert!(store
            .mark_started(JobId::new(), "rig1", Utc::now())
            .await
            .is_err());
        assert_eq!(store.len().await, 1);
    }
}

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{RaasError, Result};
use crate::scheduler::view::{sort_by_end_desc, sort_by_start_desc, sort_by_submit_desc};
use crate::scheduler::{Job, JobId, JobOutcome, JobStatus};

/// Job records keyed by id. Shared by the store implementations; transitions
/// go through [`Job::start`] and [`Job::finish`] so the store enforces the
/// same state machine as the coordinator.
///
/// Queued and running records with a `seq` below `reset_watermark` were
/// dropped by a reset. They keep their last status for single-job lookups
/// but no longer appear in the queued or running lists.
#[derive(Debug, Default, Clone)]
pub struct JobTable {
    jobs: HashMap<JobId, Job>,
    reset_watermark: u64,
}

impl JobTable {
    pub fn from_jobs(jobs: Vec<Job>) -> Self {
        Self {
            jobs: jobs.into_iter().map(|j| (j.id, j)).collect(),
            reset_watermark: 0,
        }
    }

    pub fn with_reset_watermark(mut self, watermark: u64) -> Self {
        self.reset_watermark = watermark;
        self
    }

    pub fn reset_watermark(&self) -> u64 {
        self.reset_watermark
    }

    /// Never lowers the watermark.
    pub fn mark_reset(&mut self, watermark: u64) {
        self.reset_watermark = self.reset_watermark.max(watermark);
    }

    pub fn insert(&mut self, job: &Job) -> Result<()> {
        if self.jobs.contains_key(&job.id) {
            return Err(RaasError::Store(format!("job {} already exists", job.id)));
        }
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }

    pub fn mark_started(&mut self, id: JobId, hardware_name: &str, at: DateTime<Utc>) -> Result<()> {
        let job = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| RaasError::JobNotFound(id.to_string()))?;
        job.start(hardware_name, at)
    }

    pub fn mark_terminal(
        &mut self,
        id: JobId,
        status: JobStatus,
        output: &str,
        result_data: Option<&serde_json::Value>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(RaasError::Store(format!(
                "{status} is not a terminal status"
            )));
        }
        let job = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| RaasError::JobNotFound(id.to_string()))?;
        job.finish(
            JobOutcome {
                output: output.to_string(),
                result_data: result_data.cloned(),
                failed: status == JobStatus::Failed,
            },
            at,
        )
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn queued(&self) -> Vec<Job> {
        let mut jobs = self.active_with_status(JobStatus::Queued);
        sort_by_submit_desc(&mut jobs);
        jobs
    }

    pub fn running(&self) -> Vec<Job> {
        let mut jobs = self.active_with_status(JobStatus::Running);
        sort_by_start_desc(&mut jobs);
        jobs
    }

    pub fn completed(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .values()
            .filter(|j| j.status.is_terminal())
            .cloned()
            .collect();
        sort_by_end_desc(&mut jobs);
        jobs
    }

    /// Lowest sequence number not yet used by any record or reset.
    pub fn next_seq(&self) -> u64 {
        self.jobs
            .values()
            .map(|j| j.seq + 1)
            .max()
            .unwrap_or(0)
            .max(self.reset_watermark)
    }

    /// All records, oldest submission first.
    pub fn all_jobs(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self.jobs.values().collect();
        jobs.sort_by_key(|j| (j.submit_time, j.seq));
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn active_with_status(&self, status: JobStatus) -> Vec<Job> {
        self.jobs
            .values()
            .filter(|j| j.status == status && j.seq >= self.reset_watermark)
            .cloned()
            .collect()
    }
}

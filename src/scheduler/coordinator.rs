//! The job lifecycle state machine.
//!
//! ```text
//!   submit ──→ Queued ──dispatch──→ Running ──complete──→ Complete
//!                                      │
//!                                      └────complete────→ Failed
//! ```
//!
//! Queue, running map and completed-history sit behind one mutex, so
//! dispatch (pop + start) and complete (lookup + remove + finish) are each
//! atomic against each other and against submit. The hardware registry has
//! its own lock. Store writes are queued to the [`StoreWriter`] in the same
//! order as the transitions and applied off the lock.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::clock::Clock;
use crate::config::RaasConfig;
use crate::error::{RaasError, Result};
use crate::scheduler::job::{Job, JobId, JobOutcome, NewJob};
use crate::scheduler::queue::JobQueue;
use crate::scheduler::registry::{HardwareRegistry, HardwareStatus};
use crate::scheduler::view::JobsView;
use crate::store::{JobStore, StoreCommand, StoreWriter};

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created(Job),
    /// A queued or running job with the same user and project already existed.
    Duplicate(Job),
}

impl SubmitOutcome {
    pub fn job(&self) -> &Job {
        match self {
            SubmitOutcome::Created(job) | SubmitOutcome::Duplicate(job) => job,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, SubmitOutcome::Duplicate(_))
    }

    pub fn into_job(self) -> Job {
        match self {
            SubmitOutcome::Created(job) | SubmitOutcome::Duplicate(job) => job,
        }
    }
}

/// Result of a rig polling for work. An empty queue is a normal outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Assigned(Job),
    NoJobAvailable,
}

impl Dispatch {
    pub fn into_job(self) -> Option<Job> {
        match self {
            Dispatch::Assigned(job) => Some(job),
            Dispatch::NoJobAvailable => None,
        }
    }
}

/// Jobs reloaded from the store at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
}

pub struct Coordinator {
    jobs: Mutex<JobQueue>,
    registry: RwLock<HardwareRegistry>,
    store: Arc<dyn JobStore>,
    writer: StoreWriter,
    clock: Arc<dyn Clock>,
    history_capacity: usize,
}

impl Coordinator {
    /// Spawns the store writer, so this must run inside a Tokio runtime.
    pub fn new(config: &RaasConfig, store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        let (writer, _handle) = StoreWriter::spawn(store.clone());
        Self {
            jobs: Mutex::new(JobQueue::with_history_capacity(config.history_capacity)),
            registry: RwLock::new(HardwareRegistry::new(
                config.hardware.iter().cloned(),
                config.liveness_timeout(),
            )),
            store,
            writer,
            clock,
            history_capacity: config.history_capacity,
        }
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        self.store.clone()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Queue a new job unless the same user already has this project queued
    /// or running, in which case the existing job is reported instead.
    pub async fn submit(&self, submission: NewJob) -> Result<SubmitOutcome> {
        let submission = submission.validate()?;
        let mut jobs = self.jobs.lock().await;

        if let Some(existing) = jobs.find_active(&submission.user, &submission.project_name) {
            tracing::info!(
                job_id = %existing.id,
                user = %submission.user,
                project = %submission.project_name,
                "Duplicate submission coalesced"
            );
            return Ok(SubmitOutcome::Duplicate(existing.clone()));
        }

        let job = Job::new(submission, self.clock.now()).with_seq(jobs.allocate_seq());
        jobs.enqueue(job.clone());
        self.writer.send(StoreCommand::Create(job.clone()));

        tracing::info!(
            job_id = %job.id,
            user = %job.user,
            project = %job.project_name,
            queued = jobs.queued_len(),
            "Job submitted"
        );
        Ok(SubmitOutcome::Created(job))
    }

    /// Hand the oldest queued job to `hardware_name`. The poll itself counts
    /// as a heartbeat whether or not there is work. A blank name is rejected
    /// before anything changes.
    pub async fn dispatch(&self, hardware_name: &str) -> Result<Dispatch> {
        let hardware_name = hardware_name.trim();
        if hardware_name.is_empty() {
            return Err(RaasError::Validation("hardware must not be empty".into()));
        }
        self.heartbeat(hardware_name).await;

        let mut jobs = self.jobs.lock().await;
        let Some(mut job) = jobs.pop_next() else {
            return Ok(Dispatch::NoJobAvailable);
        };

        let now = self.clock.now();
        if let Err(e) = job.start(hardware_name, now) {
            tracing::error!(job_id = %job.id, error = %e, "Queued job could not be started");
            return Err(e);
        }
        jobs.insert_running(job.clone());
        self.writer.send(StoreCommand::MarkStarted {
            id: job.id,
            hardware_name: hardware_name.to_string(),
            at: job.start_time.unwrap_or(now),
        });

        tracing::info!(job_id = %job.id, hardware = hardware_name, "Job dispatched");
        Ok(Dispatch::Assigned(job))
    }

    /// Finish a running job. Unknown ids, queued jobs and jobs that already
    /// finished are all reported as not found.
    pub async fn complete(&self, id: JobId, outcome: JobOutcome) -> Result<Job> {
        let mut jobs = self.jobs.lock().await;
        let mut job = jobs
            .take_running(&id)
            .ok_or_else(|| RaasError::JobNotFound(id.to_string()))?;

        let now = self.clock.now();
        if let Err(e) = job.finish(outcome, now) {
            jobs.insert_running(job);
            return Err(e);
        }

        if let Some(evicted) = jobs.push_completed(job.clone()) {
            tracing::debug!(job_id = %evicted.id, "Evicted from completed history");
        }
        self.writer.send(StoreCommand::MarkTerminal {
            id: job.id,
            status: job.status,
            output: job.output.clone().unwrap_or_default(),
            result_data: job.result_data.clone(),
            at: job.end_time.unwrap_or(now),
        });

        tracing::info!(
            job_id = %job.id,
            status = %job.status,
            hardware = ?job.hardware_name,
            "Job finished"
        );
        Ok(job)
    }

    /// In-memory lists, newest first.
    pub async fn list_view(&self) -> JobsView {
        self.jobs.lock().await.view()
    }

    /// Look in memory first, then fall back to the store's full history.
    pub async fn get_job(&self, id: JobId) -> Result<Job> {
        if let Some(job) = self.jobs.lock().await.get(&id).cloned() {
            return Ok(job);
        }
        self.store
            .get_job(id)
            .await?
            .ok_or_else(|| RaasError::JobNotFound(id.to_string()))
    }

    /// Explicit liveness signal. Returns false for rigs outside the roster.
    pub async fn heartbeat(&self, hardware_name: &str) -> bool {
        let now = self.clock.now();
        self.registry
            .write()
            .await
            .record_heartbeat(hardware_name, now)
    }

    pub async fn is_alive(&self, hardware_name: &str) -> bool {
        let now = self.clock.now();
        self.registry.read().await.is_alive(hardware_name, now)
    }

    pub async fn hardware_statuses(&self) -> Vec<HardwareStatus> {
        let now = self.clock.now();
        self.registry.read().await.list_statuses(now)
    }

    /// Drop all queued, running and completed jobs from memory in one step.
    ///
    /// The store keeps every record but is told to leave the dropped queued
    /// and running jobs out of its lists, so they stay gone after a restart.
    /// Hardware heartbeats are left alone.
    pub async fn reset(&self) {
        let mut jobs = self.jobs.lock().await;
        let watermark = jobs.seq_watermark();
        tracing::warn!(
            queued = jobs.queued_len(),
            running = jobs.running_len(),
            completed = jobs.completed_len(),
            watermark,
            "Resetting in-memory job state"
        );

        let mut fresh = JobQueue::with_history_capacity(self.history_capacity);
        fresh.resume_seq(watermark);
        *jobs = fresh;
        self.writer.send(StoreCommand::Reset { watermark });
    }

    /// Rebuild in-memory state from the store. Queued jobs are restored in
    /// submission order; completed-history keeps the newest entries. Jobs
    /// dropped by an earlier reset are not part of any list and stay gone.
    pub async fn recover(&self) -> Result<RecoveryStats> {
        let mut queued = self.store.all_queued().await?;
        let running = self.store.all_running().await?;
        let mut completed = self.store.all_completed().await?;
        let next_seq = self.store.next_seq().await?;

        queued.sort_by_key(|j| (j.seq, j.submit_time));
        completed.truncate(self.history_capacity);

        let stats = RecoveryStats {
            queued: queued.len(),
            running: running.len(),
            completed: completed.len(),
        };

        let mut state = JobQueue::with_history_capacity(self.history_capacity);
        state.resume_seq(next_seq);
        for job in queued {
            state.enqueue(job);
        }
        for job in running {
            state.insert_running(job);
        }
        // Oldest first so the newest ends up at the front.
        for job in completed.into_iter().rev() {
            state.push_completed(job);
        }

        let mut jobs = self.jobs.lock().await;
        state.resume_seq(jobs.seq_watermark());
        *jobs = state;
        drop(jobs);
        tracing::info!(
            queued = stats.queued,
            running = stats.running,
            completed = stats.completed,
            "Recovered job state from store"
        );
        Ok(stats)
    }

    /// Wait for every store write issued so far to be applied.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }
}

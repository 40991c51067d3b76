use std::collections::{HashMap, VecDeque};

use crate::scheduler::history::{CompletedHistory, DEFAULT_HISTORY_CAPACITY};
use crate::scheduler::job::{Job, JobId};
use crate::scheduler::view::JobsView;

/// In-memory job state: the FIFO of queued jobs, the running map and the
/// bounded completed-history.
///
/// A job id lives in at most one of the three. The type has no locking of
/// its own; the coordinator guards it with a single mutex so that
/// dequeue-and-start and lookup-and-finish are atomic.
///
/// `next_seq` hands out submission sequence numbers and must never move
/// backwards, including across a reset.
#[derive(Debug)]
pub struct JobQueue {
    queued: VecDeque<Job>,
    running: HashMap<JobId, Job>,
    completed: CompletedHistory,
    next_seq: u64,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            queued: VecDeque::new(),
            running: HashMap::new(),
            completed: CompletedHistory::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// Reserve the next submission sequence number.
    pub fn allocate_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// The number the next submission will get. Every job in this queue has
    /// a smaller one.
    pub fn seq_watermark(&self) -> u64 {
        self.next_seq
    }

    /// Continue numbering from at least `next_seq`.
    pub fn resume_seq(&mut self, next_seq: u64) {
        self.next_seq = self.next_seq.max(next_seq);
    }

    /// Append to the tail of the FIFO.
    pub fn enqueue(&mut self, job: Job) {
        self.queued.push_back(job);
    }

    /// A queued or running job with the same user and project, if any.
    pub fn find_active(&self, user: &str, project_name: &str) -> Option<&Job> {
        self.queued
            .iter()
            .chain(self.running.values())
            .find(|j| j.submission_key() == (user, project_name))
    }

    /// Remove the head of the FIFO.
    pub fn pop_next(&mut self) -> Option<Job> {
        self.queued.pop_front()
    }

    pub fn insert_running(&mut self, job: Job) {
        self.running.insert(job.id, job);
    }

    pub fn take_running(&mut self, id: &JobId) -> Option<Job> {
        self.running.remove(id)
    }

    /// Record a terminal job, returning whatever fell off the history.
    pub fn push_completed(&mut self, job: Job) -> Option<Job> {
        self.completed.push(job)
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.running
            .get(id)
            .or_else(|| self.queued.iter().find(|j| j.id == *id))
            .or_else(|| self.completed.get(id))
    }

    pub fn view(&self) -> JobsView {
        JobsView::sorted(
            self.queued.iter().cloned().collect(),
            self.running.values().cloned().collect(),
            self.completed.iter().cloned().collect(),
        )
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    pub fn history_capacity(&self) -> usize {
        self.completed.capacity()
    }

    /// Total jobs across the three sets.
    pub fn len(&self) -> usize {
        self.queued.len() + self.running.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

use std::collections::VecDeque;

use crate::scheduler::job::{Job, JobId};

pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Bounded, most-recent-first record of terminal jobs.
///
/// This is a convenience view only; the job store keeps the full history.
#[derive(Debug, Clone)]
pub struct CompletedHistory {
    jobs: VecDeque<Job>,
    capacity: usize,
}

impl Default for CompletedHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl CompletedHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            jobs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the front. Returns the evicted oldest entry when over capacity.
    pub fn push(&mut self, job: Job) -> Option<Job> {
        if self.capacity == 0 {
            return Some(job);
        }
        self.jobs.push_front(job);
        if self.jobs.len() > self.capacity {
            self.jobs.pop_back()
        } else {
            None
        }
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == *id)
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

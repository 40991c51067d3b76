use serde::{Deserialize, Serialize};

use crate::scheduler::job::Job;

/// The three job lists shown to dashboards, each newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobsView {
    pub queued: Vec<Job>,
    pub running: Vec<Job>,
    pub completed: Vec<Job>,
}

impl JobsView {
    /// Builds a view, sorting queued by submit time, running by start time
    /// and completed by end time, all descending. Equal stamps fall back to
    /// submission order, newest first.
    pub fn sorted(mut queued: Vec<Job>, mut running: Vec<Job>, mut completed: Vec<Job>) -> Self {
        sort_by_submit_desc(&mut queued);
        sort_by_start_desc(&mut running);
        sort_by_end_desc(&mut completed);
        Self {
            queued,
            running,
            completed,
        }
    }

    pub fn len(&self) -> usize {
        self.queued.len() + self.running.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn sort_by_submit_desc(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| {
        b.submit_time
            .cmp(&a.submit_time)
            .then_with(|| b.seq.cmp(&a.seq))
    });
}

pub fn sort_by_start_desc(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| b.seq.cmp(&a.seq))
    });
}

pub fn sort_by_end_desc(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| {
        b.end_time
            .cmp(&a.end_time)
            .then_with(|| b.seq.cmp(&a.seq))
    });
}

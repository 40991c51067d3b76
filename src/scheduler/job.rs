use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RaasError, Result};

/// Opaque job identifier, a random 128-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = RaasError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| RaasError::JobNotFound(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    /// `Complete` and `Failed` admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Queued or running jobs block a resubmission of the same project.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Complete => write!(f, "COMPLETE"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = RaasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(JobStatus::Queued),
            "RUNNING" => Ok(JobStatus::Running),
            "COMPLETE" => Ok(JobStatus::Complete),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(RaasError::Validation(format!("unknown job status {other}"))),
        }
    }
}

/// A job submission before it has been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub user: String,
    pub project_name: String,
    pub source_url: String,
}

impl NewJob {
    pub fn new(
        user: impl Into<String>,
        project_name: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            project_name: project_name.into(),
            source_url: source_url.into(),
        }
    }

    /// Trims surrounding whitespace and rejects empty fields.
    pub fn validate(self) -> Result<Self> {
        let user = self.user.trim().to_string();
        let project_name = self.project_name.trim().to_string();
        let source_url = self.source_url.trim().to_string();

        if user.is_empty() {
            return Err(RaasError::Validation("user must not be empty".into()));
        }
        if project_name.is_empty() {
            return Err(RaasError::Validation("project_name must not be empty".into()));
        }
        if source_url.is_empty() {
            return Err(RaasError::Validation("source_url must not be empty".into()));
        }

        Ok(Self {
            user,
            project_name,
            source_url,
        })
    }
}

/// What a rig reports when it finishes a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub output: String,
    pub result_data: Option<serde_json::Value>,
    pub failed: bool,
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        if self.failed {
            JobStatus::Failed
        } else {
            JobStatus::Complete
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub user: String,
    pub project_name: String,
    pub source_url: String,
    pub status: JobStatus,
    pub hardware_name: Option<String>,
    pub output: Option<String>,
    pub result_data: Option<serde_json::Value>,
    pub submit_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Submission order. Strictly increasing across the life of a store,
    /// including restarts; breaks ties between equal `submit_time`s.
    #[serde(default)]
    pub seq: u64,
}

impl Job {
    pub fn new(submission: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            user: submission.user,
            project_name: submission.project_name,
            source_url: submission.source_url,
            status: JobStatus::Queued,
            hardware_name: None,
            output: None,
            result_data: None,
            submit_time: now,
            start_time: None,
            end_time: None,
            seq: 0,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Key used to coalesce duplicate submissions. The source URL is not part of it.
    pub fn submission_key(&self) -> (&str, &str) {
        (&self.user, &self.project_name)
    }

    /// `Queued -> Running`, binding the claiming rig.
    pub fn start(&mut self, hardware_name: &str, now: DateTime<Utc>) -> Result<()> {
        if self.status != JobStatus::Queued {
            return Err(RaasError::InvalidTransition {
                from: self.status,
                to: JobStatus::Running,
            });
        }
        self.status = JobStatus::Running;
        self.hardware_name = Some(hardware_name.to_string());
        // Wall clocks can step backwards; keep submit <= start.
        self.start_time = Some(now.max(self.submit_time));
        Ok(())
    }

    /// `Running -> Complete | Failed`.
    pub fn finish(&mut self, outcome: JobOutcome, now: DateTime<Utc>) -> Result<()> {
        let target = outcome.status();
        if self.status != JobStatus::Running {
            return Err(RaasError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        let started = self.start_time.unwrap_or(self.submit_time);
        self.status = target;
        self.output = Some(outcome.output);
        self.result_data = outcome.result_data;
        self.end_time = Some(now.max(started));
        Ok(())
    }
}

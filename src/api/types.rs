//! Wire forms. Each entity maps itself onto a fixed field list here; nothing
//! is serialized by reflection over internal types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduler::{HardwareStatus, Job, JobsView};

/// Bumped whenever a field is added, removed or changes meaning.
pub const JOB_WIRE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResponse {
    pub version: u32,
    pub id: String,
    pub user: String,
    pub project_name: String,
    pub source_url: String,
    pub status: String,
    pub hardware_name: Option<String>,
    pub output: Option<String>,
    pub data: Option<serde_json::Value>,
    pub submit_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl From<&Job> for JobResponse {
    fn from(job: &Job) -> Self {
        Self {
            version: JOB_WIRE_VERSION,
            id: job.id.to_string(),
            user: job.user.clone(),
            project_name: job.project_name.clone(),
            source_url: job.source_url.clone(),
            status: job.status.to_string(),
            hardware_name: job.hardware_name.clone(),
            output: job.output.clone(),
            data: job.result_data.clone(),
            submit_time: job.submit_time,
            start_time: job.start_time,
            end_time: job.end_time,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobsViewResponse {
    pub queued: Vec<JobResponse>,
    pub running: Vec<JobResponse>,
    pub completed: Vec<JobResponse>,
}

impl From<&JobsView> for JobsViewResponse {
    fn from(view: &JobsView) -> Self {
        Self {
            queued: view.queued.iter().map(JobResponse::from).collect(),
            running: view.running.iter().map(JobResponse::from).collect(),
            completed: view.completed.iter().map(JobResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    pub user: String,
    pub project_name: String,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitJobResponse {
    pub job_id: String,
    /// True when an existing queued or running job was reported instead.
    pub duplicate: bool,
}

/// Body a rig sends when it finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResultsRequest {
    pub stdout: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub failed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultsResponse {
    pub job_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareStatusResponse {
    pub name: String,
    /// `ONLINE` or `OFFLINE`.
    pub status: String,
}

impl From<&HardwareStatus> for HardwareStatusResponse {
    fn from(hw: &HardwareStatus) -> Self {
        Self {
            name: hw.name.clone(),
            status: if hw.alive { "ONLINE" } else { "OFFLINE" }.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopParams {
    pub hardware: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

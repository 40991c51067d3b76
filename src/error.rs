use thiserror::Error;

use crate::scheduler::JobStatus;

#[derive(Error, Debug)]
pub enum RaasError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Hardware not found: {0}")]
    HardwareNotFound(String),

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Invalid submission: {0}")]
    Validation(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RaasError>;

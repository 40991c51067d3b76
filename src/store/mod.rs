//! Durable job records.
//!
//! The coordinator treats the store as the system of record for history and
//! auditing, but serves requests from its own in-memory state. Writes reach
//! the store through [`StoreWriter`] in the order the coordinator issued
//! them; reads are used by the read cache, single-job lookups that miss in
//! memory, and startup recovery.
//!
//! # Implementations
//!
//! - [`MemoryJobStore`]: a map behind a lock, for tests and ephemeral runs
//! - [`FileJobStore`]: the same table persisted as a JSON snapshot file

pub mod file;
pub mod memory;
pub mod table;
pub mod writer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::scheduler::{Job, JobId, JobStatus};

pub use file::FileJobStore;
pub use memory::MemoryJobStore;
pub use writer::{StoreCommand, StoreWriter};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: &Job) -> Result<()>;

    async fn mark_started(&self, id: JobId, hardware_name: &str, at: DateTime<Utc>) -> Result<()>;

    async fn mark_terminal(
        &self,
        id: JobId,
        status: JobStatus,
        output: &str,
        result_data: Option<&serde_json::Value>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Drop every queued or running record whose `seq` is below `watermark`
    /// from the queued and running lists. Watermarks only move forward.
    async fn mark_reset(&self, watermark: u64) -> Result<()>;

    async fn get_job(&self, id: JobId) -> Result<Option<Job>>;

    /// Newest submission first.
    async fn all_queued(&self) -> Result<Vec<Job>>;

    /// Newest start first.
    async fn all_running(&self) -> Result<Vec<Job>>;

    /// Newest end first.
    async fn all_completed(&self) -> Result<Vec<Job>>;

    /// First sequence number a new job may use: above every stored record
    /// and every reset watermark.
    async fn next_seq(&self) -> Result<u64>;
}

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::scheduler::{Job, JobId, JobStatus};
use crate::store::JobStore;

/// A write the coordinator wants reflected in the store.
#[derive(Debug)]
pub enum StoreCommand {
    Create(Job),
    MarkStarted {
        id: JobId,
        hardware_name: String,
        at: DateTime<Utc>,
    },
    MarkTerminal {
        id: JobId,
        status: JobStatus,
        output: String,
        result_data: Option<serde_json::Value>,
        at: DateTime<Utc>,
    },
    /// Everything queued or running below `watermark` was dropped.
    Reset { watermark: u64 },
    /// Acknowledged once every earlier command has been applied.
    Flush(oneshot::Sender<()>),
}

/// Applies store writes in issue order on a background task.
///
/// Sending never blocks, so the coordinator can enqueue while holding its
/// state lock and the channel order matches the order of in-memory
/// transitions. A failed write is logged and dropped: in-memory state stays
/// authoritative for the life of the process.
#[derive(Debug, Clone)]
pub struct StoreWriter {
    tx: mpsc::UnboundedSender<StoreCommand>,
}

impl StoreWriter {
    /// Must be called from within a Tokio runtime.
    pub fn spawn(store: Arc<dyn JobStore>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(store, rx));
        (Self { tx }, handle)
    }

    pub fn send(&self, command: StoreCommand) {
        if let Err(e) = self.tx.send(command) {
            tracing::error!(command = ?e.0, "Store writer has stopped, write dropped");
        }
    }

    /// Wait until everything sent before this call has reached the store.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(StoreCommand::Flush(tx)).is_err() {
            return;
        }
        let _ = rx.await;
    }
}

async fn run(store: Arc<dyn JobStore>, mut rx: mpsc::UnboundedReceiver<StoreCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            StoreCommand::Create(job) => {
                if let Err(e) = store.create_job(&job).await {
                    tracing::warn!(job_id = %job.id, error = %e, "Failed to persist new job");
                }
            }
            StoreCommand::MarkStarted {
                id,
                hardware_name,
                at,
            } => {
                if let Err(e) = store.mark_started(id, &hardware_name, at).await {
                    tracing::warn!(job_id = %id, hardware = %hardware_name, error = %e, "Failed to persist job start");
                }
            }
            StoreCommand::MarkTerminal {
                id,
                status,
                output,
                result_data,
                at,
            } => {
                if let Err(e) = store
                    .mark_terminal(id, status, &output, result_data.as_ref(), at)
                    .await
                {
                    tracing::warn!(job_id = %id, status = %status, error = %e, "Failed to persist job result");
                }
            }
            StoreCommand::Reset { watermark } => {
                if let Err(e) = store.mark_reset(watermark).await {
                    tracing::warn!(watermark, error = %e, "Failed to persist reset");
                }
            }
            StoreCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!("Store writer stopped");
}

pub mod coordinator;
pub mod history;
pub mod job;
pub mod queue;
pub mod registry;
pub mod view;

pub use coordinator::{Coordinator, Dispatch, SubmitOutcome};
pub use history::CompletedHistory;
pub use job::{Job, JobId, JobOutcome, JobStatus, NewJob};
pub use queue::JobQueue;
pub use registry::{HardwareRegistry, HardwareStatus};
pub use view::JobsView;

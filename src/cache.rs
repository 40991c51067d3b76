//! Time-windowed cache of the store's job lists.
//!
//! Dashboards poll `GET /job` often; rather than hitting the store on each
//! request, [`ReadCache::get`] re-reads the three lists at most once per
//! window and otherwise hands back the previous snapshot. Writes never
//! invalidate it, so a listing can be up to one window stale.
//!
//! While the store is failing, the last good snapshot keeps being served for
//! up to [`STALE_LIMIT_WINDOWS`] windows; after that the error is returned.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::Result;
use crate::scheduler::JobsView;
use crate::store::JobStore;

/// How many windows past its refresh a snapshot may be served when the
/// store cannot be read.
pub const STALE_LIMIT_WINDOWS: i32 = 10;

#[derive(Debug, Default)]
struct CacheState {
    refreshed_at: Option<DateTime<Utc>>,
    snapshot: Arc<JobsView>,
}

pub struct ReadCache {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    window: Duration,
    state: Mutex<CacheState>,
}

impl ReadCache {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            store,
            clock,
            window,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// The current snapshot, refreshed first if it is older than the window.
    ///
    /// The refresh runs under the cache lock and replaces all three lists as
    /// one `Arc`, so no caller sees a half-updated snapshot and concurrent
    /// callers trigger a single store read.
    ///
    /// If the refresh fails, the previous snapshot is returned while it is at
    /// most [`STALE_LIMIT_WINDOWS`] windows old. In that case the one-window
    /// staleness bound does not hold.
    pub async fn get(&self) -> Result<Arc<JobsView>> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let fresh = state
            .refreshed_at
            .map(|at| now - at <= self.window)
            .unwrap_or(false);
        if fresh {
            return Ok(state.snapshot.clone());
        }

        match self.load().await {
            Ok(view) => {
                state.snapshot = Arc::new(view);
                state.refreshed_at = Some(now);
                Ok(state.snapshot.clone())
            }
            Err(e) if self.within_stale_limit(state.refreshed_at, now) => {
                tracing::warn!(error = %e, "Job list refresh failed, serving stale snapshot");
                Ok(state.snapshot.clone())
            }
            Err(e) => {
                tracing::error!(error = %e, "Job list refresh failed");
                Err(e)
            }
        }
    }

    fn within_stale_limit(&self, refreshed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        refreshed_at
            .map(|at| now - at <= self.window * STALE_LIMIT_WINDOWS)
            .unwrap_or(false)
    }

    async fn load(&self) -> Result<JobsView> {
        let queued = self.store.all_queued().await?;
        let running = self.store.all_running().await?;
        let completed = self.store.all_completed().await?;
        Ok(JobsView {
            queued,
            running,
            completed,
        })
    }
}

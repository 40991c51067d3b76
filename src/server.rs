use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::{run_api, ApiState};
use crate::cache::ReadCache;
use crate::clock::{Clock, SystemClock};
use crate::config::RaasConfig;
use crate::error::Result;
use crate::scheduler::Coordinator;
use crate::store::{FileJobStore, JobStore, MemoryJobStore};

/// Wires the store, coordinator, read cache and HTTP API together.
pub struct RaasServer {
    pub config: RaasConfig,
    pub coordinator: Arc<Coordinator>,
    pub cache: Arc<ReadCache>,
}

impl RaasServer {
    /// Open the configured store and restore in-memory state from it.
    ///
    /// # Errors
    ///
    /// Fails if the store file exists but cannot be read or parsed.
    pub async fn new(config: RaasConfig) -> Result<Self> {
        let store: Arc<dyn JobStore> = match &config.store_path {
            Some(path) => Arc::new(FileJobStore::open(path.clone()).await?),
            None => {
                tracing::warn!("No store path configured, job history will not survive restarts");
                Arc::new(MemoryJobStore::new())
            }
        };
        Self::with_store(config, store, Arc::new(SystemClock)).await
    }

    pub async fn with_store(
        config: RaasConfig,
        store: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let coordinator = Arc::new(Coordinator::new(&config, store.clone(), clock.clone()));
        coordinator.recover().await?;

        let cache = Arc::new(ReadCache::new(store, clock, config.cache_window()));

        Ok(Self {
            config,
            coordinator,
            cache,
        })
    }

    pub fn api_state(&self) -> ApiState {
        ApiState::new(
            self.coordinator.clone(),
            self.cache.clone(),
            self.config.auth.clone(),
        )
    }

    /// Serve until `shutdown` is cancelled, then wait for pending store writes.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        if self.config.auth.is_open() {
            tracing::warn!(
                "No shared secret or address allow-list configured; \
                 dispatch, results and reset are open to any caller"
            );
        }

        tracing::info!(
            listen_addr = %self.config.listen_addr,
            hardware = ?self.config.hardware,
            history_capacity = self.config.history_capacity,
            "Starting raas-lite"
        );

        run_api(self.config.listen_addr, self.api_state(), shutdown).await?;
        self.coordinator.flush().await;
        Ok(())
    }
}

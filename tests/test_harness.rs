//! Harness for end-to-end tests: runs the HTTP API on an ephemeral port and
//! hands out clients pointed at it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use raas_lite::api::serve;
use raas_lite::client::RaasClient;
use raas_lite::clock::SystemClock;
use raas_lite::config::{AuthConfig, RaasConfig};
use raas_lite::scheduler::Coordinator;
use raas_lite::server::RaasServer;
use raas_lite::store::{JobStore, MemoryJobStore};

pub const TEST_SECRET: &str = "integration-secret";

/// Short liveness and cache windows so tests do not sleep for long.
pub fn test_config() -> RaasConfig {
    RaasConfig {
        liveness_timeout_ms: 300,
        cache_window_ms: 50,
        auth: AuthConfig {
            shared_secret: Some(TEST_SECRET.to_string()),
            allowed_ips: Vec::new(),
        },
        ..RaasConfig::default().with_hardware(["rig1", "rig2"])
    }
}

/// Handle to a running server
pub struct TestServer {
    pub base_url: String,
    pub coordinator: Arc<Coordinator>,
    #[allow(dead_code)]
    pub store: Arc<dyn JobStore>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(config: RaasConfig) -> Self {
        Self::start_with_store(config, Arc::new(MemoryJobStore::new())).await
    }

    pub async fn start_with_store(config: RaasConfig, store: Arc<dyn JobStore>) -> Self {
        let server = RaasServer::with_store(config, store.clone(), Arc::new(SystemClock))
            .await
            .unwrap();
        let coordinator = server.coordinator.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let shutdown = CancellationToken::new();
        let state = server.api_state();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            serve(listener, state, token).await.unwrap();
        });

        Self {
            base_url,
            coordinator,
            store,
            shutdown,
            handle,
        }
    }

    /// Client that presents the shared secret.
    pub fn rig_client(&self) -> RaasClient {
        RaasClient::new(&self.base_url, Some(TEST_SECRET.to_string()))
    }

    /// Client without credentials.
    pub fn public_client(&self) -> RaasClient {
        RaasClient::new(&self.base_url, None)
    }

    /// Stop accepting connections and wait for the server task to exit.
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration, interval: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    condition().await
}

pub async fn assert_eventually<F, Fut>(condition: F, timeout: Duration, message: &str)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = wait_for(condition, timeout, Duration::from_millis(20)).await;
    assert!(result, "{}", message);
}

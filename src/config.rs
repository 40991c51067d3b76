use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::Duration;

/// Rigs on the default roster.
pub const DEFAULT_HARDWARE: [&str; 4] = ["Beth", "Goose", "Nicki", "Omar"];

/// Gate in front of dispatch, result reporting, heartbeats and reset.
///
/// - With a shared secret configured, callers must present it.
/// - With an address allow-list configured, the peer IP must be on it.
/// - With both, both checks must pass.
/// - With neither, the gate is open.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub shared_secret: Option<String>,
    pub allowed_ips: Vec<IpAddr>,
}

impl AuthConfig {
    pub fn is_open(&self) -> bool {
        self.shared_secret.is_none() && self.allowed_ips.is_empty()
    }

    pub fn authorize(&self, presented_secret: Option<&str>, peer: Option<IpAddr>) -> bool {
        if let Some(expected) = self.shared_secret.as_deref() {
            if presented_secret != Some(expected) {
                return false;
            }
        }
        if !self.allowed_ips.is_empty() {
            match peer {
                Some(ip) if self.allowed_ips.contains(&ip) => {}
                _ => return false,
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct RaasConfig {
    pub listen_addr: SocketAddr,
    /// Fixed roster of rig names.
    pub hardware: Vec<String>,
    /// A rig is online if it polled or sent a heartbeat within this window.
    pub liveness_timeout_ms: u64,
    /// Maximum staleness of the `GET /job` listing.
    pub cache_window_ms: u64,
    /// Completed jobs kept in memory; the store keeps everything.
    pub history_capacity: usize,
    /// JSON snapshot file for the job store. In-memory store when unset.
    pub store_path: Option<PathBuf>,
    pub auth: AuthConfig,
}

impl Default for RaasConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            hardware: DEFAULT_HARDWARE.iter().map(|s| s.to_string()).collect(),
            liveness_timeout_ms: 10_000,
            cache_window_ms: 1_000,
            history_capacity: 20,
            store_path: None,
            auth: AuthConfig::default(),
        }
    }
}

impl RaasConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_hardware<I, S>(mut self, roster: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hardware = roster.into_iter().map(Into::into).collect();
        self
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::milliseconds(self.liveness_timeout_ms as i64)
    }

    pub fn cache_window(&self) -> Duration {
        Duration::milliseconds(self.cache_window_ms as i64)
    }
}

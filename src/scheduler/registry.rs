use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Liveness record for one rig on the roster.
#[derive(Debug, Clone)]
pub struct HardwareState {
    pub name: String,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl HardwareState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_heartbeat: None,
        }
    }

    pub fn update_heartbeat(&mut self, now: DateTime<Utc>) {
        self.last_heartbeat = Some(now);
    }

    /// Never-seen rigs are offline.
    pub fn is_alive(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.last_heartbeat
            .map(|last| now - last < timeout)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardwareStatus {
    pub name: String,
    pub alive: bool,
}

/// Tracks the fixed roster of rigs and when each last polled.
///
/// Liveness is informational; it never decides who may dispatch.
#[derive(Debug)]
pub struct HardwareRegistry {
    hardware: BTreeMap<String, HardwareState>,
    liveness_timeout: Duration,
}

impl HardwareRegistry {
    pub fn new<I, S>(roster: I, liveness_timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hardware = roster
            .into_iter()
            .map(Into::into)
            .map(|name: String| (name.clone(), HardwareState::new(name)))
            .collect();
        Self {
            hardware,
            liveness_timeout,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hardware.contains_key(name)
    }

    /// Returns false, and changes nothing, for names outside the roster.
    pub fn record_heartbeat(&mut self, name: &str, now: DateTime<Utc>) -> bool {
        match self.hardware.get_mut(name) {
            Some(hw) => {
                hw.update_heartbeat(now);
                true
            }
            None => {
                tracing::debug!(hardware = name, "Heartbeat from unknown hardware ignored");
                false
            }
        }
    }

    pub fn is_alive(&self, name: &str, now: DateTime<Utc>) -> bool {
        self.hardware
            .get(name)
            .map(|hw| hw.is_alive(now, self.liveness_timeout))
            .unwrap_or(false)
    }

    /// Every rig on the roster, sorted by name.
    pub fn list_statuses(&self, now: DateTime<Utc>) -> Vec<HardwareStatus> {
        self.hardware
            .values()
            .map(|hw| HardwareStatus {
                name: hw.name.clone(),
                alive: hw.is_alive(now, self.liveness_timeout),
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&HardwareState> {
        self.hardware.get(name)
    }

    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }
}

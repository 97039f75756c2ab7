//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::DEFAULT_MAX_RETRIES;

/// Tunables for queueing and draining.
///
/// Any key missing from a config document falls back to its default, so a
/// host can ship `{}` and override only what it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Failed attempts before an event becomes terminal. Stamped on each event
    /// at enqueue time; changing it later does not touch queued events.
    pub max_retries: u32,

    /// How often the OS is asked to wake the app to drain the queue.
    pub periodic_wake_interval_secs: u64,

    /// Label for the extra execution window requested on backgrounding.
    pub background_task_label: String,
}

impl QueueConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn periodic_wake_interval(&self) -> Duration {
        Duration::from_secs(self.periodic_wake_interval_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            periodic_wake_interval_secs: 15 * 60,
            background_task_label: "fieldq-drain".to_string(),
        }
    }
}

//! SchedulerConfig - スケジューラの設定
//!
//! JSON から読み込めるように serde に対応しています。欠けたフィールドは既定値で埋まります。

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for a [`ManagedScheduler`](crate::app::ManagedScheduler).
///
/// # Example
/// ```json
/// { "name": "reports", "pool_size": 2, "history_limit": 16 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Used in log lines only.
    pub name: String,

    /// Maximum number of occurrences executing at the same time.
    pub pool_size: usize,

    /// How many finished occurrences each task keeps. `None` keeps all of them.
    pub history_limit: Option<usize>,

    /// How long `shutdown_and_wait` waits for running occurrences.
    pub shutdown_grace_ms: u64,
}

impl SchedulerConfig {
    pub const DEFAULT_POOL_SIZE: usize = 4;
    pub const DEFAULT_HISTORY_LIMIT: usize = 64;

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "cadence".to_string(),
            pool_size: Self::DEFAULT_POOL_SIZE,
            history_limit: Some(Self::DEFAULT_HISTORY_LIMIT),
            shutdown_grace_ms: 5_000,
        }
    }
}

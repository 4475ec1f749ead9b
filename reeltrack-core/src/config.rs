use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Global knobs for the daily update run.
///
/// All fields carry defaults so a deployment only needs to override what it
/// actually wants to tune.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Time windows used to force updates for shows that have gone stale.
    pub staleness: StalenessConfig,
    /// Maintenance work performed before shows are selected.
    pub maintenance: MaintenanceConfig,
    /// Lifetime of UI notifications.
    pub notifications: NotificationConfig,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StalenessConfig {
    /// Shows not updated for this many days become eligible for the bounded
    /// oldest-first batch.
    pub stale_after_days: i64,
    /// Shows not updated for this many days are always updated.
    pub force_after_days: i64,
    /// Cap on the oldest-first batch per run.
    pub stale_batch_limit: usize,
    /// How far back metadata sources are asked for changed shows.
    pub change_lookback_days: i64,
    /// Days around the last/next episode during which an ended show still
    /// gets full updates.
    pub grace_days: i64,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            stale_after_days: 90,
            force_after_days: 180,
            stale_batch_limit: 10,
            change_lookback_days: 7,
            grace_days: 365,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Cache files older than this are removed (seconds).
    pub cache_max_age_secs: u64,
    /// Manual search results older than this are purged (seconds).
    pub search_history_max_age_secs: u64,
}

impl MaintenanceConfig {
    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }

    pub fn search_history_max_age(&self) -> Duration {
        Duration::from_secs(self.search_history_max_age_secs)
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            cache_max_age_secs: 12 * 60 * 60,
            search_history_max_age_secs: 30 * 60,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub ttl_secs: i64,
}

impl NotificationConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { ttl_secs: 60 }
    }
}

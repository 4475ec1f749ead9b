use std::path::PathBuf;

use reeltrack_core::{
    config::UpdaterConfig,
    notifiers::WebhookConfig,
    sources::SourcesConfig,
    update::{GlobalWords, MaintenanceHookConfig},
};
use serde::{Deserialize, Serialize};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub store: FileStoreConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
    #[serde(default)]
    pub schedule: FileScheduleConfig,
    #[serde(default)]
    pub updater: UpdaterConfig,
    #[serde(default)]
    pub release_words: GlobalWords,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub maintenance_hooks: Vec<MaintenanceHookConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStoreConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_max_count: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileScheduleConfig {
    /// Human readable interval, e.g. `"24h"` or `"1day"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_on_startup: Option<bool>,
}

/// Overrides gathered from the process environment.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub update_interval: Option<String>,
    pub store_path: Option<PathBuf>,
    pub cache_root: Option<PathBuf>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: std::env::var("REELTRACK_CONFIG").ok().map(PathBuf::from),
            server_host: non_empty_var("REELTRACK_HOST"),
            server_port: std::env::var("REELTRACK_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
            update_interval: non_empty_var("REELTRACK_UPDATE_INTERVAL"),
            store_path: non_empty_var("REELTRACK_STORE_PATH").map(PathBuf::from),
            cache_root: non_empty_var("REELTRACK_CACHE_DIR").map(PathBuf::from),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

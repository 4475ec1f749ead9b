use std::{path::PathBuf, time::Duration};

use reeltrack_core::{
    config::UpdaterConfig,
    notifiers::WebhookConfig,
    sources::SourcesConfig,
    update::{GlobalWords, MaintenanceHookConfig},
};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub schedule: ScheduleConfig,
    pub updater: UpdaterConfig,
    pub release_words: GlobalWords,
    pub webhooks: Vec<WebhookConfig>,
    pub sources: SourcesConfig,
    /// External steps for maintenance stages with no built-in step.
    pub maintenance_hooks: Vec<MaintenanceHookConfig>,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub backup_dir: PathBuf,
    /// Zero disables backups.
    pub backup_max_count: usize,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub update_interval: Duration,
    pub run_on_startup: bool,
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

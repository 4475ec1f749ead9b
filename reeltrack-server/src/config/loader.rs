use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use once_cell::sync::Lazy;
use thiserror::Error;

use super::{
    models::{
        CacheConfig, Config, ConfigMetadata, ConfigWarnings, ScheduleConfig, ServerConfig,
        StoreConfig,
    },
    sources::{EnvConfig, FileConfig},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("reeltrack.toml"),
        PathBuf::from("config/reeltrack.toml"),
    ]
});

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8081;
const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_BACKUP_MAX_COUNT: usize = 3;

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

/// Which source named the config file, in precedence order.
#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

impl ConfigPathSource {
    fn is_empty(&self) -> bool {
        self.explicit.is_none() && self.env.is_none()
    }

    /// Resolved path and whether the user asked for it by name.
    fn resolved_path(self) -> Option<(PathBuf, bool)> {
        self.explicit
            .map(|p| (p, true))
            .or_else(|| self.env.map(|p| (p, true)))
            .or_else(|| self.default.map(|p| (p, false)))
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path)
                .map(|_| true)
                .or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        self.load_with_env(EnvConfig::gather(), env_file_loaded)
    }

    /// Load using an explicit set of environment overrides.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
        env_file_loaded: bool,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) = compose_config(file_config, env, config_path, env_file_loaded)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env.config_path {
            source.env = Some(from_env.clone());
        }

        if source.is_empty() {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
        }

        let Some((path, explicit)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

pub(crate) fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
    env_file_loaded: bool,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if file_config.is_none() {
        warnings.push_with_hint(
            "No reeltrack.toml detected; using defaults and environment variables",
            "Create reeltrack.toml or pass --config to tune the update schedule",
        );
    }

    let FileConfig {
        server: file_server,
        store: file_store,
        cache: file_cache,
        schedule: file_schedule,
        updater,
        release_words,
        webhooks,
        sources,
        maintenance_hooks,
    } = file_config.unwrap_or_default();

    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(DEFAULT_PORT),
    };

    let store_path = env
        .store_path
        .or(file_store.path)
        .unwrap_or_else(|| PathBuf::from("./data/shows.json"));
    let backup_dir = file_store
        .backup_dir
        .unwrap_or_else(|| default_backup_dir(&store_path));
    let store = StoreConfig {
        path: store_path,
        backup_dir,
        backup_max_count: file_store.backup_max_count.unwrap_or(DEFAULT_BACKUP_MAX_COUNT),
    };

    let cache = CacheConfig {
        root: env
            .cache_root
            .or(file_cache.root)
            .unwrap_or_else(|| PathBuf::from("./cache")),
    };

    let update_interval = match env.update_interval.or(file_schedule.update_interval) {
        Some(raw) => parse_duration("schedule.update_interval", &raw)?,
        None => DEFAULT_UPDATE_INTERVAL,
    };
    let schedule = ScheduleConfig {
        update_interval,
        run_on_startup: file_schedule.run_on_startup.unwrap_or(false),
    };

    let staleness = &updater.staleness;
    if staleness.force_after_days <= staleness.stale_after_days {
        warnings.push_with_hint(
            format!(
                "force_after_days ({}) is not greater than stale_after_days ({}); \
                 the bounded stale batch will always be empty",
                staleness.force_after_days, staleness.stale_after_days
            ),
            "Set updater.staleness.force_after_days above stale_after_days",
        );
    }
    if store.backup_max_count == 0 {
        warnings.push("store.backup_max_count is 0; show store backups are disabled");
    }
    for hook in webhooks.iter().filter(|hook| hook.url.trim().is_empty()) {
        warnings.push(format!("webhook '{}' has no url and will always fail", hook.id));
    }
    for hook in maintenance_hooks.iter().filter(|hook| hook.url.trim().is_empty()) {
        warnings.push(format!(
            "maintenance hook '{}' has no url and will always fail",
            hook.name
        ));
    }
    if sources.tvmaze.as_ref().is_none_or(|tvmaze| !tvmaze.enabled) {
        warnings.push_with_hint(
            "No metadata source enabled; shows are only updated once they go stale",
            "Add a [sources.tvmaze] section to follow remote changes",
        );
    }

    let config = Config {
        server,
        store,
        cache,
        schedule,
        updater,
        release_words,
        webhooks,
        sources,
        maintenance_hooks,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded,
        },
    };

    Ok((config, warnings))
}

fn default_backup_dir(store_path: &Path) -> PathBuf {
    store_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(|parent| parent.join("backup"))
        .unwrap_or_else(|| PathBuf::from("backup"))
}

fn parse_duration(field: &'static str, raw: &str) -> Result<Duration, ConfigLoadError> {
    let value = humantime::parse_duration(raw.trim()).map_err(|source| {
        ConfigLoadError::InvalidDuration {
            field,
            value: raw.to_string(),
            source,
        }
    })?;
    if value.is_zero() {
        return Err(ConfigLoadError::ZeroDuration { field });
    }
    Ok(value)
}

pub mod loader;
pub mod models;
pub mod sources;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    CacheConfig, Config, ConfigMetadata, ConfigWarning, ConfigWarnings, ScheduleConfig,
    ServerConfig, StoreConfig,
};

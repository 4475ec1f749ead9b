use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::InfoSource;

/// Production id -> time of the last remote change.
pub type UpdatedShows = HashMap<u64, DateTime<Utc>>;

/// Client for a remote metadata source (TVmaze, TMDB, ...).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn source(&self) -> InfoSource;

    /// Shows whose remote metadata changed since `since`.
    async fn updated_shows(&self, since: DateTime<Utc>) -> Result<UpdatedShows>;

    /// Validate the local response cache, rebuilding it if it is corrupt.
    async fn check_cache(&self) -> Result<()>;

    /// Drop expired entries from the local response cache.
    async fn clean_cache(&self) -> Result<()>;
}

/// Cross-references show ids between metadata sources.
#[async_trait]
pub trait IdMapper: Send + Sync {
    /// Fill in missing id mappings for tracked shows. Returns how many were
    /// added.
    async fn refresh_missing(&self) -> Result<usize>;
}

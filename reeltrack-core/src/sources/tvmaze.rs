//! TVmaze client: change feed for the staleness selector, response cache
//! upkeep and cross-source id lookups.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::ports::{IdMapper, MetadataSource, ShowStore, UpdatedShows};
use crate::types::InfoSource;
use crate::update::prune_cache_dir;

pub const DEFAULT_BASE_URL: &str = "https://api.tvmaze.com";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TvmazeConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Defaults to `tvmaze/` under the cache root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_cache_max_age_hours")]
    pub cache_max_age_hours: u64,
}

impl Default for TvmazeConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_base_url(),
            cache_dir: None,
            timeout_secs: default_timeout_secs(),
            cache_max_age_hours: default_cache_max_age_hours(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_cache_max_age_hours() -> u64 {
    24
}

/// Ids TVmaze knows for a show on other sources.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ShowExternals {
    #[serde(default)]
    pub thetvdb: Option<u64>,
    #[serde(default)]
    pub imdb: Option<String>,
}

impl ShowExternals {
    /// Usable mappings. IMDb ids are stored without their `tt` prefix.
    pub fn mappings(&self) -> Vec<(InfoSource, u64)> {
        let mut found = Vec::new();
        if let Some(tvdb) = self.thetvdb {
            found.push((InfoSource::Tvdb, tvdb));
        }
        if let Some(imdb) = self
            .imdb
            .as_deref()
            .and_then(|raw| raw.strip_prefix("tt"))
            .and_then(|digits| digits.parse().ok())
        {
            found.push((InfoSource::Imdb, imdb));
        }
        found
    }
}

#[derive(Deserialize)]
struct ShowLookup {
    #[serde(default)]
    externals: ShowExternals,
}

/// Smallest TVmaze update window covering `age`.
fn update_period(age: chrono::Duration) -> &'static str {
    if age <= chrono::Duration::days(1) {
        "day"
    } else if age <= chrono::Duration::weeks(1) {
        "week"
    } else {
        "month"
    }
}

/// Parse an `/updates/shows` body (`{"<id>": <unix seconds>}`), keeping
/// changes at or after `since`. Malformed entries are skipped.
pub fn parse_updates(body: &[u8], since: DateTime<Utc>) -> Result<UpdatedShows> {
    let raw: HashMap<String, i64> = serde_json::from_slice(body)?;
    Ok(raw
        .into_iter()
        .filter_map(|(id, stamp)| {
            let id = id.parse::<u64>().ok()?;
            let changed = DateTime::from_timestamp(stamp, 0)?;
            (changed >= since).then_some((id, changed))
        })
        .collect())
}

pub struct TvmazeClient {
    base_url: String,
    cache_dir: PathBuf,
    cache_max_age: Duration,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TvmazeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TvmazeClient")
            .field("base_url", &self.base_url)
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl TvmazeClient {
    pub fn new(config: &TvmazeConfig, cache_dir: PathBuf, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache_dir,
            cache_max_age: Duration::from_secs(config.cache_max_age_hours * 60 * 60),
            client,
            clock,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(body.to_vec())
    }

    /// Look up the ids TVmaze holds for `prodid` on other sources.
    pub async fn externals(&self, prodid: u64) -> Result<ShowExternals> {
        let body = self
            .fetch(&format!("{}/shows/{prodid}", self.base_url))
            .await?;
        let lookup: ShowLookup = serde_json::from_slice(&body)?;
        Ok(lookup.externals)
    }

    async fn write_cache(&self, path: &Path, body: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).await?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataSource for TvmazeClient {
    fn source(&self) -> InfoSource {
        InfoSource::Tvmaze
    }

    /// Falls back to the last cached feed for the same window when TVmaze
    /// cannot be reached.
    async fn updated_shows(&self, since: DateTime<Utc>) -> Result<UpdatedShows> {
        let period = update_period(self.clock.now() - since);
        let url = format!("{}/updates/shows?since={period}", self.base_url);
        let cache_path = self.cache_dir.join(format!("updates-{period}.json"));

        let body = match self.fetch(&url).await {
            Ok(body) => {
                if let Err(err) = self.write_cache(&cache_path, &body).await {
                    warn!(
                        path = %cache_path.display(),
                        error = %err,
                        "cannot cache tvmaze updates"
                    );
                }
                body
            }
            Err(err) => match fs::read(&cache_path).await {
                Ok(cached) => {
                    warn!(error = %err, period, "tvmaze unreachable; using cached updates");
                    cached
                }
                Err(_) => return Err(err),
            },
        };

        let updated = parse_updates(&body, since)?;
        debug!(period, shows = updated.len(), "tvmaze updates loaded");
        Ok(updated)
    }

    async fn check_cache(&self) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).await?;
        let mut entries = fs::read_dir(&self.cache_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let body = fs::read(&path).await?;
            if serde_json::from_slice::<serde_json::Value>(&body).is_err() {
                warn!(path = %path.display(), "removing corrupt tvmaze cache file");
                fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }

    async fn clean_cache(&self) -> Result<()> {
        prune_cache_dir(&self.cache_dir, self.cache_max_age, SystemTime::now()).await?;
        Ok(())
    }
}

/// Fills in other-source ids for TVmaze-tracked shows that have none yet.
pub struct TvmazeIdMapper {
    client: Arc<TvmazeClient>,
    store: Arc<dyn ShowStore>,
}

impl fmt::Debug for TvmazeIdMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TvmazeIdMapper")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl TvmazeIdMapper {
    pub fn new(client: Arc<TvmazeClient>, store: Arc<dyn ShowStore>) -> Self {
        Self { client, store }
    }
}

#[async_trait]
impl IdMapper for TvmazeIdMapper {
    async fn refresh_missing(&self) -> Result<usize> {
        let mut added = 0usize;
        for mut show in self.store.all_shows().await? {
            if show.id.source != InfoSource::Tvmaze || !show.external_ids.is_empty() {
                continue;
            }
            let externals = match self.client.externals(show.id.prodid).await {
                Ok(externals) => externals,
                Err(err) => {
                    warn!(show = %show.id, error = %err, "tvmaze id lookup failed");
                    continue;
                }
            };
            let new = externals
                .mappings()
                .into_iter()
                .filter(|(source, prodid)| show.add_external_id(*source, *prodid))
                .count();
            if new > 0 {
                self.store.save_show(&show).await?;
                added += new;
            }
        }
        if added > 0 {
            info!(added, "mapped tvmaze shows to other sources");
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::tempdir;

    use super::*;
    use crate::clock::FakeClock;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 4, 0, 0).unwrap()
    }

    fn client(cache_dir: PathBuf) -> TvmazeClient {
        let config = TvmazeConfig {
            base_url: "http://127.0.0.1:9/".into(),
            timeout_secs: 2,
            ..TvmazeConfig::default()
        };
        TvmazeClient::new(&config, cache_dir, Arc::new(FakeClock::new(now())))
            .expect("client builds")
    }

    #[test]
    fn period_covers_the_lookback() {
        assert_eq!(update_period(chrono::Duration::hours(6)), "day");
        assert_eq!(update_period(chrono::Duration::days(7)), "week");
        assert_eq!(update_period(chrono::Duration::days(8)), "month");
    }

    #[test]
    fn updates_before_since_and_bad_ids_are_dropped() {
        let since = now() - chrono::Duration::days(7);
        let fresh = (now() - chrono::Duration::days(1)).timestamp();
        let old = (now() - chrono::Duration::days(9)).timestamp();
        let body = format!(r#"{{"1": {fresh}, "2": {old}, "x": {fresh}}}"#);

        let updated = parse_updates(body.as_bytes(), since).expect("valid body");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[&1].timestamp(), fresh);
    }

    #[test]
    fn externals_map_tvdb_and_imdb() {
        let lookup: ShowLookup = serde_json::from_str(
            r#"{"id": 82, "externals": {"tvrage": 24493, "thetvdb": 121361, "imdb": "tt0944947"}}"#,
        )
        .expect("lookup parses");
        assert_eq!(
            lookup.externals.mappings(),
            vec![(InfoSource::Tvdb, 121361), (InfoSource::Imdb, 944947)]
        );

        let bare: ShowLookup = serde_json::from_str(r#"{"id": 1}"#).expect("no externals");
        assert!(bare.externals.mappings().is_empty());
    }

    #[tokio::test]
    async fn unreachable_feed_falls_back_to_cache() {
        let dir = tempdir().expect("tempdir");
        let client = client(dir.path().to_path_buf());
        let since = now() - chrono::Duration::days(7);

        assert!(client.updated_shows(since).await.is_err());

        let stamp = (now() - chrono::Duration::hours(3)).timestamp();
        fs::write(dir.path().join("updates-week.json"), format!(r#"{{"5": {stamp}}}"#))
            .await
            .expect("seed cache");
        let updated = client.updated_shows(since).await.expect("cached copy");
        assert!(updated.contains_key(&5));
    }

    #[tokio::test]
    async fn check_cache_removes_corrupt_files_only() {
        let dir = tempdir().expect("tempdir");
        let cache = dir.path().join("tvmaze");
        let client = client(cache.clone());

        client.check_cache().await.expect("creates dir");
        assert!(cache.is_dir());

        fs::write(cache.join("updates-day.json"), b"{\"1\": 2}").await.unwrap();
        fs::write(cache.join("updates-week.json"), b"{truncated").await.unwrap();
        fs::write(cache.join("notes.txt"), b"not json").await.unwrap();

        client.check_cache().await.expect("check");
        assert!(cache.join("updates-day.json").exists());
        assert!(!cache.join("updates-week.json").exists());
        assert!(cache.join("notes.txt").exists());
    }
}

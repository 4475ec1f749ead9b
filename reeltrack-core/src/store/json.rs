use std::{
    fmt,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::ports::store::{ShowStore, StaleQuery};
use crate::types::{ShowId, TrackedShow};

use super::memory::InMemoryShowStore;

const BACKUP_PREFIX: &str = "shows-";
const BACKUP_SUFFIX: &str = ".json";

/// Where and how many backups the JSON store keeps.
#[derive(Clone, Debug)]
pub struct BackupPolicy {
    pub dir: PathBuf,
    /// Zero disables backups.
    pub max_count: usize,
}

/// Show store persisted as a single JSON document.
///
/// Reads are served from memory; every save rewrites the file through a
/// temporary sibling and a rename so a crash never leaves a torn document.
pub struct JsonFileShowStore {
    path: PathBuf,
    backups: Option<BackupPolicy>,
    shows: InMemoryShowStore,
    write_lock: Mutex<()>,
}

impl fmt::Debug for JsonFileShowStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFileShowStore")
            .field("path", &self.path)
            .field("backups", &self.backups)
            .field("show_count", &self.shows.len())
            .finish()
    }
}

impl JsonFileShowStore {
    /// Open the store at `path`. A missing file yields an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let shows = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<TrackedShow>>(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "show store not found; starting empty");
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };

        debug!(path = %path.display(), shows = shows.len(), "loaded show store");

        Ok(Self {
            path,
            backups: None,
            shows: InMemoryShowStore::new(shows),
            write_lock: Mutex::new(()),
        })
    }

    pub fn with_backups(mut self, policy: BackupPolicy) -> Self {
        self.backups = Some(policy);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let bytes = serde_json::to_vec_pretty(&self.shows.snapshot())?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn prune_backups(dir: &Path, keep: usize) -> Result<usize> {
        let mut backups = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_SUFFIX) {
                backups.push(entry.path());
            }
        }

        // Timestamped names sort chronologically.
        backups.sort();
        let excess = backups.len().saturating_sub(keep);
        for old in backups.iter().take(excess) {
            if let Err(err) = tokio::fs::remove_file(old).await {
                warn!(path = %old.display(), error = %err, "failed to remove old backup");
            }
        }
        Ok(excess)
    }
}

#[async_trait]
impl ShowStore for JsonFileShowStore {
    async fn stale_show_ids(&self, query: StaleQuery) -> Result<Vec<ShowId>> {
        self.shows.stale_show_ids(query).await
    }

    async fn all_shows(&self) -> Result<Vec<TrackedShow>> {
        self.shows.all_shows().await
    }

    async fn get_show(&self, id: ShowId) -> Result<Option<TrackedShow>> {
        self.shows.get_show(id).await
    }

    async fn save_show(&self, show: &TrackedShow) -> Result<()> {
        self.shows.upsert(show);
        self.persist().await
    }

    async fn backup(&self) -> Result<Option<PathBuf>> {
        let Some(policy) = self.backups.as_ref().filter(|p| p.max_count > 0) else {
            return Ok(None);
        };

        // Persist first so the backup reflects in-memory state even when the
        // file has never been written.
        self.persist().await?;
        tokio::fs::create_dir_all(&policy.dir).await?;

        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let target = policy
            .dir
            .join(format!("{BACKUP_PREFIX}{stamp}{BACKUP_SUFFIX}"));
        {
            let _guard = self.write_lock.lock().await;
            tokio::fs::copy(&self.path, &target).await?;
        }

        let removed = Self::prune_backups(&policy.dir, policy.max_count).await?;
        info!(
            backup = %target.display(),
            removed_old = removed,
            "show store backed up"
        );
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::*;
    use crate::types::InfoSource;

    fn show(prodid: u64) -> TrackedShow {
        TrackedShow::new(
            ShowId::new(InfoSource::Tvmaze, prodid),
            format!("Show {prodid}"),
            format!("/tv/Show {prodid}"),
            NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
        )
    }

    #[tokio::test]
    async fn saved_shows_survive_reopen() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("data").join("shows.json");

        let store = JsonFileShowStore::open(&path).await.expect("open");
        store.save_show(&show(1)).await.expect("save 1");
        store.save_show(&show(2)).await.expect("save 2");

        let reopened = JsonFileShowStore::open(&path).await.expect("reopen");
        let shows = reopened.all_shows().await.expect("all shows");
        assert_eq!(shows.len(), 2);
        assert_eq!(shows[0].id, show(1).id);
    }

    #[tokio::test]
    async fn backup_keeps_at_most_max_count_files() {
        let tmp = tempdir().expect("tempdir");
        let backup_dir = tmp.path().join("backup");
        let store = JsonFileShowStore::open(tmp.path().join("shows.json"))
            .await
            .expect("open")
            .with_backups(BackupPolicy {
                dir: backup_dir.clone(),
                max_count: 2,
            });
        store.save_show(&show(1)).await.expect("save");

        for _ in 0..4 {
            store.backup().await.expect("backup").expect("backup path");
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let mut entries = tokio::fs::read_dir(&backup_dir).await.expect("read dir");
        let mut count = 0;
        while entries.next_entry().await.expect("entry").is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn backup_without_policy_is_a_no_op() {
        let tmp = tempdir().expect("tempdir");
        let store = JsonFileShowStore::open(tmp.path().join("shows.json"))
            .await
            .expect("open");
        assert!(store.backup().await.expect("backup").is_none());
    }
}

use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::Result;

/// Counts from one pruning pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub files_removed: usize,
    pub dirs_removed: usize,
}

/// Remove files under `root` last modified more than `max_age` before `now`,
/// then any directory left empty. `root` itself is kept. A missing root is
/// not an error; individual entries that cannot be removed are logged.
pub async fn prune_cache_dir(
    root: &Path,
    max_age: Duration,
    now: SystemTime,
) -> Result<PruneStats> {
    let mut stats = PruneStats::default();

    if !fs::try_exists(root).await? {
        debug!(root = %root.display(), "cache root does not exist; nothing to prune");
        return Ok(stats);
    }

    let cutoff = now.checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);
    let mut pending = vec![root.to_path_buf()];
    let mut visited_dirs: Vec<PathBuf> = Vec::new();

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "cannot read cache directory");
                continue;
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot stat cache entry");
                    continue;
                }
            };

            if file_type.is_dir() {
                pending.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot read cache file age");
                    continue;
                }
            };
            if modified < cutoff {
                match fs::remove_file(&path).await {
                    Ok(()) => stats.files_removed += 1,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "failed to remove cache file")
                    }
                }
            }
        }

        if dir != root {
            visited_dirs.push(dir);
        }
    }

    // Deepest paths first so parents see their children already gone.
    visited_dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
    for dir in visited_dirs {
        if is_empty_dir(&dir).await && fs::remove_dir(&dir).await.is_ok() {
            stats.dirs_removed += 1;
        }
    }

    debug!(
        root = %root.display(),
        files = stats.files_removed,
        dirs = stats.dirs_removed,
        "cache pruned"
    );
    Ok(stats)
}

async fn is_empty_dir(dir: &Path) -> bool {
    match fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    #[tokio::test]
    async fn removes_old_files_and_empty_dirs() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("images/posters")).await.unwrap();
        fs::create_dir_all(root.join("keep")).await.unwrap();
        fs::write(root.join("images/posters/1.jpg"), b"x").await.unwrap();
        fs::write(root.join("keep/2.jpg"), b"y").await.unwrap();

        // Files were written just now; pretend it is 13 hours later.
        let later = SystemTime::now() + 13 * HOUR;
        let stats = prune_cache_dir(root, 12 * HOUR, later).await.unwrap();

        assert_eq!(stats.files_removed, 2);
        assert_eq!(stats.dirs_removed, 3);
        assert!(root.exists());
        assert!(!root.join("images").exists());
    }

    #[tokio::test]
    async fn fresh_files_survive() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("a")).await.unwrap();
        fs::write(root.join("a/fresh.json"), b"{}").await.unwrap();

        let stats = prune_cache_dir(root, 12 * HOUR, SystemTime::now() + HOUR)
            .await
            .unwrap();

        assert_eq!(stats, PruneStats::default());
        assert!(root.join("a/fresh.json").exists());
    }

    #[tokio::test]
    async fn missing_root_is_fine() {
        let dir = tempdir().expect("tempdir");
        let stats = prune_cache_dir(&dir.path().join("gone"), HOUR, SystemTime::now())
            .await
            .unwrap();
        assert_eq!(stats, PruneStats::default());
    }
}

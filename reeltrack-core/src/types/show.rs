use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::PathBuf,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::{InfoSource, ShowId};

/// Airing lifecycle reported by the metadata source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShowStatus {
    Continuing,
    Ended,
    #[default]
    Unknown,
}

/// Episode air dates used to decide whether a show sits inside its grace
/// window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EpisodeWindow {
    #[serde(default)]
    pub last_aired: Option<NaiveDate>,
    #[serde(default)]
    pub next_airing: Option<NaiveDate>,
}

/// Per-show release word filters.
///
/// `global_exclude_*` hold global words this show opts out of, so they can
/// only ever be a subset of the matching global list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ReleaseWords {
    #[serde(default)]
    pub ignore: BTreeSet<String>,
    #[serde(default)]
    pub ignore_regex: bool,
    #[serde(default)]
    pub require: BTreeSet<String>,
    #[serde(default)]
    pub require_regex: bool,
    #[serde(default)]
    pub global_exclude_ignore: BTreeSet<String>,
    #[serde(default)]
    pub global_exclude_require: BTreeSet<String>,
}

/// A show tracked by the store. The scheduler only ever borrows these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedShow {
    pub id: ShowId,
    pub name: String,
    pub location: PathBuf,
    pub last_update: NaiveDate,
    #[serde(default)]
    pub status: ShowStatus,
    #[serde(default)]
    pub episodes: EpisodeWindow,
    #[serde(default)]
    pub words: ReleaseWords,
    /// Production ids of the same show on other sources.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_ids: BTreeMap<InfoSource, u64>,
}

impl TrackedShow {
    pub fn new(
        id: ShowId,
        name: impl Into<String>,
        location: impl Into<PathBuf>,
        last_update: NaiveDate,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            location: location.into(),
            last_update,
            status: ShowStatus::default(),
            episodes: EpisodeWindow::default(),
            words: ReleaseWords::default(),
            external_ids: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: ShowStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_episodes(mut self, episodes: EpisodeWindow) -> Self {
        self.episodes = episodes;
        self
    }

    /// Record the show's id on another source. Returns `false` when the
    /// mapping is unusable or already known.
    pub fn add_external_id(&mut self, source: InfoSource, prodid: u64) -> bool {
        if source == self.id.source || prodid == 0 {
            return false;
        }
        self.external_ids.insert(source, prodid) != Some(prodid)
    }

    /// Drop mappings that point back at the show's own source or carry no
    /// id. Returns how many were removed.
    pub fn prune_external_ids(&mut self) -> usize {
        let own = self.id.source;
        let before = self.external_ids.len();
        self.external_ids
            .retain(|source, prodid| *source != own && *prodid != 0);
        before - self.external_ids.len()
    }
}

/// What the scheduler decided to do with a show this run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAction {
    FullUpdate,
    Refresh,
}

/// Kind of task held by the show queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueueActionKind {
    Update,
    Refresh,
}

impl fmt::Display for QueueActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueActionKind::Update => f.write_str("update"),
            QueueActionKind::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshOptions {
    pub with_episodes: bool,
    pub with_images: bool,
}

impl RefreshOptions {
    pub const FULL: RefreshOptions = RefreshOptions {
        with_episodes: true,
        with_images: true,
    };
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self::FULL
    }
}

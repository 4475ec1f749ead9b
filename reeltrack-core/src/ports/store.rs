use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::types::{ShowId, TrackedShow};

/// Candidate lookups by `last_update`, evaluated by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaleQuery {
    /// `newer_than < last_update <= at_or_before`, oldest first, capped at
    /// `limit` rows.
    Window {
        newer_than: NaiveDate,
        at_or_before: NaiveDate,
        limit: usize,
    },
    /// Every show with `last_update <= at_or_before`.
    AtOrBefore { at_or_before: NaiveDate },
}

impl StaleQuery {
    pub fn matches(&self, last_update: NaiveDate) -> bool {
        match *self {
            StaleQuery::Window {
                newer_than,
                at_or_before,
                ..
            } => newer_than < last_update && last_update <= at_or_before,
            StaleQuery::AtOrBefore { at_or_before } => last_update <= at_or_before,
        }
    }

    /// Evaluates the query over an in-memory collection of shows.
    pub fn evaluate<'a, I>(&self, shows: I) -> Vec<ShowId>
    where
        I: IntoIterator<Item = &'a TrackedShow>,
    {
        let mut matched: Vec<&TrackedShow> = shows
            .into_iter()
            .filter(|show| self.matches(show.last_update))
            .collect();

        match *self {
            StaleQuery::Window { limit, .. } => {
                // Stable sort keeps store order between equal dates.
                matched.sort_by_key(|show| show.last_update);
                matched.truncate(limit);
            }
            StaleQuery::AtOrBefore { .. } => {}
        }

        matched.into_iter().map(|show| show.id).collect()
    }
}

/// Persistent show storage consumed by the scheduler.
#[async_trait]
pub trait ShowStore: Send + Sync {
    async fn stale_show_ids(&self, query: StaleQuery) -> Result<Vec<ShowId>>;

    async fn all_shows(&self) -> Result<Vec<TrackedShow>>;

    async fn get_show(&self, id: ShowId) -> Result<Option<TrackedShow>>;

    /// Insert or replace a show.
    async fn save_show(&self, show: &TrackedShow) -> Result<()>;

    /// Write a backup copy of the store. Returns the backup location, or
    /// `None` when the backend has nothing to back up.
    async fn backup(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

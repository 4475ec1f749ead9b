use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::ports::store::{ShowStore, StaleQuery};
use crate::types::{ShowId, TrackedShow};

/// Show store kept entirely in memory. Iteration order is insertion order.
#[derive(Default)]
pub struct InMemoryShowStore {
    shows: RwLock<Vec<TrackedShow>>,
}

impl fmt::Debug for InMemoryShowStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryShowStore")
            .field("show_count", &self.shows.read().len())
            .finish()
    }
}

impl InMemoryShowStore {
    pub fn new(shows: Vec<TrackedShow>) -> Self {
        Self {
            shows: RwLock::new(shows),
        }
    }

    pub fn len(&self) -> usize {
        self.shows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shows.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<TrackedShow> {
        self.shows.read().clone()
    }

    pub(crate) fn upsert(&self, show: &TrackedShow) {
        let mut shows = self.shows.write();
        match shows.iter_mut().find(|existing| existing.id == show.id) {
            Some(existing) => *existing = show.clone(),
            None => shows.push(show.clone()),
        }
    }
}

#[async_trait]
impl ShowStore for InMemoryShowStore {
    async fn stale_show_ids(&self, query: StaleQuery) -> Result<Vec<ShowId>> {
        Ok(query.evaluate(self.shows.read().iter()))
    }

    async fn all_shows(&self) -> Result<Vec<TrackedShow>> {
        Ok(self.snapshot())
    }

    async fn get_show(&self, id: ShowId) -> Result<Option<TrackedShow>> {
        Ok(self.shows.read().iter().find(|show| show.id == id).cloned())
    }

    async fn save_show(&self, show: &TrackedShow) -> Result<()> {
        self.upsert(show);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::types::InfoSource;

    fn show(prodid: u64, last_update: NaiveDate) -> TrackedShow {
        TrackedShow::new(
            ShowId::new(InfoSource::Tvdb, prodid),
            format!("Show {prodid}"),
            format!("/tv/Show {prodid}"),
            last_update,
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
    }

    #[tokio::test]
    async fn window_query_is_bounded_and_oldest_first() {
        let today = today();
        let t1 = today - Duration::days(90);
        let t2 = today - Duration::days(180);

        // 15 shows spread through (t2, t1], inserted newest first.
        let shows: Vec<TrackedShow> = (0..15)
            .map(|i| show(i, t1 - Duration::days(i as i64 * 5)))
            .collect();
        let store = InMemoryShowStore::new(shows);

        let ids = store
            .stale_show_ids(StaleQuery::Window {
                newer_than: t2,
                at_or_before: t1,
                limit: 10,
            })
            .await
            .expect("query succeeds");

        assert_eq!(ids.len(), 10);
        let expected: Vec<u64> = (5..15).rev().collect();
        let got: Vec<u64> = ids.iter().map(|id| id.prodid).collect();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn window_query_excludes_both_outer_bounds() {
        let today = today();
        let t1 = today - Duration::days(90);
        let t2 = today - Duration::days(180);
        let store = InMemoryShowStore::new(vec![
            show(1, t1),
            show(2, t1 + Duration::days(1)),
            show(3, t2),
            show(4, t2 + Duration::days(1)),
        ]);

        let window = store
            .stale_show_ids(StaleQuery::Window {
                newer_than: t2,
                at_or_before: t1,
                limit: 10,
            })
            .await
            .expect("window");
        let very_stale = store
            .stale_show_ids(StaleQuery::AtOrBefore { at_or_before: t2 })
            .await
            .expect("very stale");

        let window: Vec<u64> = window.iter().map(|id| id.prodid).collect();
        let very_stale: Vec<u64> = very_stale.iter().map(|id| id.prodid).collect();
        assert_eq!(window, vec![4, 1]);
        assert_eq!(very_stale, vec![3]);
    }

    #[tokio::test]
    async fn save_show_replaces_existing_entry() {
        let store = InMemoryShowStore::new(vec![show(1, today())]);
        let mut updated = show(1, today());
        updated.name = "Renamed".into();

        store.save_show(&updated).await.expect("save");

        assert_eq!(store.len(), 1);
        let fetched = store
            .get_show(updated.id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(fetched.name, "Renamed");
    }
}

use std::{collections::VecDeque, fmt, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::clock::Clock;
use crate::types::ShowId;

/// Outcome of a manual episode search, kept briefly for the UI.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ManualSearchRecord {
    pub show: ShowId,
    pub episode: String,
    pub success: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Bounded FIFO of recent manual search results.
///
/// The episode search subsystem lives outside this crate and records its
/// results through [`record`](Self::record) on the shared handle. The
/// daily run only purges it.
pub struct ManualSearchHistory {
    records: Mutex<VecDeque<ManualSearchRecord>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ManualSearchHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualSearchHistory")
            .field("len", &self.records.lock().len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl ManualSearchHistory {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(clock, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            clock,
        }
    }

    pub fn record(&self, show: ShowId, episode: impl Into<String>, success: bool) {
        let record = ManualSearchRecord {
            show,
            episode: episode.into(),
            success,
            recorded_at: self.clock.now(),
        };
        let mut records = self.records.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Drop records older than `max_age`. Returns how many were removed.
    pub fn remove_older_than(&self, max_age: Duration) -> usize {
        let cutoff = self.clock.now() - max_age;
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|record| record.recorded_at >= cutoff);
        before - records.len()
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<ManualSearchRecord> {
        self.records.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::types::InfoSource;

    fn id(prodid: u64) -> ShowId {
        ShowId::new(InfoSource::Tvdb, prodid)
    }

    #[test]
    fn old_records_are_purged() {
        let clock = FakeClock::default();
        let history = ManualSearchHistory::new(Arc::new(clock.clone()));

        history.record(id(1), "S01E01", true);
        clock.advance(Duration::minutes(20));
        history.record(id(2), "S01E02", false);
        clock.advance(Duration::minutes(15));

        assert_eq!(history.remove_older_than(Duration::minutes(30)), 1);
        let left = history.recent();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].show, id(2));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let history = ManualSearchHistory::with_capacity(Arc::new(FakeClock::default()), 2);
        for prodid in 1..=3 {
            history.record(id(prodid), "S01E01", true);
        }
        let shows: Vec<u64> = history.recent().iter().map(|r| r.show.prodid).collect();
        assert_eq!(shows, vec![2, 3]);
    }
}

//! Progress of dispatched queue batches, as shown to the UI.

use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{Result, ShowError};
use crate::ports::queue::WorkHandle;

/// Label returned when none of a batch's items is running or queued.
pub const UNKNOWN_NEXT_NAME: &str = "Unknown";

/// Well-known progress slots.
pub mod slots {
    pub const DAILY_UPDATE: &str = "dailyUpdate";
    pub const BULK_CHANGE: &str = "bulkChange";
    pub const MASS_ADD: &str = "massAdd";

    pub const DEFAULT: [&str; 3] = [BULK_CHANGE, MASS_ADD, DAILY_UPDATE];
}

/// Read-only view over a fixed batch of queued work.
///
/// Counts are derived from the handles on every call; the queue flips their
/// state concurrently, so nothing is cached.
pub struct QueueProgressIndicator {
    name: String,
    items: Vec<Arc<dyn WorkHandle>>,
}

impl fmt::Debug for QueueProgressIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueProgressIndicator")
            .field("name", &self.name)
            .field("total", &self.num_total())
            .field("remaining", &self.num_remaining())
            .finish()
    }
}

impl QueueProgressIndicator {
    pub fn new(name: impl Into<String>, items: Vec<Arc<dyn WorkHandle>>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_total(&self) -> usize {
        self.items.len()
    }

    pub fn num_remaining(&self) -> usize {
        self.items.iter().filter(|item| item.is_in_queue()).count()
    }

    pub fn num_finished(&self) -> usize {
        self.num_total() - self.num_remaining()
    }

    /// Whole percent finished, truncated. An empty batch reports 0.
    pub fn percent_complete(&self) -> u8 {
        let total = self.num_total();
        if total == 0 {
            return 0;
        }
        // finished <= total, so the quotient is at most 100.
        (self.num_finished() * 100 / total) as u8
    }

    /// Name of the first item in `active` (current item then queued items)
    /// that belongs to this batch.
    pub fn next_name(&self, active: &[Arc<dyn WorkHandle>]) -> String {
        active
            .iter()
            .find(|candidate| self.items.iter().any(|item| item.id() == candidate.id()))
            .map(|item| item.name().to_string())
            .unwrap_or_else(|| UNKNOWN_NEXT_NAME.to_string())
    }

    pub fn snapshot(&self, active: &[Arc<dyn WorkHandle>]) -> ProgressSnapshot {
        let remaining = self.num_remaining();
        let total = self.num_total();
        ProgressSnapshot {
            name: self.name.clone(),
            total,
            finished: total - remaining,
            remaining,
            percent_complete: self.percent_complete(),
            next_name: self.next_name(active),
        }
    }
}

/// Serializable point-in-time view of a [`QueueProgressIndicator`].
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub name: String,
    pub total: usize,
    pub finished: usize,
    pub remaining: usize,
    pub percent_complete: u8,
    pub next_name: String,
}

/// Named slots of in-flight batches.
///
/// The set of slot names is fixed at construction. Finished batches are
/// dropped lazily when a slot is read.
pub struct ProgressIndicators {
    slots: Mutex<HashMap<String, Vec<Arc<QueueProgressIndicator>>>>,
}

impl fmt::Debug for ProgressIndicators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        let mut debug = f.debug_map();
        for (name, indicators) in slots.iter() {
            debug.entry(name, &indicators.len());
        }
        debug.finish()
    }
}

impl Default for ProgressIndicators {
    fn default() -> Self {
        Self::with_slots(slots::DEFAULT)
    }
}

impl ProgressIndicators {
    pub fn with_slots<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = names
            .into_iter()
            .map(|name| (name.into(), Vec::new()))
            .collect();
        Self {
            slots: Mutex::new(slots),
        }
    }

    pub fn slot_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Unfinished batches in `name`. Unknown slots yield an empty list.
    pub fn get(&self, name: &str) -> Vec<Arc<QueueProgressIndicator>> {
        let mut slots = self.slots.lock();
        let Some(indicators) = slots.get_mut(name) else {
            return Vec::new();
        };
        indicators.retain(|indicator| indicator.percent_complete() < 100);
        indicators.clone()
    }

    /// Append a batch to `name`. Batches under the same slot coexist.
    pub fn set(&self, name: &str, indicator: Arc<QueueProgressIndicator>) -> Result<()> {
        let mut slots = self.slots.lock();
        let indicators = slots
            .get_mut(name)
            .ok_or_else(|| ShowError::UnknownSlot(name.to_string()))?;
        indicators.push(indicator);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use uuid::Uuid;

    use super::*;

    #[derive(Debug)]
    pub(crate) struct TestHandle {
        id: Uuid,
        name: String,
        queued: AtomicBool,
    }

    impl TestHandle {
        pub(crate) fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                id: Uuid::now_v7(),
                name: name.to_string(),
                queued: AtomicBool::new(true),
            })
        }

        pub(crate) fn finish(&self) {
            self.queued.store(false, Ordering::SeqCst);
        }
    }

    impl WorkHandle for TestHandle {
        fn id(&self) -> Uuid {
            self.id
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn is_in_queue(&self) -> bool {
            self.queued.load(Ordering::SeqCst)
        }
    }

    fn as_handles(items: &[Arc<TestHandle>]) -> Vec<Arc<dyn WorkHandle>> {
        items
            .iter()
            .map(|item| item.clone() as Arc<dyn WorkHandle>)
            .collect()
    }

    #[test]
    fn empty_batch_reports_zero_percent() {
        let indicator = QueueProgressIndicator::new("Daily Update", Vec::new());
        assert_eq!(indicator.num_total(), 0);
        assert_eq!(indicator.percent_complete(), 0);
        assert_eq!(indicator.next_name(&[]), UNKNOWN_NEXT_NAME);
    }

    #[test]
    fn half_finished_batch_reports_fifty_percent() {
        let items: Vec<_> = ["a", "b", "c", "d"].iter().map(|n| TestHandle::new(n)).collect();
        items[0].finish();
        items[2].finish();
        let indicator = QueueProgressIndicator::new("Daily Update", as_handles(&items));

        assert_eq!(indicator.num_total(), 4);
        assert_eq!(indicator.num_finished(), 2);
        assert_eq!(indicator.num_remaining(), 2);
        assert_eq!(indicator.percent_complete(), 50);
    }

    #[test]
    fn percent_truncates_and_never_decreases() {
        let items: Vec<_> = ["a", "b", "c"].iter().map(|n| TestHandle::new(n)).collect();
        let indicator = QueueProgressIndicator::new("batch", as_handles(&items));

        let mut seen = vec![indicator.percent_complete()];
        for item in &items {
            item.finish();
            seen.push(indicator.percent_complete());
        }

        assert_eq!(seen, vec![0, 33, 66, 100]);
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn next_name_follows_active_order_and_ignores_foreign_items() {
        let mine: Vec<_> = ["Show A", "Show B"].iter().map(|n| TestHandle::new(n)).collect();
        let foreign = TestHandle::new("Other");
        let indicator = QueueProgressIndicator::new("batch", as_handles(&mine));

        let active: Vec<Arc<dyn WorkHandle>> = vec![
            foreign.clone(),
            mine[1].clone(),
            mine[0].clone(),
        ];
        assert_eq!(indicator.next_name(&active), "Show B");

        let only_foreign: Vec<Arc<dyn WorkHandle>> = vec![foreign];
        assert_eq!(indicator.next_name(&only_foreign), UNKNOWN_NEXT_NAME);
    }

    #[test]
    fn get_prunes_finished_batches() {
        let registry = ProgressIndicators::default();
        let done = TestHandle::new("done");
        done.finish();
        let pending = TestHandle::new("pending");

        registry
            .set(
                slots::DAILY_UPDATE,
                Arc::new(QueueProgressIndicator::new("finished", as_handles(&[done]))),
            )
            .expect("known slot");
        registry
            .set(
                slots::DAILY_UPDATE,
                Arc::new(QueueProgressIndicator::new("running", as_handles(&[pending.clone()]))),
            )
            .expect("known slot");

        let current = registry.get(slots::DAILY_UPDATE);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].name(), "running");
        assert!(current.iter().all(|pi| pi.percent_complete() < 100));

        pending.finish();
        assert!(registry.get(slots::DAILY_UPDATE).is_empty());
    }

    #[test]
    fn unknown_slots_read_empty_and_reject_writes() {
        let registry = ProgressIndicators::default();
        assert!(registry.get("nope").is_empty());

        let err = registry
            .set("nope", Arc::new(QueueProgressIndicator::new("x", Vec::new())))
            .expect_err("unknown slot");
        assert!(matches!(err, ShowError::UnknownSlot(name) if name == "nope"));
    }
}

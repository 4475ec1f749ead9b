use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, error, warn};

use crate::config::StalenessConfig;
use crate::ports::{MetadataSource, ShowStore, StaleQuery, UpdatedShows};
use crate::types::{InfoSource, ShowId, TrackedShow, UpdateAction};

use super::policy::{ChangeSignal, UpdatePolicy};

/// Date thresholds for one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaleWindow {
    /// Shows updated on or before this date are moderately stale.
    pub stale_cutoff: NaiveDate,
    /// Shows updated on or before this date are very stale.
    pub force_cutoff: NaiveDate,
    pub batch_limit: usize,
}

impl StaleWindow {
    pub fn for_date(today: NaiveDate, config: &StalenessConfig) -> Self {
        Self {
            stale_cutoff: today - Duration::days(config.stale_after_days),
            force_cutoff: today - Duration::days(config.force_after_days),
            batch_limit: config.stale_batch_limit,
        }
    }

    /// Oldest-first bounded batch from `(force_cutoff, stale_cutoff]`.
    pub fn moderate_query(&self) -> StaleQuery {
        StaleQuery::Window {
            newer_than: self.force_cutoff,
            at_or_before: self.stale_cutoff,
            limit: self.batch_limit,
        }
    }

    /// Everything at or before `force_cutoff`.
    pub fn very_stale_query(&self) -> StaleQuery {
        StaleQuery::AtOrBefore {
            at_or_before: self.force_cutoff,
        }
    }
}

/// A show picked for this run and what to do with it.
#[derive(Clone, Copy, Debug)]
pub struct StaleCandidate<'a> {
    pub show: &'a TrackedShow,
    pub action: UpdateAction,
}

/// Result of a selection pass.
#[derive(Debug, Default)]
pub struct StaleSelection<'a> {
    /// Decided shows, in store order.
    pub candidates: Vec<StaleCandidate<'a>>,
    /// Bounded oldest-first batch (set A).
    pub moderately_stale: Vec<ShowId>,
    /// Unbounded very stale set (set B).
    pub very_stale: Vec<ShowId>,
    /// Shows left out of this run (future dated or policy failure).
    pub skipped: Vec<ShowId>,
}

impl StaleSelection<'_> {
    pub fn count(&self, action: UpdateAction) -> usize {
        self.candidates
            .iter()
            .filter(|candidate| candidate.action == action)
            .count()
    }
}

/// Change signals per metadata source, keyed by production id.
pub type ChangeSignals = HashMap<InfoSource, UpdatedShows>;

fn signal_for(show: &TrackedShow, signals: &ChangeSignals) -> ChangeSignal {
    match signals.get(&show.id.source) {
        Some(updated) => updated
            .get(&show.id.prodid)
            .copied()
            .map(ChangeSignal::Changed)
            .unwrap_or(ChangeSignal::Unchanged),
        None => ChangeSignal::Unavailable,
    }
}

/// Pure decision step: classify every show given the stale sets and change
/// signals gathered for this run.
pub fn classify<'a>(
    today: NaiveDate,
    shows: &'a [TrackedShow],
    moderately_stale: Vec<ShowId>,
    very_stale: Vec<ShowId>,
    signals: &ChangeSignals,
    policy: &dyn UpdatePolicy,
) -> StaleSelection<'a> {
    let forced: HashSet<ShowId> = moderately_stale
        .iter()
        .chain(very_stale.iter())
        .copied()
        .collect();

    let mut selection = StaleSelection {
        candidates: Vec::with_capacity(shows.len()),
        moderately_stale,
        very_stale,
        skipped: Vec::new(),
    };

    for show in shows {
        if show.last_update > today {
            warn!(
                show = %show.id,
                last_update = %show.last_update,
                "show has a future last update date; skipping this run"
            );
            selection.skipped.push(show.id);
            continue;
        }

        let wants_update = match policy.should_update(show, today, signal_for(show, signals)) {
            Ok(wants_update) => wants_update,
            Err(err) => {
                error!(show = %show.id, name = %show.name, error = %err, "update check failed");
                selection.skipped.push(show.id);
                continue;
            }
        };

        let action = if wants_update || forced.contains(&show.id) {
            UpdateAction::FullUpdate
        } else {
            debug!(
                show = %show.id,
                name = %show.name,
                "not updating episodes: show is ended or outside its grace window"
            );
            UpdateAction::Refresh
        };

        selection.candidates.push(StaleCandidate { show, action });
    }

    selection
}

/// Picks which shows get a full update and which only a refresh.
pub struct StalenessSelector {
    store: Arc<dyn ShowStore>,
    sources: Vec<Arc<dyn MetadataSource>>,
    policy: Arc<dyn UpdatePolicy>,
    config: StalenessConfig,
}

impl fmt::Debug for StalenessSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<InfoSource> = self.sources.iter().map(|s| s.source()).collect();
        f.debug_struct("StalenessSelector")
            .field("sources", &sources)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StalenessSelector {
    pub fn new(
        store: Arc<dyn ShowStore>,
        sources: Vec<Arc<dyn MetadataSource>>,
        policy: Arc<dyn UpdatePolicy>,
        config: StalenessConfig,
    ) -> Self {
        Self {
            store,
            sources,
            policy,
            config,
        }
    }

    pub async fn select<'a>(
        &self,
        now: DateTime<Utc>,
        shows: &'a [TrackedShow],
    ) -> StaleSelection<'a> {
        let today = now.date_naive();
        let window = StaleWindow::for_date(today, &self.config);

        let moderately_stale = self.query_or_empty(window.moderate_query()).await;
        let very_stale = self.query_or_empty(window.very_stale_query()).await;
        let signals = self.change_signals(now).await;

        classify(
            today,
            shows,
            moderately_stale,
            very_stale,
            &signals,
            self.policy.as_ref(),
        )
    }

    async fn query_or_empty(&self, query: StaleQuery) -> Vec<ShowId> {
        match self.store.stale_show_ids(query).await {
            Ok(ids) => ids,
            Err(err) => {
                error!(?query, error = %err, "stale show query failed");
                Vec::new()
            }
        }
    }

    async fn change_signals(&self, now: DateTime<Utc>) -> ChangeSignals {
        let since = now - Duration::days(self.config.change_lookback_days);
        let mut signals = ChangeSignals::new();
        for source in &self.sources {
            match source.updated_shows(since).await {
                Ok(updated) => {
                    debug!(
                        source = %source.source(),
                        changed = updated.len(),
                        "fetched updated shows"
                    );
                    signals.entry(source.source()).or_default().extend(updated);
                }
                Err(err) => {
                    warn!(source = %source.source(), error = %err, "failed to fetch updated shows");
                }
            }
        }
        signals
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::error::ShowError;
    use crate::ports::metadata::MockMetadataSource;
    use crate::store::InMemoryShowStore;
    use crate::types::ShowStatus;
    use crate::update::policy::GraceWindowPolicy;

    /// Never asks for a full update on its own.
    struct NeverPolicy;

    impl UpdatePolicy for NeverPolicy {
        fn should_update(
            &self,
            _: &TrackedShow,
            _: NaiveDate,
            _: ChangeSignal,
        ) -> crate::error::Result<bool> {
            Ok(false)
        }
    }

    /// Fails for one production id, refreshes everything else.
    struct FailingPolicy(u64);

    impl UpdatePolicy for FailingPolicy {
        fn should_update(
            &self,
            show: &TrackedShow,
            _: NaiveDate,
            _: ChangeSignal,
        ) -> crate::error::Result<bool> {
            if show.id.prodid == self.0 {
                return Err(ShowError::Policy {
                    show: show.id,
                    message: "missing episode data".into(),
                });
            }
            Ok(false)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap()
    }

    fn show(prodid: u64, days_ago: i64) -> TrackedShow {
        TrackedShow::new(
            ShowId::new(InfoSource::Tvmaze, prodid),
            format!("Show {prodid}"),
            format!("/tv/Show {prodid}"),
            now().date_naive() - Duration::days(days_ago),
        )
        .with_status(ShowStatus::Ended)
    }

    fn selector(shows: &[TrackedShow], policy: Arc<dyn UpdatePolicy>) -> StalenessSelector {
        StalenessSelector::new(
            Arc::new(InMemoryShowStore::new(shows.to_vec())),
            Vec::new(),
            policy,
            StalenessConfig::default(),
        )
    }

    fn action_of(selection: &StaleSelection<'_>, prodid: u64) -> Option<UpdateAction> {
        selection
            .candidates
            .iter()
            .find(|c| c.show.id.prodid == prodid)
            .map(|c| c.action)
    }

    #[test]
    fn window_thresholds_are_calendar_days() {
        let window = StaleWindow::for_date(now().date_naive(), &StalenessConfig::default());
        assert_eq!(window.stale_cutoff, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!(window.force_cutoff, NaiveDate::from_ymd_opt(2023, 12, 4).unwrap());
        assert_eq!(window.batch_limit, 10);
    }

    #[tokio::test]
    async fn stale_sets_force_full_updates_regardless_of_policy() {
        // 12 moderately stale shows, 3 very stale, 2 fresh.
        let mut shows: Vec<TrackedShow> = (0..12).map(|i| show(i, 100 + i as i64)).collect();
        shows.extend((100..103).map(|i| show(i, 400)));
        shows.push(show(200, 5));
        shows.push(show(201, 0));

        let selector = selector(&shows, Arc::new(NeverPolicy));
        let selection = selector.select(now(), &shows).await;

        assert_eq!(selection.moderately_stale.len(), 10);
        let expected: Vec<u64> = (2..12).rev().collect();
        let got: Vec<u64> = selection.moderately_stale.iter().map(|id| id.prodid).collect();
        assert_eq!(got, expected, "oldest first, capped at ten");

        assert_eq!(selection.very_stale.len(), 3);
        for prodid in 100..103 {
            assert_eq!(action_of(&selection, prodid), Some(UpdateAction::FullUpdate));
        }
        // The two newest of the moderately stale shows missed the cap.
        assert_eq!(action_of(&selection, 0), Some(UpdateAction::Refresh));
        assert_eq!(action_of(&selection, 1), Some(UpdateAction::Refresh));
        assert_eq!(action_of(&selection, 200), Some(UpdateAction::Refresh));
        assert_eq!(selection.candidates.len(), shows.len());
    }

    #[tokio::test]
    async fn future_dated_shows_are_never_selected() {
        let shows = vec![show(1, -3), show(2, 200)];
        let selector = selector(&shows, Arc::new(GraceWindowPolicy::new(30)));

        let selection = selector.select(now(), &shows).await;

        let today = now().date_naive();
        assert!(selection.candidates.iter().all(|c| c.show.last_update <= today));
        assert_eq!(selection.skipped, vec![shows[0].id]);
    }

    #[tokio::test]
    async fn policy_failure_skips_only_that_show() {
        let shows = vec![show(1, 1), show(2, 1), show(3, 1)];
        let selector = selector(&shows, Arc::new(FailingPolicy(2)));

        let selection = selector.select(now(), &shows).await;

        assert_eq!(selection.skipped, vec![shows[1].id]);
        assert_eq!(selection.candidates.len(), 2);
        assert_eq!(selection.count(UpdateAction::Refresh), 2);
    }

    #[tokio::test]
    async fn change_signal_from_source_drives_updates() {
        let shows = vec![show(1, 20), show(2, 20)];
        let changed_at = now() - Duration::days(1);

        let mut source = MockMetadataSource::new();
        source.expect_source().return_const(InfoSource::Tvmaze);
        source
            .expect_updated_shows()
            .times(1)
            .returning(move |_| Ok(UpdatedShows::from([(1, changed_at)])));

        let selector = StalenessSelector::new(
            Arc::new(InMemoryShowStore::new(shows.clone())),
            vec![Arc::new(source)],
            Arc::new(GraceWindowPolicy::new(30)),
            StalenessConfig::default(),
        );
        let selection = selector.select(now(), &shows).await;

        assert_eq!(action_of(&selection, 1), Some(UpdateAction::FullUpdate));
        assert_eq!(action_of(&selection, 2), Some(UpdateAction::Refresh));
    }

    #[tokio::test]
    async fn failing_source_leaves_shows_without_signal() {
        let continuing = show(1, 20).with_status(ShowStatus::Continuing);
        let shows = vec![continuing];

        let mut source = MockMetadataSource::new();
        source.expect_source().return_const(InfoSource::Tvmaze);
        source
            .expect_updated_shows()
            .returning(|_| Err(ShowError::Metadata("timeout".into())));

        let selector = StalenessSelector::new(
            Arc::new(InMemoryShowStore::new(shows.clone())),
            vec![Arc::new(source)],
            Arc::new(GraceWindowPolicy::new(30)),
            StalenessConfig::default(),
        );
        let selection = selector.select(now(), &shows).await;

        // Continuing show with no signal falls back to a full update.
        assert_eq!(action_of(&selection, 1), Some(UpdateAction::FullUpdate));
    }
}

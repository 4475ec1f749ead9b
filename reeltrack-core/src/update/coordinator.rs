use std::{
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use futures::FutureExt;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::ports::{ShowQueue, ShowStore};
use crate::progress::{ProgressIndicators, QueueProgressIndicator, slots};
use crate::types::UpdateAction;

use super::dispatcher::UpdateDispatcher;
use super::maintenance::MaintenancePlan;
use super::staleness::StalenessSelector;

/// Display name of the tracker registered for each run.
pub const DAILY_UPDATE_NAME: &str = "Daily Update";

/// Summary of a completed run.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct RunReport {
    pub considered: usize,
    pub full_updates: usize,
    pub refreshes: usize,
    pub dispatched: usize,
    pub skipped: usize,
    pub failed_steps: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run held the active flag; nothing was done.
    AlreadyActive,
    Completed(RunReport),
}

/// Resets the active flag on every exit path, unwinding included.
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Daily update entry point, driven by a timer.
pub struct ShowUpdater {
    active: AtomicBool,
    clock: Arc<dyn Clock>,
    store: Arc<dyn ShowStore>,
    queue: Arc<dyn ShowQueue>,
    selector: StalenessSelector,
    dispatcher: UpdateDispatcher,
    progress: Arc<ProgressIndicators>,
    plan: MaintenancePlan,
}

impl fmt::Debug for ShowUpdater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShowUpdater")
            .field("active", &self.is_active())
            .field("selector", &self.selector)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl ShowUpdater {
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn ShowStore>,
        queue: Arc<dyn ShowQueue>,
        selector: StalenessSelector,
        progress: Arc<ProgressIndicators>,
        plan: MaintenancePlan,
    ) -> Self {
        Self {
            active: AtomicBool::new(false),
            clock,
            store,
            dispatcher: UpdateDispatcher::new(queue.clone()),
            queue,
            selector,
            progress,
            plan,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Run maintenance, then queue every tracked show for an update or a
    /// refresh. Returns [`RunOutcome::AlreadyActive`] untouched when a run is
    /// already in progress.
    pub async fn run(&self) -> RunOutcome {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("show update already running; ignoring trigger");
            return RunOutcome::AlreadyActive;
        }
        let _guard = ActiveGuard(&self.active);

        let started = Instant::now();
        let mut report = RunReport {
            failed_steps: self.run_maintenance().await,
            ..RunReport::default()
        };

        info!("doing full update on all shows");
        let shows = match self.store.all_shows().await {
            Ok(shows) => shows,
            Err(err) => {
                error!(error = %err, "failed to load shows; nothing queued");
                return RunOutcome::Completed(report);
            }
        };

        let selection = self.selector.select(self.clock.now(), &shows).await;
        report.considered = shows.len();
        report.full_updates = selection.count(UpdateAction::FullUpdate);
        report.refreshes = selection.count(UpdateAction::Refresh);
        report.skipped = selection.skipped.len();

        let handles = self.dispatcher.dispatch(&selection.candidates).await;
        report.dispatched = handles.len();

        if !handles.is_empty() {
            self.queue.mark_daily_update();
            let tracker = Arc::new(QueueProgressIndicator::new(DAILY_UPDATE_NAME, handles));
            if let Err(err) = self.progress.set(slots::DAILY_UPDATE, tracker) {
                error!(error = %err, "failed to register daily update progress");
            }
        }

        info!(
            considered = report.considered,
            full_updates = report.full_updates,
            refreshes = report.refreshes,
            dispatched = report.dispatched,
            failed_steps = report.failed_steps.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "added all shows to show queue for full update"
        );
        RunOutcome::Completed(report)
    }

    async fn run_maintenance(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for step in self.plan.steps() {
            match AssertUnwindSafe(step.run()).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(step = step.name(), error = %err, "maintenance step failed");
                    failed.push(step.name().to_string());
                }
                Err(panic) => {
                    let detail = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_default();
                    error!(step = step.name(), panic = %detail, "maintenance step panicked");
                    failed.push(step.name().to_string());
                }
            }
        }
        failed
    }
}

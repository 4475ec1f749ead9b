use std::{sync::Arc, time::Duration};

use reeltrack_core::update::{RunOutcome, ShowUpdater};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ScheduleConfig;

/// Fire the daily update every `update_interval` until cancelled.
pub async fn run_schedule(
    updater: Arc<ShowUpdater>,
    schedule: ScheduleConfig,
    cancel: CancellationToken,
) {
    let period = schedule.update_interval.max(Duration::from_secs(1));
    let start = if schedule.run_on_startup {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval = ?period, run_on_startup = schedule.run_on_startup, "update schedule started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match updater.run().await {
            RunOutcome::AlreadyActive => debug!("scheduled update skipped; a run is in progress"),
            RunOutcome::Completed(report) => debug!(
                dispatched = report.dispatched,
                failed_steps = report.failed_steps.len(),
                "scheduled update finished"
            ),
        }
    }

    info!("update schedule stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reeltrack_core::{
        FakeClock, ShowError,
        config::StalenessConfig,
        progress::ProgressIndicators,
        queue::InMemoryShowQueue,
        store::InMemoryShowStore,
        update::{FnStep, GraceWindowPolicy, MaintenancePlan, Stage, StalenessSelector},
    };

    use super::*;

    fn counting_updater(runs: Arc<AtomicUsize>) -> Arc<ShowUpdater> {
        let store = Arc::new(InMemoryShowStore::default());
        let step = FnStep::new("count", move || {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<(), ShowError>(())
            }
        });
        Arc::new(ShowUpdater::new(
            Arc::new(FakeClock::default()),
            store.clone(),
            Arc::new(InMemoryShowQueue::new()),
            StalenessSelector::new(
                store,
                Vec::new(),
                Arc::new(GraceWindowPolicy::new(365)),
                StalenessConfig::default(),
            ),
            Arc::new(ProgressIndicators::default()),
            MaintenancePlan::new().with_step(Stage::Backup, Arc::new(step)),
        ))
    }

    #[tokio::test]
    async fn runs_on_startup_and_repeats_until_cancelled() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let schedule = ScheduleConfig {
            update_interval: Duration::from_millis(20),
            run_on_startup: true,
        };
        let handle = tokio::spawn(run_schedule(
            counting_updater(runs.clone()),
            schedule,
            cancel.clone(),
        ));

        tokio::time::timeout(Duration::from_secs(5), async {
            while runs.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("two scheduled runs");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("schedule stops")
            .expect("schedule task joined");
    }

    #[tokio::test]
    async fn waits_one_interval_without_startup_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let schedule = ScheduleConfig {
            update_interval: Duration::from_secs(3600),
            run_on_startup: false,
        };
        let handle = tokio::spawn(run_schedule(
            counting_updater(runs.clone()),
            schedule,
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        cancel.cancel();
        handle.await.expect("schedule task joined");
    }
}

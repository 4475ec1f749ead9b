use std::{
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::FutureExt;
use tracing::{debug, error};

/// Slot for at most one detached background job at a time.
#[derive(Clone, Default)]
pub struct BackgroundTask {
    name: Arc<str>,
    running: Arc<AtomicBool>,
}

impl fmt::Debug for BackgroundTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundTask")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BackgroundTask {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawn `job` unless a previous job is still running. Returns whether
    /// it was spawned. Must be called from within a tokio runtime.
    pub fn try_spawn<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(task = %self.name, "background task already running");
            return false;
        }

        let guard = RunningGuard(self.running.clone());
        let name = self.name.clone();
        tokio::spawn(async move {
            let _guard = guard;
            if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                error!(task = %name, "background task panicked");
            }
        });
        true
    }
}

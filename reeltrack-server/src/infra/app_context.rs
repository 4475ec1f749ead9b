use std::{fmt, sync::Arc};

use reeltrack_core::{
    notifications::Notifications,
    progress::ProgressIndicators,
    queue::InMemoryShowQueue,
    update::{BackgroundTask, ManualSearchHistory, ShowUpdater},
};

/// Shared handles for request handlers and background tasks.
#[derive(Clone)]
pub struct AppContext {
    queue: Arc<InMemoryShowQueue>,
    progress: Arc<ProgressIndicators>,
    notifications: Arc<Notifications>,
    updater: Arc<ShowUpdater>,
    search_history: Arc<ManualSearchHistory>,
    id_mapping: BackgroundTask,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("queue_len", &self.queue.len())
            .field("updater_active", &self.updater.is_active())
            .field("id_mapping", &self.id_mapping)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    pub fn new(
        queue: Arc<InMemoryShowQueue>,
        progress: Arc<ProgressIndicators>,
        notifications: Arc<Notifications>,
        updater: Arc<ShowUpdater>,
        search_history: Arc<ManualSearchHistory>,
        id_mapping: BackgroundTask,
    ) -> Self {
        Self {
            queue,
            progress,
            notifications,
            updater,
            search_history,
            id_mapping,
        }
    }

    pub fn queue(&self) -> Arc<InMemoryShowQueue> {
        Arc::clone(&self.queue)
    }

    pub fn progress(&self) -> Arc<ProgressIndicators> {
        Arc::clone(&self.progress)
    }

    pub fn notifications(&self) -> Arc<Notifications> {
        Arc::clone(&self.notifications)
    }

    pub fn updater(&self) -> Arc<ShowUpdater> {
        Arc::clone(&self.updater)
    }

    /// Shared with the episode search subsystem, which records into it.
    pub fn search_history(&self) -> Arc<ManualSearchHistory> {
        Arc::clone(&self.search_history)
    }

    /// Detached id mapping refresh started by the daily run.
    pub fn id_mapping(&self) -> &BackgroundTask {
        &self.id_mapping
    }
}

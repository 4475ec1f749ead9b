use std::{
    collections::VecDeque,
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Result, ShowError};
use crate::ports::{ShowQueue, ShowTask, ShowTaskAction, ShowTaskExecutor, WorkHandle};
use crate::types::{QueueActionKind, RefreshOptions, ShowId, TrackedShow};

/// A task accepted by [`InMemoryShowQueue`].
pub struct QueueItem {
    id: Uuid,
    task: ShowTask,
    in_queue: AtomicBool,
}

impl fmt::Debug for QueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueItem")
            .field("id", &self.id)
            .field("show", &self.task.show.id)
            .field("action", &self.task.action.kind())
            .field("in_queue", &self.is_in_queue())
            .finish()
    }
}

impl QueueItem {
    fn new(task: ShowTask) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::now_v7(),
            task,
            in_queue: AtomicBool::new(true),
        })
    }

    pub fn task(&self) -> &ShowTask {
        &self.task
    }

    fn show_id(&self) -> ShowId {
        self.task.show.id
    }

    fn kind(&self) -> QueueActionKind {
        self.task.action.kind()
    }

    fn finish(&self) {
        self.in_queue.store(false, Ordering::Release);
    }
}

impl WorkHandle for QueueItem {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.task.show.name
    }

    fn is_in_queue(&self) -> bool {
        self.in_queue.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct QueueState {
    current: Option<Arc<QueueItem>>,
    pending: VecDeque<Arc<QueueItem>>,
}

impl QueueState {
    fn items(&self) -> impl Iterator<Item = &Arc<QueueItem>> {
        self.current.iter().chain(self.pending.iter())
    }

    fn has_task_for(&self, show: ShowId, kind: Option<QueueActionKind>) -> bool {
        self.items()
            .any(|item| item.show_id() == show && kind.is_none_or(|kind| item.kind() == kind))
    }
}

/// Single-worker FIFO show queue held in memory.
#[derive(Default)]
pub struct InMemoryShowQueue {
    state: Mutex<QueueState>,
    wake: Notify,
    daily_update: AtomicBool,
}

impl fmt::Debug for InMemoryShowQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryShowQueue")
            .field("current", &state.current.as_ref().map(|item| item.id))
            .field("pending", &state.pending.len())
            .field("daily_update", &self.is_daily_update_running())
            .finish()
    }
}

impl InMemoryShowQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queued plus running tasks.
    pub fn len(&self) -> usize {
        self.state.lock().items().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, task: ShowTask) -> Arc<QueueItem> {
        let item = QueueItem::new(task);
        self.state.lock().pending.push_back(item.clone());
        self.wake.notify_one();
        item
    }

    /// Pop the next task. When nothing is left the daily update flag is
    /// cleared under the same lock `mark_daily_update` takes, so a batch
    /// that drains before it is marked never leaves the flag set.
    fn take_next(&self) -> (Option<Arc<QueueItem>>, bool) {
        let mut state = self.state.lock();
        let next = state.pending.pop_front();
        state.current = next.clone();
        let drained =
            next.is_none() && self.daily_update.swap(false, Ordering::AcqRel);
        (next, drained)
    }

    fn finish_current(&self, item: &QueueItem) {
        item.finish();
        let mut state = self.state.lock();
        if state.current.as_ref().is_some_and(|current| current.id == item.id) {
            state.current = None;
        }
    }

    /// Execute queued tasks one at a time until `cancel` fires. The running
    /// task is allowed to finish; tasks still pending stay queued.
    pub async fn run_worker(
        self: Arc<Self>,
        executor: Arc<dyn ShowTaskExecutor>,
        cancel: CancellationToken,
    ) {
        info!("show queue worker started");
        let mut worked_since_idle = false;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let (next, drained) = self.take_next();
            if drained {
                info!("daily update batch drained");
            }
            let Some(item) = next else {
                if worked_since_idle {
                    worked_since_idle = false;
                    executor.on_idle().await;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.wake.notified() => {}
                }
                continue;
            };

            worked_since_idle = true;
            debug!(show = %item.show_id(), action = %item.kind(), "executing show task");
            match AssertUnwindSafe(executor.execute(&item.task)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(
                        show = %item.show_id(),
                        action = %item.kind(),
                        error = %err,
                        "show task failed"
                    );
                }
                Err(_) => {
                    error!(show = %item.show_id(), action = %item.kind(), "show task panicked");
                }
            }
            self.finish_current(&item);
        }

        info!("show queue worker stopped");
    }
}

#[async_trait]
impl ShowQueue for InMemoryShowQueue {
    async fn enqueue_update(
        &self,
        show: &TrackedShow,
        scheduled: bool,
    ) -> Result<Arc<dyn WorkHandle>> {
        if self
            .state
            .lock()
            .has_task_for(show.id, Some(QueueActionKind::Update))
        {
            return Err(ShowError::AlreadyQueued {
                show: show.id,
                action: QueueActionKind::Update,
            });
        }
        Ok(self.push(ShowTask {
            show: show.clone(),
            action: ShowTaskAction::Update { scheduled },
        }))
    }

    async fn enqueue_refresh(
        &self,
        show: &TrackedShow,
        options: RefreshOptions,
    ) -> Result<Arc<dyn WorkHandle>> {
        if self.state.lock().has_task_for(show.id, None) {
            return Err(ShowError::AlreadyQueued {
                show: show.id,
                action: QueueActionKind::Refresh,
            });
        }
        Ok(self.push(ShowTask {
            show: show.clone(),
            action: ShowTaskAction::Refresh(options),
        }))
    }

    fn active_items(&self) -> Vec<Arc<dyn WorkHandle>> {
        self.state
            .lock()
            .items()
            .map(|item| item.clone() as Arc<dyn WorkHandle>)
            .collect()
    }

    fn mark_daily_update(&self) {
        let state = self.state.lock();
        if state.items().next().is_none() {
            debug!("daily update batch already drained; flag left clear");
            return;
        }
        self.daily_update.store(true, Ordering::Release);
    }

    fn is_daily_update_running(&self) -> bool {
        self.daily_update.load(Ordering::Acquire)
    }
}

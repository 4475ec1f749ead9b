use std::{fmt, sync::Arc};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{QueueActionKind, RefreshOptions, TrackedShow};

/// Opaque handle for a task accepted by the show queue.
///
/// Only the queue mutates the state behind a handle; holders poll it.
pub trait WorkHandle: Send + Sync + fmt::Debug {
    /// Stable identity of the queued task.
    fn id(&self) -> Uuid;

    /// Display name for UI "next up" labels.
    fn name(&self) -> &str;

    /// `true` while the task is waiting or running.
    fn is_in_queue(&self) -> bool;
}

/// Shared work queue the scheduler dispatches into.
#[async_trait]
pub trait ShowQueue: Send + Sync {
    /// Queue a full metadata/episode update. Fails with
    /// [`ShowError::AlreadyQueued`](crate::error::ShowError::AlreadyQueued)
    /// when an update for the show is already queued or running.
    async fn enqueue_update(
        &self,
        show: &TrackedShow,
        scheduled: bool,
    ) -> Result<Arc<dyn WorkHandle>>;

    /// Queue a lightweight refresh. Fails when any task for the show is
    /// already queued or running.
    async fn enqueue_refresh(
        &self,
        show: &TrackedShow,
        options: RefreshOptions,
    ) -> Result<Arc<dyn WorkHandle>>;

    /// Currently executing item followed by queued items, in execution order.
    fn active_items(&self) -> Vec<Arc<dyn WorkHandle>>;

    /// Flag that a daily update batch is in flight. The queue clears it once
    /// it drains, and leaves it clear if the batch already drained before
    /// the call.
    fn mark_daily_update(&self);

    fn is_daily_update_running(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShowTaskAction {
    Update { scheduled: bool },
    Refresh(RefreshOptions),
}

impl ShowTaskAction {
    pub fn kind(&self) -> QueueActionKind {
        match self {
            ShowTaskAction::Update { .. } => QueueActionKind::Update,
            ShowTaskAction::Refresh(_) => QueueActionKind::Refresh,
        }
    }
}

/// A unit of work handed to a [`ShowTaskExecutor`].
#[derive(Clone, Debug)]
pub struct ShowTask {
    pub show: TrackedShow,
    pub action: ShowTaskAction,
}

/// Performs the actual update/refresh work for queued shows.
#[async_trait]
pub trait ShowTaskExecutor: Send + Sync {
    async fn execute(&self, task: &ShowTask) -> Result<()>;

    /// Called by the queue worker each time the queue runs empty.
    async fn on_idle(&self) {}
}

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{Result, ShowError};
use crate::notifications::Notifications;
use crate::notifiers::{LibraryTarget, NotifierRegistry};
use crate::ports::{ShowStore, ShowTask, ShowTaskAction, ShowTaskExecutor};

/// Executes queued tasks against the show store.
///
/// A full update stamps the show's `last_update` with today's date and tells
/// library notifiers; a refresh only re-reads the stored show. Outcomes are
/// posted to the notification center.
pub struct StoreTaskExecutor {
    store: Arc<dyn ShowStore>,
    clock: Arc<dyn Clock>,
    notifications: Arc<Notifications>,
    notifiers: Arc<NotifierRegistry>,
}

impl fmt::Debug for StoreTaskExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreTaskExecutor")
            .field("notifiers", &self.notifiers)
            .finish_non_exhaustive()
    }
}

impl StoreTaskExecutor {
    pub fn new(
        store: Arc<dyn ShowStore>,
        clock: Arc<dyn Clock>,
        notifications: Arc<Notifications>,
        notifiers: Arc<NotifierRegistry>,
    ) -> Self {
        Self {
            store,
            clock,
            notifications,
            notifiers,
        }
    }

    async fn apply(&self, task: &ShowTask) -> Result<()> {
        let mut show = self
            .store
            .get_show(task.show.id)
            .await?
            .ok_or(ShowError::NotFound(task.show.id))?;

        match task.action {
            ShowTaskAction::Update { scheduled } => {
                show.last_update = self.clock.now().date_naive();
                self.store.save_show(&show).await?;
                info!(show = %show.id, name = %show.name, scheduled, "show updated");
                self.notifiers
                    .notify_update_library(LibraryTarget::new(
                        show.name.clone(),
                        show.location.clone(),
                    ))
                    .await;
                if !scheduled {
                    self.notifications
                        .message("Show updated", format!("Updated {}", show.name));
                }
            }
            ShowTaskAction::Refresh(options) => {
                debug!(
                    show = %show.id,
                    with_episodes = options.with_episodes,
                    with_images = options.with_images,
                    "show refreshed"
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ShowTaskExecutor for StoreTaskExecutor {
    async fn execute(&self, task: &ShowTask) -> Result<()> {
        let result = self.apply(task).await;
        if let Err(err) = &result {
            self.notifications.error(
                format!("Unable to {} show", task.action.kind()),
                format!("{}: {err}", task.show.name),
            );
        }
        result
    }

    async fn on_idle(&self) {
        self.notifiers.flush().await;
    }
}

use std::{fmt, sync::Arc};

use tracing::{debug, warn};

use crate::error::ShowError;
use crate::ports::{ShowQueue, WorkHandle};
use crate::types::{RefreshOptions, UpdateAction};

use super::staleness::StaleCandidate;

/// Hands selected shows to the shared queue.
pub struct UpdateDispatcher {
    queue: Arc<dyn ShowQueue>,
}

impl fmt::Debug for UpdateDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateDispatcher").finish_non_exhaustive()
    }
}

impl UpdateDispatcher {
    pub fn new(queue: Arc<dyn ShowQueue>) -> Self {
        Self { queue }
    }

    /// Enqueue every candidate in order and return the accepted handles.
    ///
    /// A rejected enqueue is logged and skipped; the rest of the batch still
    /// goes through.
    pub async fn dispatch(&self, candidates: &[StaleCandidate<'_>]) -> Vec<Arc<dyn WorkHandle>> {
        let mut accepted = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let show = candidate.show;
            let result = match candidate.action {
                UpdateAction::FullUpdate => self.queue.enqueue_update(show, true).await,
                UpdateAction::Refresh => {
                    self.queue
                        .enqueue_refresh(show, RefreshOptions::FULL)
                        .await
                }
            };

            match result {
                Ok(handle) => {
                    debug!(show = %show.id, action = ?candidate.action, "queued");
                    accepted.push(handle);
                }
                Err(ShowError::AlreadyQueued { action, .. }) => {
                    warn!(
                        show = %show.id,
                        name = %show.name,
                        "{action} already queued or running; skipping"
                    );
                }
                Err(err) => {
                    warn!(
                        show = %show.id,
                        name = %show.name,
                        error = %err,
                        "automatic update failed to queue"
                    );
                }
            }
        }

        accepted
    }
}

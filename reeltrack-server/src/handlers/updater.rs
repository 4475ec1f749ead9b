use axum::{Json, extract::State, http::StatusCode};
use reeltrack_core::{
    ports::ShowQueue,
    update::{RunOutcome, ShowUpdater},
};
use serde::Serialize;
use tracing::{info, warn};

use crate::infra::{
    app_context::AppContext,
    errors::{AppError, AppResult},
};

#[derive(Debug, Serialize)]
pub struct UpdaterStatus {
    pub active: bool,
    pub daily_update_running: bool,
    pub queued: usize,
    pub id_mapping_running: bool,
}

#[derive(Debug, Serialize)]
pub struct RunAccepted {
    pub status: &'static str,
}

pub async fn updater_status(State(state): State<AppContext>) -> Json<UpdaterStatus> {
    let queue = state.queue();
    Json(UpdaterStatus {
        active: state.updater().is_active(),
        daily_update_running: queue.is_daily_update_running(),
        queued: queue.len(),
        id_mapping_running: state.id_mapping().is_running(),
    })
}

/// Start a daily update in the background.
pub async fn trigger_run(
    State(state): State<AppContext>,
) -> AppResult<(StatusCode, Json<RunAccepted>)> {
    let updater = state.updater();
    if updater.is_active() {
        return Err(AppError::conflict("A daily update is already running"));
    }

    tokio::spawn(run_manually(updater));
    Ok((StatusCode::ACCEPTED, Json(RunAccepted { status: "started" })))
}

async fn run_manually(updater: std::sync::Arc<ShowUpdater>) {
    match updater.run().await {
        RunOutcome::AlreadyActive => warn!("manual update lost the race to another run"),
        RunOutcome::Completed(report) => info!(
            dispatched = report.dispatched,
            full_updates = report.full_updates,
            "manual update finished"
        ),
    }
}

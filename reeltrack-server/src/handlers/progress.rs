use axum::{
    Json,
    extract::{Path, State},
};
use reeltrack_core::{ports::ShowQueue, progress::ProgressSnapshot};
use serde::Serialize;

use crate::infra::{
    app_context::AppContext,
    errors::{AppError, AppResult},
};

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub slots: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub slot: String,
    pub batches: Vec<ProgressSnapshot>,
}

pub async fn list_slots(State(state): State<AppContext>) -> Json<SlotsResponse> {
    Json(SlotsResponse {
        slots: state.progress().slot_names(),
    })
}

/// Unfinished batches in one progress slot.
pub async fn get_slot_progress(
    State(state): State<AppContext>,
    Path(slot): Path<String>,
) -> AppResult<Json<ProgressResponse>> {
    let progress = state.progress();
    if !progress.slot_names().contains(&slot) {
        return Err(AppError::not_found(format!("Unknown progress slot: {slot}")));
    }

    let active = state.queue().active_items();
    let batches = progress
        .get(&slot)
        .iter()
        .map(|indicator| indicator.snapshot(&active))
        .collect();

    Ok(Json(ProgressResponse { slot, batches }))
}

use axum::{Json, extract::State};
use reeltrack_core::update::ManualSearchRecord;
use serde::Serialize;

use crate::infra::app_context::AppContext;

#[derive(Debug, Serialize)]
pub struct SearchHistoryResponse {
    pub results: Vec<ManualSearchRecord>,
}

/// Recent manual search results, oldest first.
pub async fn search_history(State(state): State<AppContext>) -> Json<SearchHistoryResponse> {
    Json(SearchHistoryResponse {
        results: state.search_history().recent(),
    })
}

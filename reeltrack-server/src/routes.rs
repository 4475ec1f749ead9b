use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{notifications, progress, search, updater},
    infra::app_context::AppContext,
};

pub fn create_router(state: AppContext) -> Router {
    let api = Router::new()
        .route("/progress", get(progress::list_slots))
        .route("/progress/{slot}", get(progress::get_slot_progress))
        .route("/notifications", get(notifications::drain_notifications))
        .route("/search/history", get(search::search_history))
        .route("/updater", get(updater::updater_status))
        .route("/updater/run", post(updater::trigger_run));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

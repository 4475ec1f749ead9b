use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, Query, Request, State},
};
use reeltrack_core::notifications::DeliveredNotification;
use serde::{Deserialize, Serialize};

use crate::infra::app_context::AppContext;

const ANONYMOUS_VIEWER: &str = "anonymous";

#[derive(Debug, Default, Deserialize)]
pub struct ViewerQuery {
    pub viewer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub viewer: String,
    pub notifications: Vec<DeliveredNotification>,
}

/// Notifications the caller has not seen yet.
///
/// The viewer is the `viewer` query parameter when given, otherwise the
/// client IP address.
pub async fn drain_notifications(
    State(state): State<AppContext>,
    Query(query): Query<ViewerQuery>,
    request: Request,
) -> Json<NotificationsResponse> {
    let viewer = query
        .viewer
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| ANONYMOUS_VIEWER.to_string());

    let notifications = state.notifications().drain(&viewer);
    Json(NotificationsResponse {
        viewer,
        notifications,
    })
}

//! Notification handlers.
//!
//! Notifications belong to a user, not an organization, so these routes only
//! need a signed-in user.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use metricflow_core::{Notification, NotificationId, NOTIFICATION_LIST_LIMIT};

use crate::auth::UserSession;
use crate::error::ApiError;
use crate::handlers::team::SuccessResponse;
use crate::handlers::Body;
use crate::state::AppState;

/// Mark-read request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MarkReadRequest {
    /// Notifications to mark read.
    pub ids: Vec<String>,
}

/// The caller's newest notifications.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    /// Newest first.
    pub data: Vec<Notification>,
    /// Unread notifications in total, not only in `data`.
    pub unread_count: i64,
}

/// List the caller's notifications with the unread total.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    session: UserSession,
) -> Result<Json<NotificationList>, ApiError> {
    let data = state
        .store
        .list_notifications(&session.user_id, NOTIFICATION_LIST_LIMIT)
        .await?;
    let unread_count = state
        .store
        .count_unread_notifications(&session.user_id)
        .await?;

    Ok(Json(NotificationList { data, unread_count }))
}

/// Mark notifications read. Ids that are not the caller's are ignored.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    session: UserSession,
    Body(body): Body<MarkReadRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if body.ids.is_empty() {
        return Err(ApiError::BadRequest("No notification IDs provided".into()));
    }

    let ids = body
        .ids
        .iter()
        .map(|id| id.parse::<NotificationId>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ApiError::Validation {
            field: "ids".into(),
            message: "must be notification ids".into(),
        })?;

    let changed = state
        .store
        .mark_notifications_read(&session.user_id, &ids)
        .await?;

    tracing::debug!(user_id = %session.user_id, changed, "Notifications marked read");

    Ok(Json(SuccessResponse { success: true }))
}

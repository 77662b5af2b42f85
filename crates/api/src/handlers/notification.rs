//! Handlers for `/characters/{id}/notifications`.

use axum::extract::{Path, Query, State};
use critter_core::notification::Notification;
use critter_core::types::DbId;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::{DataResponse, Envelope};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationParams {
    #[serde(default)]
    pub unread_only: bool,
}

/// GET /api/v1/characters/{id}/notifications?unread_only=
pub async fn list(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<NotificationParams>,
) -> AppResult<Envelope<Vec<Notification>>> {
    let notifications = state.engine.notifications(id, params.unread_only).await?;
    Ok(DataResponse::json(notifications))
}

/// POST /api/v1/characters/{id}/notifications/{notification_id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path((id, notification_id)): Path<(DbId, DbId)>,
) -> AppResult<Envelope<Notification>> {
    let notification = state.engine.mark_notification_read(id, notification_id).await?;
    Ok(DataResponse::json(notification))
}

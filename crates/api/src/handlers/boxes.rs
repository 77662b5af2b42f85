//! Handlers for bonus boxes: `/characters/{id}/boxes[...]`.

use axum::extract::{Path, State};
use critter_core::container::BonusContainer;
use critter_core::engine::OpenedBox;
use critter_core::types::DbId;

use crate::error::AppResult;
use crate::response::{DataResponse, Envelope};
use crate::state::AppState;

/// GET /api/v1/characters/{id}/boxes
pub async fn list(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<Vec<BonusContainer>>> {
    let boxes = state.engine.containers(id).await?;
    Ok(DataResponse::json(boxes))
}

/// POST /api/v1/characters/{id}/boxes/{box_id}/open
pub async fn open(
    State(state): State<AppState>,
    Path((id, box_id)): Path<(DbId, DbId)>,
) -> AppResult<Envelope<OpenedBox>> {
    let opened = state.engine.open_box(id, box_id).await?;
    Ok(DataResponse::json(opened))
}

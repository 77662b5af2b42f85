use axum::extract::{Path, State};
use critter_core::engine::AchievementOverview;
use critter_core::types::DbId;

use crate::error::AppResult;
use crate::response::{DataResponse, Envelope};
use crate::state::AppState;

/// GET /api/v1/characters/{id}/achievements
pub async fn list(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<AchievementOverview>> {
    let overview = state.engine.achievements(id).await?;
    Ok(DataResponse::json(overview))
}

use axum::extract::{Query, State};
use critter_core::character::LeaderboardEntry;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::{DataResponse, Envelope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    /// Clamped to `1..=100`; defaults to 10.
    pub limit: Option<i64>,
}

/// GET /api/v1/leaderboards/level
pub async fn level(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> AppResult<Envelope<Vec<LeaderboardEntry>>> {
    let entries = state.engine.leaderboard(params.limit).await?;
    Ok(DataResponse::json(entries))
}

//! Handlers for quests: `/characters/{id}/quests[...]`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use critter_core::engine::{CompletedQuest, QuestBoard};
use critter_core::quest::{Quest, QuestDefinition};
use critter_core::types::DbId;

use crate::error::AppResult;
use crate::response::{DataResponse, Envelope};
use crate::state::AppState;

/// GET /api/v1/quests/definitions
pub async fn definitions(
    State(state): State<AppState>,
) -> AppResult<Envelope<Vec<QuestDefinition>>> {
    let definitions = state.engine.quest_definitions().await?;
    Ok(DataResponse::json(definitions))
}

/// GET /api/v1/characters/{id}/quests
pub async fn board(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<QuestBoard>> {
    let board = state.engine.quests(id).await?;
    Ok(DataResponse::json(board))
}

/// POST /api/v1/characters/{id}/quests/generate
pub async fn generate(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<(StatusCode, Envelope<Vec<Quest>>)> {
    let quests = state.engine.generate_quests(id).await?;
    Ok((StatusCode::CREATED, DataResponse::json(quests)))
}

/// POST /api/v1/characters/{id}/quests/{quest_id}/accept
pub async fn accept(
    State(state): State<AppState>,
    Path((id, quest_id)): Path<(DbId, DbId)>,
) -> AppResult<Envelope<Quest>> {
    let quest = state.engine.accept_quest(id, quest_id).await?;
    Ok(DataResponse::json(quest))
}

/// POST /api/v1/characters/{id}/quests/{quest_id}/reject
pub async fn reject(
    State(state): State<AppState>,
    Path((id, quest_id)): Path<(DbId, DbId)>,
) -> AppResult<Envelope<Quest>> {
    let quest = state.engine.reject_quest(id, quest_id).await?;
    Ok(DataResponse::json(quest))
}

/// POST /api/v1/characters/{id}/quests/{quest_id}/complete
pub async fn complete(
    State(state): State<AppState>,
    Path((id, quest_id)): Path<(DbId, DbId)>,
) -> AppResult<Envelope<CompletedQuest>> {
    let completed = state.engine.complete_quest(id, quest_id).await?;
    Ok(DataResponse::json(completed))
}

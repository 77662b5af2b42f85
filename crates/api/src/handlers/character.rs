//! Handlers for the `/characters` resource.
//!
//! Creation, login, the progression sub-resource
//! (`/characters/{id}/progression`, `/experience`, `/poll`) and the
//! character's traits (`/emotion`, `/stats`, `/evolution`, `/evolve`).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use critter_core::character::{Character, EmotionUpdate, NewCharacter};
use critter_core::engine::{Evolved, PollReport};
use critter_core::error::CoreError;
use critter_core::evolution::EvolutionStatus;
use critter_core::leveling::{ProgressionChange, ProgressionState};
use critter_core::stats::StatsUpdate;
use critter_core::store::CreatedCharacter;
use critter_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::response::{DataResponse, Envelope};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /characters/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

/// Character plus everything that happened while they were away.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub character: Character,
    pub poll: PollReport,
}

/// Request body for `POST /characters/{id}/experience`.
#[derive(Debug, Deserialize)]
pub struct GrantExperienceRequest {
    pub amount: i64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/characters
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<NewCharacter>,
) -> AppResult<(StatusCode, Envelope<CreatedCharacter>)> {
    let input = input.checked()?;
    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    let created = state.engine.create_character(input, password_hash).await?;
    Ok((StatusCode::CREATED, DataResponse::json(created)))
}

/// POST /api/v1/characters/login
///
/// Unknown names and wrong passwords produce the same `401`, so the response
/// does not reveal which names exist. Login only checks the credentials; no
/// session is issued.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Envelope<LoginResponse>> {
    if input.name.trim().is_empty() || input.password.is_empty() {
        return Err(AppError::BadRequest("Name and password are required".into()));
    }
    let invalid = || AppError::Core(CoreError::Unauthorized("Invalid name or password".into()));

    let character = state
        .engine
        .find_character_by_name(input.name.trim())
        .await?
        .ok_or_else(invalid)?;
    let verified = verify_password(&input.password, &character.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !verified {
        tracing::info!(character_id = character.id, "Rejected login");
        return Err(invalid());
    }

    let poll = state.engine.record_login(character.id).await?;
    let character = state.engine.character(character.id).await?;
    tracing::info!(character_id = character.id, "Character logged in");
    Ok(DataResponse::json(LoginResponse { character, poll }))
}

/// GET /api/v1/characters/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<Character>> {
    let character = state.engine.character(id).await?;
    Ok(DataResponse::json(character))
}

/// GET /api/v1/characters/{id}/progression
pub async fn progression(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<ProgressionState>> {
    let progression = state.engine.progression(id).await?;
    Ok(DataResponse::json(progression))
}

/// POST /api/v1/characters/{id}/experience
pub async fn grant_experience(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<GrantExperienceRequest>,
) -> AppResult<Envelope<ProgressionChange>> {
    let change = state.engine.grant_experience(id, input.amount).await?;
    Ok(DataResponse::json(change))
}

/// POST /api/v1/characters/{id}/poll
pub async fn poll(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<PollReport>> {
    let report = state.engine.poll(id).await?;
    Ok(DataResponse::json(report))
}

/// PUT /api/v1/characters/{id}/emotion
pub async fn update_emotion(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<EmotionUpdate>,
) -> AppResult<Envelope<Character>> {
    let character = state.engine.update_emotion(id, input).await?;
    Ok(DataResponse::json(character))
}

/// PUT /api/v1/characters/{id}/stats
///
/// Partial update; unknown stat names are rejected with `400`.
pub async fn update_stats(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<Envelope<Character>> {
    if !body.is_object() {
        return Err(AppError::BadRequest("Stats must be a JSON object".into()));
    }
    let update: StatsUpdate = serde_json::from_value(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid stats: {e}")))?;
    let character = state.engine.update_stats(id, update).await?;
    Ok(DataResponse::json(character))
}

/// GET /api/v1/characters/{id}/evolution
pub async fn evolution(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<EvolutionStatus>> {
    let status = state.engine.evolution(id).await?;
    Ok(DataResponse::json(status))
}

/// POST /api/v1/characters/{id}/evolve
pub async fn evolve(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<Evolved>> {
    let evolved = state.engine.evolve(id).await?;
    Ok(DataResponse::json(evolved))
}

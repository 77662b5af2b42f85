//! Handlers for the food sub-resource: `/characters/{id}/food[...]`.

use axum::extract::{Path, State};
use critter_core::engine::{AccrualReport, ConsumptionResult, ConversionOutcome, Inventory};
use critter_core::types::DbId;

use crate::error::AppResult;
use crate::response::{DataResponse, Envelope};
use crate::state::AppState;

/// GET /api/v1/characters/{id}/food
pub async fn inventory(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<Inventory>> {
    let inventory = state.engine.inventory(id).await?;
    Ok(DataResponse::json(inventory))
}

/// POST /api/v1/characters/{id}/food/accrue
///
/// Lenient: nothing due is a successful no-op.
pub async fn accrue(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<AccrualReport>> {
    let report = state.engine.accrue(id).await?;
    Ok(DataResponse::json(report))
}

/// POST /api/v1/characters/{id}/food/generate
///
/// Strict: `TOO_EARLY` before the next unit is due, `LIMIT_REACHED` when full.
pub async fn generate(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<AccrualReport>> {
    let report = state.engine.generate_food(id).await?;
    Ok(DataResponse::json(report))
}

/// POST /api/v1/characters/{id}/food/convert
pub async fn convert(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<ConversionOutcome>> {
    let outcome = state.engine.convert(id).await?;
    Ok(DataResponse::json(outcome))
}

/// POST /api/v1/characters/{id}/food/{unit_id}/consume
pub async fn consume(
    State(state): State<AppState>,
    Path((id, unit_id)): Path<(DbId, DbId)>,
) -> AppResult<Envelope<ConsumptionResult>> {
    let result = state.engine.consume(id, unit_id).await?;
    Ok(DataResponse::json(result))
}

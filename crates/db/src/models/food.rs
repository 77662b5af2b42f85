use critter_core::error::CoreError;
use critter_core::resource::{ResourceUnit, Tier};
use critter_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `food_units` table.
#[derive(Debug, Clone, FromRow)]
pub struct FoodUnitRow {
    pub id: DbId,
    pub character_id: DbId,
    pub tier: String,
    pub created_at: Timestamp,
    pub consumed: bool,
    pub consumed_at: Option<Timestamp>,
}

impl TryFrom<FoodUnitRow> for ResourceUnit {
    type Error = CoreError;

    fn try_from(row: FoodUnitRow) -> Result<Self, Self::Error> {
        Ok(ResourceUnit {
            id: row.id,
            character_id: row.character_id,
            tier: Tier::from_name(&row.tier)
                .map_err(|_| CoreError::Internal(format!("Unknown food tier '{}'", row.tier)))?,
            created_at: row.created_at,
            consumed: row.consumed,
            consumed_at: row.consumed_at,
        })
    }
}

/// Convert a batch of rows, failing on the first malformed one.
pub fn into_units(rows: Vec<FoodUnitRow>) -> Result<Vec<ResourceUnit>, CoreError> {
    rows.into_iter().map(ResourceUnit::try_from).collect()
}

use critter_core::container::{BonusContainer, BoxReward};
use critter_core::error::CoreError;
use critter_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use super::from_json;

/// A row from the `bonus_boxes` table.
#[derive(Debug, Clone, FromRow)]
pub struct BonusBoxRow {
    pub id: DbId,
    pub character_id: DbId,
    pub created_at: Timestamp,
    pub opened: bool,
    pub opened_at: Option<Timestamp>,
    pub reward: Option<serde_json::Value>,
}

impl TryFrom<BonusBoxRow> for BonusContainer {
    type Error = CoreError;

    fn try_from(row: BonusBoxRow) -> Result<Self, Self::Error> {
        let reward = row
            .reward
            .map(|value| from_json::<BoxReward>("reward", value))
            .transpose()?;
        Ok(BonusContainer {
            id: row.id,
            character_id: row.character_id,
            created_at: row.created_at,
            opened: row.opened,
            opened_at: row.opened_at,
            reward,
        })
    }
}

use critter_core::achievement::{Achievement, AchievementReward};
use critter_core::error::CoreError;
use critter_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use super::from_json;

/// A row from the `achievements` table.
#[derive(Debug, Clone, FromRow)]
pub struct AchievementRow {
    pub id: DbId,
    pub character_id: DbId,
    pub key: String,
    pub achieved_at: Timestamp,
    pub reward: serde_json::Value,
}

impl TryFrom<AchievementRow> for Achievement {
    type Error = CoreError;

    fn try_from(row: AchievementRow) -> Result<Self, Self::Error> {
        Ok(Achievement {
            id: row.id,
            character_id: row.character_id,
            key: row.key,
            achieved_at: row.achieved_at,
            reward: from_json::<AchievementReward>("reward", row.reward)?,
        })
    }
}

//! Repository for the `achievements` table.

use critter_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::achievement::AchievementRow;

const COLUMNS: &str = "id, character_id, key, achieved_at, reward";

pub struct AchievementRepo;

impl AchievementRepo {
    pub async fn list_for_character<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
    ) -> Result<Vec<AchievementRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM achievements WHERE character_id = $1 ORDER BY achieved_at, id"
        );
        sqlx::query_as::<_, AchievementRow>(&query)
            .bind(character_id)
            .fetch_all(executor)
            .await
    }

    /// Insert unless the key is already unlocked for this character.
    ///
    /// Returns `None` when the row already existed.
    pub async fn create_if_absent<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        key: &str,
        reward: &serde_json::Value,
        achieved_at: Timestamp,
    ) -> Result<Option<AchievementRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO achievements (character_id, key, reward, achieved_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT ON CONSTRAINT uq_achievements_character_key DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AchievementRow>(&query)
            .bind(character_id)
            .bind(key)
            .bind(reward)
            .bind(achieved_at)
            .fetch_optional(executor)
            .await
    }
}

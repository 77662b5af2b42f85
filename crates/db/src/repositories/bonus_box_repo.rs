//! Repository for the `bonus_boxes` table.

use critter_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::bonus_box::BonusBoxRow;

const COLUMNS: &str = "id, character_id, created_at, opened, opened_at, reward";

pub struct BonusBoxRepo;

impl BonusBoxRepo {
    /// Insert `count` unopened boxes.
    pub async fn create_batch<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        count: i32,
        created_at: Timestamp,
    ) -> Result<Vec<BonusBoxRow>, sqlx::Error> {
        if count <= 0 {
            return Ok(Vec::new());
        }
        let query = format!(
            "INSERT INTO bonus_boxes (character_id, created_at) \
             SELECT $1, $2 FROM generate_series(1, $3) \
             RETURNING {COLUMNS}"
        );
        let mut rows = sqlx::query_as::<_, BonusBoxRow>(&query)
            .bind(character_id)
            .bind(created_at)
            .bind(count)
            .fetch_all(executor)
            .await?;
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    pub async fn list_for_character<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
    ) -> Result<Vec<BonusBoxRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM bonus_boxes WHERE character_id = $1 ORDER BY id");
        sqlx::query_as::<_, BonusBoxRow>(&query)
            .bind(character_id)
            .fetch_all(executor)
            .await
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        box_id: DbId,
    ) -> Result<Option<BonusBoxRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM bonus_boxes WHERE id = $1 AND character_id = $2");
        sqlx::query_as::<_, BonusBoxRow>(&query)
            .bind(box_id)
            .bind(character_id)
            .fetch_optional(executor)
            .await
    }

    /// Open a box and store its reward. `None` when missing or already opened.
    pub async fn open<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        box_id: DbId,
        opened_at: Timestamp,
        reward: &serde_json::Value,
    ) -> Result<Option<BonusBoxRow>, sqlx::Error> {
        let query = format!(
            "UPDATE bonus_boxes SET opened = true, opened_at = $3, reward = $4 \
             WHERE id = $1 AND character_id = $2 AND opened = false \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BonusBoxRow>(&query)
            .bind(box_id)
            .bind(character_id)
            .bind(opened_at)
            .bind(reward)
            .fetch_optional(executor)
            .await
    }
}

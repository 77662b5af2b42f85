//! Repository for the `characters` table.

use critter_core::character::NewCharacterRecord;
use critter_core::leveling::ProgressionState;
use critter_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::character::{CharacterRow, LeaderboardRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, password_hash, species, job, emotion, experience, level, \
                       coins, food_eaten, stats, evolution_stage, created_at, last_played_at";

/// Provides CRUD operations for characters.
pub struct CharacterRepo;

impl CharacterRepo {
    /// Insert a new character with fresh progression, returning the row.
    ///
    /// A taken name fails on `uq_characters_name`.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &NewCharacterRecord,
    ) -> Result<CharacterRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO characters \
                (name, password_hash, species, job, emotion, coins, created_at, last_played_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CharacterRow>(&query)
            .bind(&input.name)
            .bind(&input.password_hash)
            .bind(&input.species)
            .bind(&input.job)
            .bind(&input.emotion)
            .bind(input.coins)
            .bind(input.created_at)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<CharacterRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM characters WHERE id = $1");
        sqlx::query_as::<_, CharacterRow>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Same as [`find_by_id`](Self::find_by_id) but locks the row until the
    /// surrounding transaction ends.
    pub async fn find_for_update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<Option<CharacterRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM characters WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, CharacterRow>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_name<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> Result<Option<CharacterRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM characters WHERE name = $1");
        sqlx::query_as::<_, CharacterRow>(&query)
            .bind(name)
            .fetch_optional(executor)
            .await
    }

    /// Returns `true` if the character exists.
    pub async fn touch_last_played<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE characters SET last_played_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_active_ids<'e, E: PgExecutor<'e>>(
        executor: E,
        since: Timestamp,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM characters WHERE last_played_at >= $1 ORDER BY id",
        )
        .bind(since)
        .fetch_all(executor)
        .await
    }

    /// Write a progression state computed from a locked row, adding
    /// `food_eaten` feeding actions.
    pub async fn update_progression<'e, E: PgExecutor<'e>>(
        executor: E,
        state: &ProgressionState,
        food_eaten: i64,
    ) -> Result<CharacterRow, sqlx::Error> {
        let query = format!(
            "UPDATE characters SET \
                experience = $2, level = $3, coins = $4, food_eaten = food_eaten + $5 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CharacterRow>(&query)
            .bind(state.character_id)
            .bind(state.experience)
            .bind(state.level)
            .bind(state.coins)
            .bind(food_eaten)
            .fetch_one(executor)
            .await
    }

    pub async fn update_emotion<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        emotion: &str,
    ) -> Result<Option<CharacterRow>, sqlx::Error> {
        let query =
            format!("UPDATE characters SET emotion = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, CharacterRow>(&query)
            .bind(id)
            .bind(emotion)
            .fetch_optional(executor)
            .await
    }

    /// Replace the stats document of a row locked by the caller.
    pub async fn update_stats<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        stats: &serde_json::Value,
    ) -> Result<CharacterRow, sqlx::Error> {
        let query = format!("UPDATE characters SET stats = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, CharacterRow>(&query)
            .bind(id)
            .bind(stats)
            .fetch_one(executor)
            .await
    }

    /// Move to the next evolution stage. `None` when the row is missing or its
    /// stage is no longer `from_stage`.
    pub async fn advance_stage<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        from_stage: i32,
    ) -> Result<Option<CharacterRow>, sqlx::Error> {
        let query = format!(
            "UPDATE characters SET evolution_stage = evolution_stage + 1 \
             WHERE id = $1 AND evolution_stage = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CharacterRow>(&query)
            .bind(id)
            .bind(from_stage)
            .fetch_optional(executor)
            .await
    }

    /// Top characters by experience, earliest created first on ties.
    pub async fn leaderboard<'e, E: PgExecutor<'e>>(
        executor: E,
        limit: i64,
    ) -> Result<Vec<LeaderboardRow>, sqlx::Error> {
        sqlx::query_as::<_, LeaderboardRow>(
            "SELECT ROW_NUMBER() OVER (ORDER BY experience DESC, created_at ASC, id ASC) AS rank, \
                    id, name, species, level, experience \
             FROM characters \
             ORDER BY experience DESC, created_at ASC, id ASC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(executor)
        .await
    }
}

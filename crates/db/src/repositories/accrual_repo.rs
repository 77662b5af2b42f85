//! Repository for the `accrual_states` table.

use critter_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

/// Reads and advances the per-character accrual anchor.
pub struct AccrualRepo;

impl AccrualRepo {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        last_generated_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO accrual_states (character_id, last_generated_at) VALUES ($1, $2)",
        )
        .bind(character_id)
        .bind(last_generated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn find_anchor<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
    ) -> Result<Option<Timestamp>, sqlx::Error> {
        sqlx::query_scalar("SELECT last_generated_at FROM accrual_states WHERE character_id = $1")
            .bind(character_id)
            .fetch_optional(executor)
            .await
    }

    /// Move the anchor from `expected` to `next`.
    ///
    /// Returns `false` when the stored anchor no longer equals `expected`.
    pub async fn advance<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        expected: Timestamp,
        next: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accrual_states SET last_generated_at = $3, updated_at = NOW() \
             WHERE character_id = $1 AND last_generated_at = $2",
        )
        .bind(character_id)
        .bind(expected)
        .bind(next)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

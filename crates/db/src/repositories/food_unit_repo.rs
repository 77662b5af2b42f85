//! Repository for the `food_units` table.

use critter_core::resource::{Tier, TierCounts};
use critter_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::food::FoodUnitRow;

const COLUMNS: &str = "id, character_id, tier, created_at, consumed, consumed_at";

/// Provides operations for food units.
pub struct FoodUnitRepo;

impl FoodUnitRepo {
    /// Insert one unit of `tier` per timestamp, returning them oldest first.
    pub async fn create_batch<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        tier: Tier,
        created_at: &[Timestamp],
    ) -> Result<Vec<FoodUnitRow>, sqlx::Error> {
        if created_at.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "INSERT INTO food_units (character_id, tier, created_at) \
             SELECT $1, $2, t FROM UNNEST($3::timestamptz[]) WITH ORDINALITY AS u(t, n) \
             ORDER BY n \
             RETURNING {COLUMNS}"
        );
        let mut rows = sqlx::query_as::<_, FoodUnitRow>(&query)
            .bind(character_id)
            .bind(tier.name())
            .bind(created_at)
            .fetch_all(executor)
            .await?;
        rows.sort_by_key(|r| (r.created_at, r.id));
        Ok(rows)
    }

    /// Unconsumed units per tier.
    pub async fn count_unconsumed<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
    ) -> Result<TierCounts, sqlx::Error> {
        let (low, high): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE tier = 'low'), \
                    COUNT(*) FILTER (WHERE tier = 'high') \
             FROM food_units WHERE character_id = $1 AND consumed = false",
        )
        .bind(character_id)
        .fetch_one(executor)
        .await?;
        Ok(TierCounts { low, high })
    }

    /// Units owned by a character, oldest first.
    pub async fn list_for_character<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        include_consumed: bool,
    ) -> Result<Vec<FoodUnitRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM food_units \
             WHERE character_id = $1 AND ($2 OR consumed = false) \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, FoodUnitRow>(&query)
            .bind(character_id)
            .bind(include_consumed)
            .fetch_all(executor)
            .await
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        unit_id: DbId,
    ) -> Result<Option<FoodUnitRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM food_units WHERE id = $1 AND character_id = $2");
        sqlx::query_as::<_, FoodUnitRow>(&query)
            .bind(unit_id)
            .bind(character_id)
            .fetch_optional(executor)
            .await
    }

    /// Flip `consumed` on a single unit. `None` when the unit is missing or
    /// was already consumed.
    pub async fn mark_consumed<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        unit_id: DbId,
        at: Timestamp,
    ) -> Result<Option<FoodUnitRow>, sqlx::Error> {
        let query = format!(
            "UPDATE food_units SET consumed = true, consumed_at = $3 \
             WHERE id = $1 AND character_id = $2 AND consumed = false \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FoodUnitRow>(&query)
            .bind(unit_id)
            .bind(character_id)
            .bind(at)
            .fetch_optional(executor)
            .await
    }

    /// Retire unconsumed low-tier units, returning how many were retired.
    pub async fn retire_low<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        unit_ids: &[DbId],
        at: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE food_units SET consumed = true, consumed_at = $3 \
             WHERE character_id = $1 AND id = ANY($2) AND tier = 'low' AND consumed = false",
        )
        .bind(character_id)
        .bind(unit_ids)
        .bind(at)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

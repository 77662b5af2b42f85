//! Repository for the `quests` table.
//!
//! Status updates carry the expected source status in their `WHERE` clause,
//! so a transition that lost a race affects no rows.

use critter_core::quest::{NewQuest, QuestStatus};
use critter_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::quest::QuestRow;

const COLUMNS: &str = "id, character_id, title, description, status, duration_hours, \
                       reward_food_count, accepted_at, expires_at, completed_at, created_at";

pub struct QuestRepo;

impl QuestRepo {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        input: &NewQuest,
        created_at: Timestamp,
    ) -> Result<QuestRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO quests \
                (character_id, title, description, status, duration_hours, \
                 reward_food_count, created_at) \
             VALUES ($1, $2, $3, 'received', $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QuestRow>(&query)
            .bind(character_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.duration_hours)
            .bind(input.reward_food_count)
            .bind(created_at)
            .fetch_one(executor)
            .await
    }

    pub async fn list_for_character<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
    ) -> Result<Vec<QuestRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM quests WHERE character_id = $1 ORDER BY id");
        sqlx::query_as::<_, QuestRow>(&query)
            .bind(character_id)
            .fetch_all(executor)
            .await
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        quest_id: DbId,
    ) -> Result<Option<QuestRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM quests WHERE id = $1 AND character_id = $2");
        sqlx::query_as::<_, QuestRow>(&query)
            .bind(quest_id)
            .bind(character_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_for_update<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        quest_id: DbId,
    ) -> Result<Option<QuestRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM quests WHERE id = $1 AND character_id = $2 FOR UPDATE"
        );
        sqlx::query_as::<_, QuestRow>(&query)
            .bind(quest_id)
            .bind(character_id)
            .fetch_optional(executor)
            .await
    }

    /// `(accepted now, completed since day_start)`.
    pub async fn progress_counts<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        day_start: Timestamp,
    ) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE status = 'accepted'), \
                    COUNT(*) FILTER (WHERE status = 'completed' AND completed_at >= $2) \
             FROM quests WHERE character_id = $1",
        )
        .bind(character_id)
        .bind(day_start)
        .fetch_one(executor)
        .await
    }

    pub async fn count_completed<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM quests WHERE character_id = $1 AND status = 'completed'",
        )
        .bind(character_id)
        .fetch_one(executor)
        .await
    }

    /// `received -> accepted`, stamping the acceptance and expiry times.
    pub async fn accept<'e, E: PgExecutor<'e>>(
        executor: E,
        quest_id: DbId,
        accepted_at: Timestamp,
        expires_at: Timestamp,
    ) -> Result<Option<QuestRow>, sqlx::Error> {
        let query = format!(
            "UPDATE quests SET status = $2, accepted_at = $3, expires_at = $4 \
             WHERE id = $1 AND status = $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QuestRow>(&query)
            .bind(quest_id)
            .bind(QuestStatus::Accepted.name())
            .bind(accepted_at)
            .bind(expires_at)
            .bind(QuestStatus::Received.name())
            .fetch_optional(executor)
            .await
    }

    /// `received -> available`.
    pub async fn reject<'e, E: PgExecutor<'e>>(
        executor: E,
        quest_id: DbId,
    ) -> Result<Option<QuestRow>, sqlx::Error> {
        let query = format!(
            "UPDATE quests SET status = $2 WHERE id = $1 AND status = $3 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QuestRow>(&query)
            .bind(quest_id)
            .bind(QuestStatus::Available.name())
            .bind(QuestStatus::Received.name())
            .fetch_optional(executor)
            .await
    }

    /// `accepted -> completed`.
    pub async fn complete<'e, E: PgExecutor<'e>>(
        executor: E,
        quest_id: DbId,
        completed_at: Timestamp,
    ) -> Result<Option<QuestRow>, sqlx::Error> {
        let query = format!(
            "UPDATE quests SET status = $2, completed_at = $3 \
             WHERE id = $1 AND status = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QuestRow>(&query)
            .bind(quest_id)
            .bind(QuestStatus::Completed.name())
            .bind(completed_at)
            .bind(QuestStatus::Accepted.name())
            .fetch_optional(executor)
            .await
    }
}

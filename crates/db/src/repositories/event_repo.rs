//! Repository for the `events` table.

use critter_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::event::{CreateEvent, EventRow};

const COLUMNS: &str = "id, event_type, character_id, payload, title, message, is_read, created_at";

/// Game event log, read back as notifications.
pub struct EventRepo;

impl EventRepo {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &CreateEvent<'_>,
    ) -> Result<EventRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO events (event_type, character_id, payload, title, message, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EventRow>(&query)
            .bind(input.event_type)
            .bind(input.character_id)
            .bind(input.payload)
            .bind(input.title)
            .bind(input.message)
            .bind(input.created_at)
            .fetch_one(executor)
            .await
    }

    /// Events for a character, newest first.
    pub async fn list_for_character<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        unread_only: bool,
    ) -> Result<Vec<EventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE character_id = $1 AND (NOT $2 OR is_read = FALSE) \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, EventRow>(&query)
            .bind(character_id)
            .bind(unread_only)
            .fetch_all(executor)
            .await
    }

    /// `None` when the event is missing or belongs to another character.
    pub async fn mark_read<'e, E: PgExecutor<'e>>(
        executor: E,
        character_id: DbId,
        id: DbId,
    ) -> Result<Option<EventRow>, sqlx::Error> {
        let query = format!(
            "UPDATE events SET is_read = TRUE \
             WHERE id = $1 AND character_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EventRow>(&query)
            .bind(id)
            .bind(character_id)
            .fetch_optional(executor)
            .await
    }
}

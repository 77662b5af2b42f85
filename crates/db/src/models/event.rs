//! Event log models. Each stored event is also a player notification.

use critter_core::notification::{NewNotification, Notification};
use critter_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `events` table, selected per character.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: DbId,
    pub event_type: String,
    pub character_id: DbId,
    pub payload: serde_json::Value,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: Timestamp,
}

impl From<EventRow> for Notification {
    fn from(row: EventRow) -> Self {
        Notification {
            id: row.id,
            character_id: row.character_id,
            kind: row.event_type,
            title: row.title,
            message: row.message,
            metadata: row.payload,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

/// Insert payload for the `events` table.
#[derive(Debug, Clone)]
pub struct CreateEvent<'a> {
    pub event_type: &'a str,
    pub character_id: DbId,
    pub payload: &'a serde_json::Value,
    pub title: &'a str,
    pub message: &'a str,
    pub created_at: Timestamp,
}

impl<'a> From<&'a NewNotification> for CreateEvent<'a> {
    fn from(n: &'a NewNotification) -> Self {
        CreateEvent {
            event_type: &n.kind,
            character_id: n.character_id,
            payload: &n.metadata,
            title: &n.title,
            message: &n.message,
            created_at: n.created_at,
        }
    }
}

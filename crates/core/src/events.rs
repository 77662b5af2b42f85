//! Game events and the notification seam.
//!
//! The engine reports every committed state change as a [`GameEvent`] on a
//! [`NotificationSink`]. Delivery is fire-and-forget: a sink never fails the
//! operation that produced the event.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

pub const CHARACTER_CREATED: &str = "character.created";
pub const FOOD_ACCRUED: &str = "food.accrued";
pub const FOOD_CONVERTED: &str = "food.converted";
pub const FOOD_CONSUMED: &str = "food.consumed";
pub const BOX_GRANTED: &str = "box.granted";
pub const BOX_OPENED: &str = "box.opened";
pub const EXPERIENCE_GRANTED: &str = "experience.granted";
pub const LEVEL_UP: &str = "character.level_up";
pub const QUESTS_GENERATED: &str = "quest.generated";
pub const QUEST_ACCEPTED: &str = "quest.accepted";
pub const QUEST_REJECTED: &str = "quest.rejected";
pub const QUEST_COMPLETED: &str = "quest.completed";
pub const ACHIEVEMENT_UNLOCKED: &str = "achievement.unlocked";
pub const EMOTION_CHANGED: &str = "character.emotion_changed";
pub const STATS_UPDATED: &str = "character.stats_updated";
pub const CHARACTER_EVOLVED: &str = "character.evolved";

// ---------------------------------------------------------------------------
// GameEvent
// ---------------------------------------------------------------------------

/// Something that happened to a character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub character_id: DbId,
    /// Dot-separated event name, e.g. `"food.consumed"`.
    pub action_type: String,
    pub metadata: serde_json::Value,
    pub timestamp: Timestamp,
}

impl GameEvent {
    pub fn new(character_id: DbId, action_type: impl Into<String>) -> Self {
        Self {
            character_id,
            action_type: action_type.into(),
            metadata: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receiver of game events.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: GameEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _event: GameEvent) {}
}

/// Keeps every event in memory, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<GameEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<GameEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn action_types(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.action_type).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: GameEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

//! Player-facing notifications derived from game events.

use serde::Serialize;

use crate::events::{self as ev, GameEvent};
use crate::types::{DbId, Timestamp};

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub character_id: DbId,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub created_at: Timestamp,
}

/// Notification to store, unread.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub character_id: DbId,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

impl NewNotification {
    /// Render `event` with a title and message for the player.
    pub fn from_event(event: &GameEvent) -> Self {
        let (title, message) = describe(event);
        Self {
            character_id: event.character_id,
            kind: event.action_type.clone(),
            title: title.to_string(),
            message,
            metadata: event.metadata.clone(),
            created_at: event.timestamp,
        }
    }
}

fn field(event: &GameEvent, key: &str) -> String {
    match &event.metadata[key] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "?".to_string(),
        other => other.to_string(),
    }
}

fn describe(event: &GameEvent) -> (&'static str, String) {
    let f = |key: &str| field(event, key);
    match event.action_type.as_str() {
        ev::CHARACTER_CREATED => ("Welcome!", format!("{} has hatched.", f("name"))),
        ev::FOOD_ACCRUED => ("Food arrived", format!("{} new food appeared.", f("units"))),
        ev::FOOD_CONVERTED => (
            "Food upgraded",
            format!("{} premium food crafted.", f("promoted")),
        ),
        ev::FOOD_CONSUMED => ("Yum!", format!("Gained {} EXP.", f("exp_gained"))),
        ev::BOX_GRANTED => ("Bonus box", "A bonus box was found!".to_string()),
        ev::BOX_OPENED => ("Box opened", "A bonus box was opened.".to_string()),
        ev::EXPERIENCE_GRANTED => ("Experience", format!("Gained {} EXP.", f("amount"))),
        ev::LEVEL_UP => ("Level up!", format!("Reached level {}.", f("new_level"))),
        ev::QUESTS_GENERATED => ("New quests", format!("{} quests arrived.", f("count"))),
        ev::QUEST_ACCEPTED => ("Quest accepted", "The quest is under way.".to_string()),
        ev::QUEST_REJECTED => ("Quest declined", "The quest was set aside.".to_string()),
        ev::QUEST_COMPLETED => (
            "Quest completed",
            format!("Earned {} food.", f("reward_food_count")),
        ),
        ev::ACHIEVEMENT_UNLOCKED => ("Achievement unlocked", f("title")),
        ev::EMOTION_CHANGED => ("Mood changed", format!("Now feeling {}.", f("emotion"))),
        ev::STATS_UPDATED => ("Stats updated", "Attributes were adjusted.".to_string()),
        ev::CHARACTER_EVOLVED => ("Evolution!", format!("Evolved into {}.", f("name"))),
        _ => ("Update", event.action_type.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_up_reads_its_metadata() {
        let event = GameEvent::new(3, ev::LEVEL_UP)
            .with_metadata(serde_json::json!({ "old_level": 1, "new_level": 2 }));
        let draft = NewNotification::from_event(&event);
        assert_eq!(draft.character_id, 3);
        assert_eq!(draft.kind, "character.level_up");
        assert_eq!(draft.title, "Level up!");
        assert_eq!(draft.message, "Reached level 2.");
        assert_eq!(draft.created_at, event.timestamp);
    }

    #[test]
    fn string_fields_are_not_quoted() {
        let event = GameEvent::new(1, ev::ACHIEVEMENT_UNLOCKED)
            .with_metadata(serde_json::json!({ "title": "First Steps" }));
        assert_eq!(NewNotification::from_event(&event).message, "First Steps");
    }

    #[test]
    fn unknown_events_fall_back_to_their_type() {
        let draft = NewNotification::from_event(&GameEvent::new(1, "garden.watered"));
        assert_eq!(draft.title, "Update");
        assert_eq!(draft.message, "garden.watered");
    }

    #[test]
    fn serialized_kind_is_named_type() {
        let note = Notification {
            id: 1,
            character_id: 2,
            kind: ev::BOX_GRANTED.into(),
            title: "Bonus box".into(),
            message: String::new(),
            metadata: serde_json::json!({}),
            is_read: false,
            created_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["type"], "box.granted");
        assert_eq!(json["is_read"], false);
    }
}

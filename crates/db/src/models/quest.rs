use critter_core::error::CoreError;
use critter_core::quest::{Quest, QuestDefinition, QuestStatus};
use critter_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `quests` table.
#[derive(Debug, Clone, FromRow)]
pub struct QuestRow {
    pub id: DbId,
    pub character_id: DbId,
    pub title: String,
    pub description: String,
    pub status: String,
    pub duration_hours: i32,
    pub reward_food_count: i32,
    pub accepted_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl TryFrom<QuestRow> for Quest {
    type Error = CoreError;

    fn try_from(row: QuestRow) -> Result<Self, Self::Error> {
        Ok(Quest {
            id: row.id,
            character_id: row.character_id,
            title: row.title,
            description: row.description,
            status: QuestStatus::from_name(&row.status).map_err(|_| {
                CoreError::Internal(format!("Unknown quest status '{}'", row.status))
            })?,
            duration_hours: row.duration_hours,
            reward_food_count: row.reward_food_count,
            accepted_at: row.accepted_at,
            expires_at: row.expires_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

pub fn into_quests(rows: Vec<QuestRow>) -> Result<Vec<Quest>, CoreError> {
    rows.into_iter().map(Quest::try_from).collect()
}

/// A row from the `quest_definitions` table.
#[derive(Debug, Clone, FromRow)]
pub struct QuestDefinitionRow {
    pub id: DbId,
    pub key: String,
    pub title: String,
    pub description: String,
    pub min_duration_hours: i32,
    pub max_duration_hours: i32,
    pub min_reward_food: i32,
    pub max_reward_food: i32,
    pub bonus_reward_chance: f64,
    pub bonus_reward_food: i32,
    pub category: String,
    pub difficulty: String,
}

impl From<QuestDefinitionRow> for QuestDefinition {
    fn from(row: QuestDefinitionRow) -> Self {
        QuestDefinition {
            key: row.key,
            title: row.title,
            description: row.description,
            min_duration_hours: row.min_duration_hours,
            max_duration_hours: row.max_duration_hours,
            min_reward_food: row.min_reward_food,
            max_reward_food: row.max_reward_food,
            bonus_reward_chance: row.bonus_reward_chance,
            bonus_reward_food: row.bonus_reward_food,
            category: row.category,
            difficulty: row.difficulty,
        }
    }
}

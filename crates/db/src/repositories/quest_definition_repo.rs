//! Repository for the `quest_definitions` table.

use sqlx::PgExecutor;

use crate::models::quest::QuestDefinitionRow;

const COLUMNS: &str = "id, key, title, description, min_duration_hours, max_duration_hours, \
                       min_reward_food, max_reward_food, bonus_reward_chance, bonus_reward_food, \
                       category, difficulty";

pub struct QuestDefinitionRepo;

impl QuestDefinitionRepo {
    /// Active definitions ordered by key.
    pub async fn list_active<'e, E: PgExecutor<'e>>(
        executor: E,
    ) -> Result<Vec<QuestDefinitionRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM quest_definitions WHERE is_active = true ORDER BY key");
        sqlx::query_as::<_, QuestDefinitionRow>(&query)
            .fetch_all(executor)
            .await
    }
}

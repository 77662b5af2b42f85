use critter_core::character::{Character, LeaderboardEntry};
use critter_core::error::CoreError;
use critter_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use super::from_json;

/// A row from the `characters` table.
#[derive(Debug, Clone, FromRow)]
pub struct CharacterRow {
    pub id: DbId,
    pub name: String,
    pub password_hash: String,
    pub species: String,
    pub job: String,
    pub emotion: String,
    pub experience: i64,
    pub level: i32,
    pub coins: i64,
    pub food_eaten: i64,
    pub stats: serde_json::Value,
    pub evolution_stage: i32,
    pub created_at: Timestamp,
    pub last_played_at: Timestamp,
}

impl TryFrom<CharacterRow> for Character {
    type Error = CoreError;

    fn try_from(row: CharacterRow) -> Result<Self, Self::Error> {
        Ok(Character {
            id: row.id,
            name: row.name,
            password_hash: row.password_hash,
            species: row.species,
            job: row.job,
            emotion: row.emotion,
            experience: row.experience,
            level: row.level,
            coins: row.coins,
            food_eaten: row.food_eaten,
            stats: from_json("stats", row.stats)?,
            evolution_stage: row.evolution_stage,
            created_at: row.created_at,
            last_played_at: row.last_played_at,
        })
    }
}

/// Decode an optional row, passing `None` through.
pub fn into_character(row: Option<CharacterRow>) -> Result<Option<Character>, CoreError> {
    row.map(Character::try_from).transpose()
}

/// Ranked projection used by the level leaderboard.
#[derive(Debug, Clone, FromRow)]
pub struct LeaderboardRow {
    pub rank: i64,
    pub id: DbId,
    pub name: String,
    pub species: String,
    pub level: i32,
    pub experience: i64,
}

impl From<LeaderboardRow> for LeaderboardEntry {
    fn from(row: LeaderboardRow) -> Self {
        LeaderboardEntry {
            rank: row.rank,
            character_id: row.id,
            name: row.name,
            species: row.species,
            level: row.level,
            experience: row.experience,
        }
    }
}

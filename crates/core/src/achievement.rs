//! Achievement catalogue and eligibility.
//!
//! Definitions are static. Whether a character qualifies is decided from an
//! [`AchievementSnapshot`] alone, so eligibility is a pure function; unlocking
//! and paying out rewards happens in the engine.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// Condition a character must meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "target", rename_all = "snake_case")]
pub enum Requirement {
    CharacterCreated,
    Level(i32),
    FoodEaten(i64),
    QuestsCompleted(i64),
    AgeDays(i64),
}

impl Requirement {
    pub fn is_met(&self, snapshot: &AchievementSnapshot) -> bool {
        match *self {
            Requirement::CharacterCreated => true,
            Requirement::Level(n) => snapshot.level >= n,
            Requirement::FoodEaten(n) => snapshot.food_eaten >= n,
            Requirement::QuestsCompleted(n) => snapshot.quests_completed >= n,
            Requirement::AgeDays(n) => snapshot.age_days() >= n,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementReward {
    pub coins: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementDefinition {
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub tier: AchievementTier,
    pub points: i32,
    pub requirement: Requirement,
    pub reward: AchievementReward,
}

macro_rules! achievement {
    ($key:literal, $title:literal, $desc:literal, $cat:literal, $tier:ident, $points:literal,
     $req:expr, $coins:literal, $exp:literal) => {
        AchievementDefinition {
            key: $key,
            title: $title,
            description: $desc,
            category: $cat,
            tier: AchievementTier::$tier,
            points: $points,
            requirement: $req,
            reward: AchievementReward {
                coins: $coins,
                exp: $exp,
            },
        }
    };
}

pub static DEFINITIONS: &[AchievementDefinition] = &[
    achievement!("first_character", "First Friend", "Created your first character.",
        "first_steps", Bronze, 10, Requirement::CharacterCreated, 100, 50),
    achievement!("first_feed", "First Meal", "Fed your character for the first time.",
        "first_steps", Bronze, 10, Requirement::FoodEaten(1), 50, 25),
    achievement!("first_level_up", "Growing Up", "Reached level 2.",
        "first_steps", Bronze, 15, Requirement::Level(2), 150, 100),
    achievement!("level_5", "Sprout Adventurer", "Reached level 5.",
        "progression", Bronze, 25, Requirement::Level(5), 250, 200),
    achievement!("level_10", "Seasoned Adventurer", "Reached level 10.",
        "progression", Silver, 50, Requirement::Level(10), 500, 400),
    achievement!("level_25", "Expert Adventurer", "Reached level 25.",
        "progression", Gold, 100, Requirement::Level(25), 1000, 800),
    achievement!("level_50", "Master Adventurer", "Reached level 50.",
        "progression", Platinum, 200, Requirement::Level(50), 2500, 2000),
    achievement!("bug_collector_bronze", "Bug Collector", "Ate 50 meals in total.",
        "collector", Silver, 50, Requirement::FoodEaten(50), 300, 200),
    achievement!("bug_collector_silver", "Bug Enthusiast", "Ate 200 meals in total.",
        "collector", Gold, 120, Requirement::FoodEaten(200), 800, 600),
    achievement!("first_quest", "Errand Runner", "Completed a quest.",
        "adventure", Bronze, 15, Requirement::QuestsCompleted(1), 100, 50),
    achievement!("quest_veteran", "Quest Veteran", "Completed 25 quests.",
        "adventure", Silver, 60, Requirement::QuestsCompleted(25), 600, 400),
    achievement!("week_survivor", "One Week Strong", "Kept your character for a week.",
        "time_keeper", Bronze, 30, Requirement::AgeDays(7), 200, 150),
    achievement!("month_survivor", "One Month Strong", "Kept your character for a month.",
        "time_keeper", Silver, 100, Requirement::AgeDays(30), 1000, 600),
    achievement!("year_survivor", "One Year Strong", "Kept your character for a year.",
        "time_keeper", Gold, 365, Requirement::AgeDays(365), 5000, 3000),
];

pub fn definition(key: &str) -> Option<&'static AchievementDefinition> {
    DEFINITIONS.iter().find(|d| d.key == key)
}

/// Character facts achievements are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementSnapshot {
    pub character_id: DbId,
    pub level: i32,
    pub food_eaten: i64,
    pub quests_completed: i64,
    pub created_at: Timestamp,
    pub now: Timestamp,
}

impl AchievementSnapshot {
    /// Whole days since creation.
    pub fn age_days(&self) -> i64 {
        (self.now - self.created_at).num_days().max(0)
    }
}

/// Definitions the snapshot satisfies that are not yet in `unlocked`.
pub fn eligible<S: AsRef<str>>(
    snapshot: &AchievementSnapshot,
    unlocked: &[S],
) -> Vec<&'static AchievementDefinition> {
    DEFINITIONS
        .iter()
        .filter(|d| !unlocked.iter().any(|k| k.as_ref() == d.key))
        .filter(|d| d.requirement.is_met(snapshot))
        .collect()
}

/// An unlocked achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: DbId,
    pub character_id: DbId,
    pub key: String,
    pub achieved_at: Timestamp,
    pub reward: AchievementReward,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AchievementStats {
    pub unlocked: usize,
    pub total: usize,
    pub points: i32,
    pub completion_percent: f64,
}

impl AchievementStats {
    pub fn of(unlocked: &[Achievement]) -> Self {
        let total = DEFINITIONS.len();
        let points = unlocked
            .iter()
            .filter_map(|a| definition(&a.key))
            .map(|d| d.points)
            .sum();
        Self {
            unlocked: unlocked.len(),
            total,
            points,
            completion_percent: unlocked.len() as f64 / total as f64 * 100.0,
        }
    }
}

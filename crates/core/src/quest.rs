//! Quest definitions, batch generation and the quest state machine.
//!
//! A quest is `received` when generated. Accepting it starts a timer of
//! `duration_hours`; once the timer has run out the quest completes and pays
//! `reward_food_count` low-tier food units. Rejecting a received quest parks
//! it as `available`, where it stays.

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::random::RandomSource;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Quests created per generation request.
pub const QUEST_BATCH_SIZE: usize = 5;

/// Quests a character may have running at once.
pub const MAX_ACCEPTED_QUESTS: i64 = 4;

/// Quests a character may complete per UTC day.
pub const DAILY_QUEST_LIMIT: i64 = 10;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Received,
    Available,
    Accepted,
    Completed,
    /// Kept for stored rows; timed-out quests complete instead.
    Expired,
}

impl QuestStatus {
    pub const ALL: [QuestStatus; 5] = [
        QuestStatus::Received,
        QuestStatus::Available,
        QuestStatus::Accepted,
        QuestStatus::Completed,
        QuestStatus::Expired,
    ];

    pub fn name(self) -> &'static str {
        match self {
            QuestStatus::Received => "received",
            QuestStatus::Available => "available",
            QuestStatus::Accepted => "accepted",
            QuestStatus::Completed => "completed",
            QuestStatus::Expired => "expired",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| CoreError::Validation(format!("Unknown quest status '{name}'")))
    }
}

/// Allowed quest status transitions.
pub mod state_machine {
    use super::QuestStatus;
    use crate::error::CoreError;

    /// Statuses reachable from `from`. Completed, available and expired are
    /// terminal.
    pub fn valid_transitions(from: QuestStatus) -> &'static [QuestStatus] {
        match from {
            QuestStatus::Received => &[QuestStatus::Accepted, QuestStatus::Available],
            QuestStatus::Accepted => &[QuestStatus::Completed],
            QuestStatus::Available | QuestStatus::Completed | QuestStatus::Expired => &[],
        }
    }

    pub fn can_transition(from: QuestStatus, to: QuestStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    pub fn validate_transition(from: QuestStatus, to: QuestStatus) -> Result<(), CoreError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition(format!(
                "quest cannot move from {} to {}",
                from.name(),
                to.name()
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Quests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: DbId,
    pub character_id: DbId,
    pub title: String,
    pub description: String,
    pub status: QuestStatus,
    pub duration_hours: i32,
    pub reward_food_count: i32,
    pub accepted_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Quest {
    pub fn duration(&self) -> Duration {
        Duration::hours(i64::from(self.duration_hours))
    }

    /// Accepted and past its expiry.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status == QuestStatus::Accepted && self.expires_at.is_some_and(|at| now >= at)
    }

    /// Whole seconds until the quest can be completed (0 when due).
    pub fn remaining_secs(&self, now: Timestamp) -> i64 {
        self.expires_at
            .map(|at| (at - now).num_seconds().max(0))
            .unwrap_or(0)
    }
}

/// Insert payload for a generated quest; the owner is given at insert time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewQuest {
    pub title: String,
    pub description: String,
    pub duration_hours: i32,
    pub reward_food_count: i32,
}

/// Template quests are rolled from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestDefinition {
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

impl QuestDefinition {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.min_duration_hours < 1 || self.max_duration_hours < self.min_duration_hours {
            return Err(CoreError::Validation(format!(
                "Quest definition '{}' has an invalid duration range",
                self.key
            )));
        }
        if self.min_reward_food < 0 || self.max_reward_food < self.min_reward_food {
            return Err(CoreError::Validation(format!(
                "Quest definition '{}' has an invalid reward range",
                self.key
            )));
        }
        if !(0.0..=1.0).contains(&self.bonus_reward_chance) {
            return Err(CoreError::Validation(format!(
                "Quest definition '{}' has a bonus chance outside [0, 1]",
                self.key
            )));
        }
        Ok(())
    }

    /// Uniform whole hours in `[min, max]`.
    pub fn roll_duration(&self, rng: &dyn RandomSource) -> i32 {
        roll_i32(rng, self.min_duration_hours, self.max_duration_hours)
    }

    /// Uniform food in `[min, max]`, replaced by the bonus reward on a
    /// successful bonus roll.
    pub fn roll_reward(&self, rng: &dyn RandomSource) -> i32 {
        let base = roll_i32(rng, self.min_reward_food, self.max_reward_food);
        if rng.chance(self.bonus_reward_chance) {
            self.bonus_reward_food
        } else {
            base
        }
    }
}

fn roll_i32(rng: &dyn RandomSource, min: i32, max: i32) -> i32 {
    // Bounds are i32, so the result is too.
    rng.range_inclusive(i64::from(min), i64::from(max)) as i32
}

/// Built-in definitions used when none are stored.
pub fn default_definitions() -> Vec<QuestDefinition> {
    vec![
        QuestDefinition {
            key: "quest_001".into(),
            title: "Morning Exercise".into(),
            description: "Start the day with a light workout and recharge your energy.".into(),
            min_duration_hours: 8,
            max_duration_hours: 12,
            min_reward_food: 3,
            max_reward_food: 5,
            bonus_reward_chance: 0.05,
            bonus_reward_food: 10,
            category: "daily".into(),
            difficulty: "easy".into(),
        },
        QuestDefinition {
            key: "quest_002".into(),
            title: "Forest Expedition".into(),
            description: "Explore the mysterious forest and uncover its hidden treasure.".into(),
            min_duration_hours: 10,
            max_duration_hours: 16,
            min_reward_food: 4,
            max_reward_food: 6,
            bonus_reward_chance: 0.05,
            bonus_reward_food: 10,
            category: "adventure".into(),
            difficulty: "normal".into(),
        },
    ]
}

/// Roll `count` quests from `definitions`.
///
/// Draw order per quest: definition, duration, base reward, bonus.
pub fn generate_batch(
    definitions: &[QuestDefinition],
    count: usize,
    rng: &dyn RandomSource,
) -> Result<Vec<NewQuest>, CoreError> {
    if definitions.is_empty() {
        return Err(CoreError::Validation(
            "No quest definitions available".into(),
        ));
    }
    for def in definitions {
        def.validate()?;
    }

    Ok((0..count)
        .map(|_| {
            let def = &definitions[rng.pick_index(definitions.len())];
            let duration_hours = def.roll_duration(rng);
            let reward_food_count = def.roll_reward(rng);
            NewQuest {
                title: def.title.clone(),
                description: def.description.clone(),
                duration_hours,
                reward_food_count,
            }
        })
        .collect())
}

/// UTC midnight starting the day that contains `now`.
pub fn start_of_day(now: Timestamp) -> Timestamp {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

// ---------------------------------------------------------------------------
// Acceptance
// ---------------------------------------------------------------------------

/// Counters gating quest acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuestProgress {
    pub accepted: i64,
    pub completed_today: i64,
    pub max_accepted: i64,
    pub daily_limit: i64,
}

impl QuestProgress {
    pub fn new(accepted: i64, completed_today: i64) -> Self {
        Self {
            accepted,
            completed_today,
            max_accepted: MAX_ACCEPTED_QUESTS,
            daily_limit: DAILY_QUEST_LIMIT,
        }
    }

    pub fn check_can_accept(&self) -> Result<(), CoreError> {
        if self.accepted >= self.max_accepted {
            return Err(CoreError::LimitReached(format!(
                "at most {} quests can be in progress",
                self.max_accepted
            )));
        }
        if self.completed_today >= self.daily_limit {
            return Err(CoreError::LimitReached(format!(
                "daily quest limit of {} reached",
                self.daily_limit
            )));
        }
        Ok(())
    }

    pub fn can_accept(&self) -> bool {
        self.check_can_accept().is_ok()
    }
}

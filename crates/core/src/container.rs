//! Bonus containers ("boxes") granted during feeding.
//!
//! A container is created unopened with no reward. The reward is rolled once,
//! at open time, and is immutable afterwards.

use serde::{Deserialize, Serialize};

use crate::random::RandomSource;
use crate::rewards::coins_for_draw;
use crate::types::{DbId, Timestamp};

/// Probability that an opened container pays coins rather than food.
pub const COIN_REWARD_CHANCE: f64 = 0.6;

/// Coin rewards pay the feeding coin table times this multiplier.
pub const COIN_REWARD_MULTIPLIER: i64 = 2;

/// Food rewards hand out between these many low-tier units.
pub const MIN_FOOD_REWARD: i64 = 1;
pub const MAX_FOOD_REWARD: i64 = 3;

/// Reward stored on an opened container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoxReward {
    Coins { amount: i64 },
    Food { units: i64 },
}

impl BoxReward {
    pub fn coins(&self) -> i64 {
        match self {
            BoxReward::Coins { amount } => *amount,
            BoxReward::Food { .. } => 0,
        }
    }

    pub fn food_units(&self) -> i64 {
        match self {
            BoxReward::Food { units } => *units,
            BoxReward::Coins { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusContainer {
    pub id: DbId,
    pub character_id: DbId,
    pub created_at: Timestamp,
    pub opened: bool,
    pub opened_at: Option<Timestamp>,
    pub reward: Option<BoxReward>,
}

/// Roll the reward for a container being opened.
pub fn roll_box_reward(rng: &dyn RandomSource) -> BoxReward {
    if rng.chance(COIN_REWARD_CHANCE) {
        BoxReward::Coins {
            amount: coins_for_draw(rng.next_f64()) * COIN_REWARD_MULTIPLIER,
        }
    } else {
        BoxReward::Food {
            units: rng.range_inclusive(MIN_FOOD_REWARD, MAX_FOOD_REWARD),
        }
    }
}

//! Feeding rewards: fixed experience, a coin table and bonus containers.
//!
//! Each feeding action grants [`EXP_PER_ACTION`] experience, rolls the coin
//! table and, independently, rolls a [`BONUS_CONTAINER_CHANCE`] for a bonus
//! container. A high-tier unit resolves ten actions in one call.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::random::RandomSource;
use crate::resource::Tier;

/// Experience granted per feeding action.
pub const EXP_PER_ACTION: i64 = 80;

/// Probability of a bonus container per feeding action.
pub const BONUS_CONTAINER_CHANCE: f64 = 0.05;

/// Gate probability used by [`CurrencyPolicy::Gated`] when none is configured.
pub const DEFAULT_CURRENCY_GATE: f64 = 0.8;

/// Coin table as `(upper bound of the draw, coins)`; draws past the last bound
/// pay [`JACKPOT_COINS`].
const COIN_TABLE: &[(f64, i64)] = &[(0.50, 100), (0.80, 200), (0.95, 300)];

/// Coins for the top 5% of draws.
pub const JACKPOT_COINS: i64 = 500;

/// Whether the coin table is rolled on every action or behind a gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CurrencyPolicy {
    /// Roll the coin table on every action.
    #[default]
    Always,
    /// Roll the coin table only when a first draw falls below `probability`.
    Gated { probability: f64 },
}

impl CurrencyPolicy {
    pub fn gated(probability: f64) -> Result<Self, CoreError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(CoreError::Validation(format!(
                "Currency gate must be within [0, 1], got {probability}"
            )));
        }
        Ok(CurrencyPolicy::Gated { probability })
    }
}

/// Coins paid for a uniform `draw` in `[0, 1)`.
pub fn coins_for_draw(draw: f64) -> i64 {
    COIN_TABLE
        .iter()
        .find(|(bound, _)| draw < *bound)
        .map(|(_, coins)| *coins)
        .unwrap_or(JACKPOT_COINS)
}

/// Outcome of a single feeding action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionReward {
    pub experience: i64,
    pub coins: Option<i64>,
    pub bonus_container: bool,
}

/// Resolve one feeding action.
///
/// Draw order: currency (gate first when gated), then the container roll.
pub fn resolve_action(policy: CurrencyPolicy, rng: &dyn RandomSource) -> ActionReward {
    let coins = match policy {
        CurrencyPolicy::Always => Some(coins_for_draw(rng.next_f64())),
        CurrencyPolicy::Gated { probability } => {
            if rng.chance(probability) {
                Some(coins_for_draw(rng.next_f64()))
            } else {
                None
            }
        }
    };
    ActionReward {
        experience: EXP_PER_ACTION,
        coins,
        bonus_container: rng.chance(BONUS_CONTAINER_CHANCE),
    }
}

/// Summed rewards for eating one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewardRoll {
    pub actions: u32,
    pub experience: i64,
    pub coins: i64,
    pub containers: u32,
}

impl RewardRoll {
    pub fn coins_gained(&self) -> Option<i64> {
        (self.coins > 0).then_some(self.coins)
    }
}

/// Resolve every action granted by eating one unit of `tier`.
pub fn resolve_consumption(
    tier: Tier,
    policy: CurrencyPolicy,
    rng: &dyn RandomSource,
) -> RewardRoll {
    (0..tier.actions()).fold(RewardRoll::default(), |mut roll, _| {
        let action = resolve_action(policy, rng);
        roll.actions += 1;
        roll.experience += action.experience;
        roll.coins += action.coins.unwrap_or(0);
        roll.containers += u32::from(action.bonus_container);
        roll
    })
}

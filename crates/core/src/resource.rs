//! Food resource units and their tiers.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Resource tier. Tier is fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// A single meal, produced by the accrual clock and quest rewards.
    Low,
    /// Ten low-tier meals folded into one unit by tier conversion.
    High,
}

impl Tier {
    /// Name stored in the `resource_units.tier` column.
    pub fn name(self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::High => "high",
        }
    }

    /// Parse from the database `tier` column.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "low" => Ok(Tier::Low),
            "high" => Ok(Tier::High),
            other => Err(CoreError::Validation(format!(
                "Unknown resource tier '{other}'"
            ))),
        }
    }

    /// Number of feeding actions resolved when a unit of this tier is eaten.
    pub fn actions(self) -> u32 {
        match self {
            Tier::Low => 1,
            Tier::High => crate::conversion::UNITS_PER_HIGH_TIER as u32,
        }
    }
}

/// One food unit owned by a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUnit {
    pub id: DbId,
    pub character_id: DbId,
    pub tier: Tier,
    pub created_at: Timestamp,
    pub consumed: bool,
    pub consumed_at: Option<Timestamp>,
}

/// Unconsumed units split by tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub low: i64,
    pub high: i64,
}

impl TierCounts {
    pub fn of(units: &[ResourceUnit]) -> Self {
        units
            .iter()
            .filter(|u| !u.consumed)
            .fold(Self::default(), |mut acc, u| {
                match u.tier {
                    Tier::Low => acc.low += 1,
                    Tier::High => acc.high += 1,
                }
                acc
            })
    }

    /// Total value measured in low-tier units.
    pub fn stock(&self) -> i64 {
        self.low + self.high * crate::conversion::UNITS_PER_HIGH_TIER as i64
    }
}

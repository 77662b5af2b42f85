//! Low-tier to high-tier conversion.
//!
//! Every ten unconsumed low-tier units fold into one high-tier unit, oldest
//! units first. The remainder below ten is left alone.

use serde::Serialize;

use crate::resource::{ResourceUnit, Tier};
use crate::types::DbId;

/// Low-tier units folded into one high-tier unit.
pub const UNITS_PER_HIGH_TIER: usize = 10;

/// Which low-tier units to retire and how many high-tier units to mint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionPlan {
    pub promoted: i64,
    /// Retired low-tier unit ids, oldest first.
    pub consumed_low_ids: Vec<DbId>,
}

impl ConversionPlan {
    pub fn is_empty(&self) -> bool {
        self.promoted == 0
    }
}

/// Plan a conversion over `units`.
///
/// Consumed and high-tier entries in `units` are ignored, so the full unit
/// list of a character can be passed as-is. Ordering is by `created_at`, then
/// `id`, which keeps the selection deterministic when several units share an
/// accrual instant.
pub fn plan_conversion(units: &[ResourceUnit]) -> ConversionPlan {
    let mut eligible: Vec<&ResourceUnit> = units
        .iter()
        .filter(|u| u.tier == Tier::Low && !u.consumed)
        .collect();

    let promoted = eligible.len() / UNITS_PER_HIGH_TIER;
    if promoted == 0 {
        return ConversionPlan::default();
    }

    eligible.sort_by_key(|u| (u.created_at, u.id));

    ConversionPlan {
        promoted: promoted as i64,
        consumed_low_ids: eligible
            .iter()
            .take(promoted * UNITS_PER_HIGH_TIER)
            .map(|u| u.id)
            .collect(),
    }
}

//! Timed food accrual with offline catch-up.
//!
//! One low-tier unit appears per interval, up to a cap. The clock anchor
//! (`last_generated_at`) advances by whole intervals only, so fractional
//! progress toward the next unit survives any polling cadence, and it does not
//! move at all while storage is full.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::resource::TierCounts;
use crate::types::Timestamp;

/// Default seconds between two accrued units (30 minutes).
pub const DEFAULT_INTERVAL_SECS: i64 = 30 * 60;

/// Default storage cap.
pub const DEFAULT_CAP: i64 = 100;

/// Low-tier units handed to a newly created character.
pub const INITIAL_UNITS: i64 = 9;

/// What counts against the cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapPolicy {
    /// Only unconsumed low-tier units.
    #[default]
    LowTier,
    /// Unconsumed low-tier units plus ten per unconsumed high-tier unit.
    Stock,
}

impl CapPolicy {
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "low_tier" => Ok(CapPolicy::LowTier),
            "stock" => Ok(CapPolicy::Stock),
            other => Err(CoreError::Validation(format!(
                "Unknown cap policy '{other}'. Must be one of: low_tier, stock"
            ))),
        }
    }

    fn occupancy(self, counts: TierCounts) -> i64 {
        match self {
            CapPolicy::LowTier => counts.low,
            CapPolicy::Stock => counts.stock(),
        }
    }
}

/// Per-character accrual clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccrualState {
    pub last_generated_at: Timestamp,
    pub counts: TierCounts,
    pub interval_secs: i64,
    pub cap: i64,
    pub cap_policy: CapPolicy,
}

impl AccrualState {
    /// Interval as a duration, saturating for values chrono cannot hold.
    pub fn interval(&self) -> Duration {
        Duration::try_seconds(self.interval_secs).unwrap_or(Duration::MAX)
    }

    /// Units currently counted against the cap.
    pub fn occupancy(&self) -> i64 {
        self.cap_policy.occupancy(self.counts)
    }

    pub fn is_full(&self) -> bool {
        self.occupancy() >= self.cap
    }

    pub fn room_left(&self) -> i64 {
        (self.cap - self.occupancy()).max(0)
    }

    /// When the next unit becomes due, or `None` while storage is full or
    /// the instant is past the representable range.
    pub fn next_unit_at(&self) -> Option<Timestamp> {
        if self.is_full() {
            None
        } else {
            self.last_generated_at.checked_add_signed(self.interval())
        }
    }

    /// Time left until [`next_unit_at`](Self::next_unit_at), never negative.
    pub fn time_until_next_unit(&self, now: Timestamp) -> Option<Duration> {
        self.next_unit_at()
            .map(|next| (next - now).max(Duration::zero()))
    }

    /// Percentage of the cap in use, clamped to 100.
    pub fn storage_usage_percent(&self) -> f64 {
        if self.cap <= 0 {
            return 100.0;
        }
        (self.occupancy() as f64 / self.cap as f64 * 100.0).min(100.0)
    }

    fn validate(&self, now: Timestamp) -> Result<(), CoreError> {
        if self.interval_secs <= 0 {
            return Err(CoreError::Validation(
                "Accrual interval must be positive".into(),
            ));
        }
        if Duration::try_seconds(self.interval_secs).is_none() {
            return Err(CoreError::Validation(format!(
                "Accrual interval of {}s is out of range",
                self.interval_secs
            )));
        }
        if self.cap <= 0 {
            return Err(CoreError::Validation("Accrual cap must be positive".into()));
        }
        if now < self.last_generated_at {
            return Err(CoreError::Validation(format!(
                "Accrual time {now} is before the last generation at {}",
                self.last_generated_at
            )));
        }
        Ok(())
    }
}

/// Result of one [`accrue`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualOutcome {
    pub state: AccrualState,
    pub units_created: i64,
    /// Accrual instant of each created unit, oldest first.
    pub unit_timestamps: Vec<Timestamp>,
}

/// Compute how many low-tier units are due at `now`.
///
/// `units = min(floor(elapsed / interval), cap - occupancy)`; the anchor moves
/// forward by exactly `units * interval`. Calling again with the same `now`
/// creates nothing.
pub fn accrue(state: &AccrualState, now: Timestamp) -> Result<AccrualOutcome, CoreError> {
    state.validate(now)?;

    let interval_ms = state.interval_secs.saturating_mul(1000);
    let elapsed_ms = (now - state.last_generated_at).num_milliseconds();
    let whole_intervals = elapsed_ms / interval_ms;
    let units = whole_intervals.min(state.room_left()).max(0);

    if units == 0 {
        return Ok(AccrualOutcome {
            state: state.clone(),
            units_created: 0,
            unit_timestamps: Vec::new(),
        });
    }

    let unit_timestamps = (1..=units)
        .map(|k| advance(state.last_generated_at, state.interval_secs, k))
        .collect::<Result<Vec<_>, _>>()?;

    let mut next = state.clone();
    next.last_generated_at = advance(state.last_generated_at, state.interval_secs, units)?;
    next.counts.low += units;

    Ok(AccrualOutcome {
        state: next,
        units_created: units,
        unit_timestamps,
    })
}

/// `from + intervals * interval_secs`, failing instead of overflowing.
fn advance(from: Timestamp, interval_secs: i64, intervals: i64) -> Result<Timestamp, CoreError> {
    interval_secs
        .checked_mul(intervals)
        .and_then(Duration::try_seconds)
        .and_then(|step| from.checked_add_signed(step))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "Advancing {intervals} intervals of {interval_secs}s overflows the clock"
            ))
        })
}

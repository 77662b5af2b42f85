//! Level-from-experience formula and progression snapshots.
//!
//! Level is always derived: `max(1, floor(sqrt(experience / 100)) + 1)`.
//! It is recomputed from scratch after every experience change and never
//! incremented on its own.

use serde::Serialize;

use crate::types::DbId;

/// Experience divisor inside the square root.
pub const EXP_PER_LEVEL_STEP: i64 = 100;

/// Level reached with `experience` cumulative experience points.
///
/// Negative input is treated as zero.
pub fn level_for(experience: i64) -> i32 {
    if experience <= 0 {
        return 1;
    }
    let root = integer_sqrt((experience / EXP_PER_LEVEL_STEP) as u64);
    i32::try_from(root)
        .map(|r| r.saturating_add(1))
        .unwrap_or(i32::MAX)
}

/// Minimum cumulative experience required to reach `level`.
pub fn experience_for_level(level: i32) -> i64 {
    let steps = i64::from(level.max(1) - 1);
    steps.saturating_mul(steps).saturating_mul(EXP_PER_LEVEL_STEP)
}

/// Floor of the square root, exact for every `u64`.
fn integer_sqrt(n: u64) -> u64 {
    let mut root = (n as f64).sqrt() as u64;
    while root.checked_mul(root).map_or(true, |sq| sq > n) {
        root -= 1;
    }
    while (root + 1).checked_mul(root + 1).is_some_and(|sq| sq <= n) {
        root += 1;
    }
    root
}

/// Level before and after an experience change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelChange {
    pub old_level: i32,
    pub new_level: i32,
    pub leveled_up: bool,
}

impl LevelChange {
    pub fn between(old_experience: i64, new_experience: i64) -> Self {
        let old_level = level_for(old_experience);
        let new_level = level_for(new_experience);
        Self {
            old_level,
            new_level,
            leveled_up: new_level > old_level,
        }
    }
}

/// Per-character experience, derived level and coin balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressionState {
    pub character_id: DbId,
    pub experience: i64,
    pub level: i32,
    pub coins: i64,
}

impl ProgressionState {
    /// Fresh progression for a newly created character.
    pub fn initial(character_id: DbId, coins: i64) -> Self {
        Self {
            character_id,
            experience: 0,
            level: 1,
            coins,
        }
    }

    /// Apply an experience and coin delta, recomputing the level.
    ///
    /// Negative deltas are ignored: experience never decreases and coins are
    /// only spent through dedicated operations.
    pub fn gain(&self, experience: i64, coins: i64) -> Self {
        let experience = self.experience.saturating_add(experience.max(0));
        Self {
            character_id: self.character_id,
            experience,
            level: level_for(experience),
            coins: self.coins.saturating_add(coins.max(0)),
        }
    }

    /// Experience still missing before the next level.
    pub fn experience_to_next_level(&self) -> i64 {
        (experience_for_level(self.level + 1) - self.experience).max(0)
    }
}

/// Progression before and after one committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressionChange {
    pub before: ProgressionState,
    pub after: ProgressionState,
}

impl ProgressionChange {
    pub fn level_change(&self) -> LevelChange {
        LevelChange::between(self.before.experience, self.after.experience)
    }

    pub fn leveled_up(&self) -> bool {
        self.after.level > self.before.level
    }
}

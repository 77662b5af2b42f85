//! Persistence seam used by the [`Engine`](crate::engine::Engine).
//!
//! Every mutating method is atomic: it either applies all of its effects or
//! none of them. Single-use flags (unit `consumed`, container `opened`, quest
//! `status`, the accrual anchor) are updated compare-and-set style, and a lost
//! race surfaces as the matching [`CoreError`] instead of a double apply.

use async_trait::async_trait;
use serde::Serialize;

use crate::achievement::{Achievement, AchievementReward};
use crate::character::{Character, LeaderboardEntry, NewCharacterRecord};
use crate::container::{BonusContainer, BoxReward};
use crate::conversion::ConversionPlan;
use crate::error::CoreError;
use crate::leveling::ProgressionChange;
use crate::notification::{NewNotification, Notification};
use crate::quest::{NewQuest, Quest, QuestDefinition, QuestProgress};
use crate::resource::{ResourceUnit, TierCounts};
use crate::stats::StatsUpdate;
use crate::types::{DbId, Timestamp};

/// A freshly inserted character with its starting food and quests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedCharacter {
    pub character: Character,
    pub food: Vec<ResourceUnit>,
    pub quests: Vec<Quest>,
}

/// Accrual anchor plus unconsumed unit counts, as loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualRecord {
    pub character_id: DbId,
    pub last_generated_at: Timestamp,
    pub counts: TierCounts,
}

/// Accrual result to persist.
///
/// Applied only while the stored anchor still equals
/// `expected_last_generated_at`; otherwise [`CoreError::Conflict`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualCommit {
    pub character_id: DbId,
    pub expected_last_generated_at: Timestamp,
    pub last_generated_at: Timestamp,
    pub unit_timestamps: Vec<Timestamp>,
}

/// Eating one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionCommit {
    pub character_id: DbId,
    pub unit_id: DbId,
    pub consumed_at: Timestamp,
    pub experience: i64,
    pub coins: i64,
    /// Feeding actions resolved, added to the character's `food_eaten`.
    pub actions: i64,
    /// Bonus containers to create.
    pub containers: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionApplied {
    pub unit: ResourceUnit,
    pub progression: ProgressionChange,
    pub containers: Vec<BonusContainer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenContainerCommit {
    pub character_id: DbId,
    pub container_id: DbId,
    pub opened_at: Timestamp,
    pub reward: BoxReward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenContainerApplied {
    pub container: BonusContainer,
    pub progression: ProgressionChange,
    pub units: Vec<ResourceUnit>,
}

/// Quest acceptance; limits are checked against the store's current counters
/// inside the same atomic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptQuestCommit {
    pub character_id: DbId,
    pub quest_id: DbId,
    pub accepted_at: Timestamp,
    /// Start of the UTC day used for the daily limit.
    pub day_start: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestCompletion {
    pub quest: Quest,
    pub units: Vec<ResourceUnit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementUnlock {
    pub achievement: Achievement,
    pub progression: ProgressionChange,
}

#[async_trait]
pub trait Store: Send + Sync {
    // -- characters --------------------------------------------------------

    /// Insert a character with its accrual anchor at `created_at`,
    /// `initial_food` low-tier units and `first_quests` as received quests.
    /// Duplicate names fail with `Conflict`.
    async fn create_character(
        &self,
        record: NewCharacterRecord,
        initial_food: i64,
        first_quests: &[NewQuest],
    ) -> Result<CreatedCharacter, CoreError>;

    async fn get_character(&self, character_id: DbId) -> Result<Character, CoreError>;

    async fn find_character_by_name(&self, name: &str) -> Result<Option<Character>, CoreError>;

    async fn touch_last_played(&self, character_id: DbId, at: Timestamp) -> Result<(), CoreError>;

    /// Characters played at or after `since`.
    async fn list_active_character_ids(&self, since: Timestamp) -> Result<Vec<DbId>, CoreError>;

    /// Top characters by experience, earliest created first on ties.
    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, CoreError>;

    async fn update_emotion(
        &self,
        character_id: DbId,
        emotion: &str,
    ) -> Result<Character, CoreError>;

    /// Merge `update` into the stored stats.
    async fn update_stats(
        &self,
        character_id: DbId,
        update: &StatsUpdate,
    ) -> Result<Character, CoreError>;

    /// Move from `from_stage` to the next evolution stage. `Conflict` when the
    /// stored stage is no longer `from_stage`.
    async fn advance_evolution_stage(
        &self,
        character_id: DbId,
        from_stage: i32,
    ) -> Result<Character, CoreError>;

    // -- food --------------------------------------------------------------

    async fn load_accrual(&self, character_id: DbId) -> Result<AccrualRecord, CoreError>;

    async fn commit_accrual(&self, commit: AccrualCommit) -> Result<Vec<ResourceUnit>, CoreError>;

    /// Units owned by the character, oldest first.
    async fn list_units(
        &self,
        character_id: DbId,
        include_consumed: bool,
    ) -> Result<Vec<ResourceUnit>, CoreError>;

    /// `NotFound` when missing or owned by another character.
    async fn get_unit(&self, character_id: DbId, unit_id: DbId) -> Result<ResourceUnit, CoreError>;

    /// Retire the planned low-tier units and mint the high-tier ones. Any
    /// planned unit already consumed fails the whole step with `Conflict`.
    async fn apply_conversion(
        &self,
        character_id: DbId,
        plan: &ConversionPlan,
        at: Timestamp,
    ) -> Result<Vec<ResourceUnit>, CoreError>;

    /// `AlreadyConsumed` when the unit was consumed first.
    async fn commit_consumption(
        &self,
        commit: ConsumptionCommit,
    ) -> Result<ConsumptionApplied, CoreError>;

    // -- progression -------------------------------------------------------

    /// Add experience and coins, recomputing the level.
    async fn apply_progression(
        &self,
        character_id: DbId,
        experience: i64,
        coins: i64,
    ) -> Result<ProgressionChange, CoreError>;

    // -- containers --------------------------------------------------------

    async fn list_containers(&self, character_id: DbId) -> Result<Vec<BonusContainer>, CoreError>;

    async fn get_container(
        &self,
        character_id: DbId,
        container_id: DbId,
    ) -> Result<BonusContainer, CoreError>;

    /// Store the reward and apply it. `AlreadyOpened` when opened first.
    async fn commit_open_container(
        &self,
        commit: OpenContainerCommit,
    ) -> Result<OpenContainerApplied, CoreError>;

    // -- quests ------------------------------------------------------------

    /// Stored definitions; empty when none are configured.
    async fn quest_definitions(&self) -> Result<Vec<QuestDefinition>, CoreError>;

    async fn insert_quests(
        &self,
        character_id: DbId,
        quests: &[NewQuest],
        created_at: Timestamp,
    ) -> Result<Vec<Quest>, CoreError>;

    async fn list_quests(&self, character_id: DbId) -> Result<Vec<Quest>, CoreError>;

    async fn get_quest(&self, character_id: DbId, quest_id: DbId) -> Result<Quest, CoreError>;

    async fn quest_progress(
        &self,
        character_id: DbId,
        day_start: Timestamp,
    ) -> Result<QuestProgress, CoreError>;

    async fn count_completed_quests(&self, character_id: DbId) -> Result<i64, CoreError>;

    /// `received -> accepted`, setting `expires_at = accepted_at + duration`.
    async fn accept_quest(&self, commit: AcceptQuestCommit) -> Result<Quest, CoreError>;

    /// `received -> available`.
    async fn reject_quest(&self, character_id: DbId, quest_id: DbId) -> Result<Quest, CoreError>;

    /// `accepted -> completed`, granting `reward_food_count` low-tier units.
    async fn complete_quest(
        &self,
        character_id: DbId,
        quest_id: DbId,
        completed_at: Timestamp,
    ) -> Result<QuestCompletion, CoreError>;

    // -- achievements ------------------------------------------------------

    async fn list_achievements(&self, character_id: DbId) -> Result<Vec<Achievement>, CoreError>;

    /// Record the achievement and pay its reward. `None` when it was already
    /// unlocked.
    async fn unlock_achievement(
        &self,
        character_id: DbId,
        key: &str,
        reward: AchievementReward,
        at: Timestamp,
    ) -> Result<Option<AchievementUnlock>, CoreError>;

    // -- notifications -----------------------------------------------------

    async fn record_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, CoreError>;

    /// Newest first.
    async fn list_notifications(
        &self,
        character_id: DbId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, CoreError>;

    /// `NotFound` when missing or owned by another character.
    async fn mark_notification_read(
        &self,
        character_id: DbId,
        notification_id: DbId,
    ) -> Result<Notification, CoreError>;
}

//! [`Store`] implementation over PostgreSQL.
//!
//! Each mutating method opens one transaction. Single-use flags are flipped
//! with conditional `UPDATE`s (see the repositories), and rows whose counters
//! are read-then-written (character progression, quest slots) are locked with
//! `SELECT ... FOR UPDATE` first. Dropping a transaction without committing
//! rolls it back, so every early `?` return leaves the database untouched.

use async_trait::async_trait;
use critter_core::achievement::{Achievement, AchievementReward};
use critter_core::character::{Character, LeaderboardEntry, NewCharacterRecord};
use critter_core::container::{BonusContainer, BoxReward};
use critter_core::conversion::ConversionPlan;
use critter_core::error::CoreError;
use critter_core::leveling::ProgressionChange;
use critter_core::notification::{NewNotification, Notification};
use critter_core::quest::{
    state_machine, NewQuest, Quest, QuestDefinition, QuestProgress, QuestStatus,
};
use critter_core::resource::{ResourceUnit, Tier};
use critter_core::stats::StatsUpdate;
use critter_core::store::{
    AcceptQuestCommit, AccrualCommit, AccrualRecord, AchievementUnlock, ConsumptionApplied,
    ConsumptionCommit, CreatedCharacter, OpenContainerApplied, OpenContainerCommit,
    QuestCompletion, Store,
};
use critter_core::types::{DbId, Timestamp};
use sqlx::PgConnection;

use crate::models::character::into_character;
use crate::models::event::CreateEvent;
use crate::models::food::into_units;
use crate::models::quest::{into_quests, QuestRow};
use crate::models::to_json;
use crate::repositories::{
    AccrualRepo, AchievementRepo, BonusBoxRepo, CharacterRepo, EventRepo, FoodUnitRepo,
    QuestDefinitionRepo, QuestRepo,
};
use crate::DbPool;

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Map a database error onto the domain error.
///
/// Unique violations on `uq_*` constraints are conflicts; everything else is
/// treated as the store being unavailable.
pub fn store_err(e: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            if let Some(constraint) = db.constraint().filter(|c| c.starts_with("uq_")) {
                return CoreError::Conflict(format!("Duplicate value violates {constraint}"));
            }
        }
    }
    tracing::error!(error = %e, "Database operation failed");
    CoreError::StoreUnavailable(e.to_string())
}

fn character_not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "Character",
        id,
    }
}

/// Like [`store_err`], but a foreign key violation means the owning character
/// does not exist.
fn owner_err(e: sqlx::Error, character_id: DbId) -> CoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_foreign_key_violation() {
            return character_not_found(character_id);
        }
    }
    store_err(e)
}

fn quest_not_found(id: DbId) -> CoreError {
    CoreError::NotFound { entity: "Quest", id }
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

/// Postgres-backed [`Store`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Lock the character row and write its new progression.
    async fn progress(
        conn: &mut PgConnection,
        character_id: DbId,
        experience: i64,
        coins: i64,
        food_eaten: i64,
    ) -> Result<ProgressionChange, CoreError> {
        let row = CharacterRepo::find_for_update(&mut *conn, character_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| character_not_found(character_id))?;
        let before = Character::try_from(row)?.progression();
        let after = before.gain(experience, coins);
        CharacterRepo::update_progression(&mut *conn, &after, food_eaten)
            .await
            .map_err(store_err)?;
        Ok(ProgressionChange { before, after })
    }

    /// Insert `count` low-tier units stamped `at`.
    async fn mint_low(
        conn: &mut PgConnection,
        character_id: DbId,
        count: i64,
        at: Timestamp,
    ) -> Result<Vec<ResourceUnit>, CoreError> {
        let stamps = vec![at; count.max(0) as usize];
        let rows = FoodUnitRepo::create_batch(&mut *conn, character_id, Tier::Low, &stamps)
            .await
            .map_err(store_err)?;
        into_units(rows)
    }

    /// Insert `quests` as received quests of `character_id`.
    async fn insert_received(
        conn: &mut PgConnection,
        character_id: DbId,
        quests: &[NewQuest],
        created_at: Timestamp,
    ) -> Result<Vec<Quest>, CoreError> {
        let mut rows: Vec<QuestRow> = Vec::with_capacity(quests.len());
        for quest in quests {
            let row = QuestRepo::create(&mut *conn, character_id, quest, created_at)
                .await
                .map_err(|e| owner_err(e, character_id))?;
            rows.push(row);
        }
        into_quests(rows)
    }

    async fn locked_quest(
        conn: &mut PgConnection,
        character_id: DbId,
        quest_id: DbId,
    ) -> Result<Quest, CoreError> {
        QuestRepo::find_for_update(&mut *conn, character_id, quest_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| quest_not_found(quest_id))?
            .try_into()
    }
}

#[async_trait]
impl Store for PgStore {
    // -- characters --------------------------------------------------------

    async fn create_character(
        &self,
        record: NewCharacterRecord,
        initial_food: i64,
        first_quests: &[NewQuest],
    ) -> Result<CreatedCharacter, CoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let row = CharacterRepo::create(&mut *tx, &record)
            .await
            .map_err(|e| match store_err(e) {
                CoreError::Conflict(_) => CoreError::Conflict(format!(
                    "Character name '{}' is already taken",
                    record.name
                )),
                other => other,
            })?;
        let character = Character::try_from(row)?;
        let created_at = character.created_at;
        AccrualRepo::create(&mut *tx, character.id, created_at)
            .await
            .map_err(store_err)?;
        let food = Self::mint_low(&mut tx, character.id, initial_food, created_at).await?;
        let quests = Self::insert_received(&mut tx, character.id, first_quests, created_at).await?;

        tx.commit().await.map_err(store_err)?;
        tracing::debug!(
            character_id = character.id,
            units = food.len(),
            quests = quests.len(),
            "Character stored"
        );
        Ok(CreatedCharacter {
            character,
            food,
            quests,
        })
    }

    async fn get_character(&self, character_id: DbId) -> Result<Character, CoreError> {
        let row = CharacterRepo::find_by_id(&self.pool, character_id)
            .await
            .map_err(store_err)?;
        into_character(row)?.ok_or_else(|| character_not_found(character_id))
    }

    async fn find_character_by_name(&self, name: &str) -> Result<Option<Character>, CoreError> {
        let row = CharacterRepo::find_by_name(&self.pool, name)
            .await
            .map_err(store_err)?;
        into_character(row)
    }

    async fn touch_last_played(&self, character_id: DbId, at: Timestamp) -> Result<(), CoreError> {
        let found = CharacterRepo::touch_last_played(&self.pool, character_id, at)
            .await
            .map_err(store_err)?;
        if !found {
            return Err(character_not_found(character_id));
        }
        Ok(())
    }

    async fn list_active_character_ids(&self, since: Timestamp) -> Result<Vec<DbId>, CoreError> {
        CharacterRepo::list_active_ids(&self.pool, since)
            .await
            .map_err(store_err)
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, CoreError> {
        let rows = CharacterRepo::leaderboard(&self.pool, limit.max(0))
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(LeaderboardEntry::from).collect())
    }

    async fn update_emotion(
        &self,
        character_id: DbId,
        emotion: &str,
    ) -> Result<Character, CoreError> {
        let row = CharacterRepo::update_emotion(&self.pool, character_id, emotion)
            .await
            .map_err(store_err)?;
        into_character(row)?.ok_or_else(|| character_not_found(character_id))
    }

    async fn update_stats(
        &self,
        character_id: DbId,
        update: &StatsUpdate,
    ) -> Result<Character, CoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let row = CharacterRepo::find_for_update(&mut *tx, character_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| character_not_found(character_id))?;
        let stats = Character::try_from(row)?.stats.merged(update);
        let row = CharacterRepo::update_stats(&mut *tx, character_id, &to_json(&stats)?)
            .await
            .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        row.try_into()
    }

    async fn advance_evolution_stage(
        &self,
        character_id: DbId,
        from_stage: i32,
    ) -> Result<Character, CoreError> {
        let row = CharacterRepo::advance_stage(&self.pool, character_id, from_stage)
            .await
            .map_err(store_err)?;
        if let Some(character) = into_character(row)? {
            return Ok(character);
        }
        // Nothing updated: either the character is gone or it already moved on.
        self.get_character(character_id).await?;
        Err(CoreError::Conflict(format!(
            "evolution stage of character {character_id} changed concurrently"
        )))
    }

    // -- food --------------------------------------------------------------

    async fn load_accrual(&self, character_id: DbId) -> Result<AccrualRecord, CoreError> {
        let last_generated_at = AccrualRepo::find_anchor(&self.pool, character_id)
            .await
            .map_err(store_err)?
            .ok_or(CoreError::NotFound {
                entity: "AccrualState",
                id: character_id,
            })?;
        let counts = FoodUnitRepo::count_unconsumed(&self.pool, character_id)
            .await
            .map_err(store_err)?;
        Ok(AccrualRecord {
            character_id,
            last_generated_at,
            counts,
        })
    }

    async fn commit_accrual(&self, commit: AccrualCommit) -> Result<Vec<ResourceUnit>, CoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let advanced = AccrualRepo::advance(
            &mut *tx,
            commit.character_id,
            commit.expected_last_generated_at,
            commit.last_generated_at,
        )
        .await
        .map_err(store_err)?;
        if !advanced {
            let exists = AccrualRepo::find_anchor(&mut *tx, commit.character_id)
                .await
                .map_err(store_err)?
                .is_some();
            return Err(if exists {
                CoreError::Conflict(format!(
                    "accrual state of character {} changed concurrently",
                    commit.character_id
                ))
            } else {
                CoreError::NotFound {
                    entity: "AccrualState",
                    id: commit.character_id,
                }
            });
        }

        let rows = FoodUnitRepo::create_batch(
            &mut *tx,
            commit.character_id,
            Tier::Low,
            &commit.unit_timestamps,
        )
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        into_units(rows)
    }

    async fn list_units(
        &self,
        character_id: DbId,
        include_consumed: bool,
    ) -> Result<Vec<ResourceUnit>, CoreError> {
        let rows = FoodUnitRepo::list_for_character(&self.pool, character_id, include_consumed)
            .await
            .map_err(store_err)?;
        into_units(rows)
    }

    async fn get_unit(&self, character_id: DbId, unit_id: DbId) -> Result<ResourceUnit, CoreError> {
        FoodUnitRepo::find(&self.pool, character_id, unit_id)
            .await
            .map_err(store_err)?
            .ok_or(CoreError::NotFound {
                entity: "ResourceUnit",
                id: unit_id,
            })?
            .try_into()
    }

    async fn apply_conversion(
        &self,
        character_id: DbId,
        plan: &ConversionPlan,
        at: Timestamp,
    ) -> Result<Vec<ResourceUnit>, CoreError> {
        if plan.promoted <= 0 {
            return Ok(Vec::new());
        }
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let retired = FoodUnitRepo::retire_low(&mut *tx, character_id, &plan.consumed_low_ids, at)
            .await
            .map_err(store_err)?;
        if retired != plan.consumed_low_ids.len() as u64 {
            return Err(CoreError::Conflict(format!(
                "{} of {} planned units are no longer convertible",
                plan.consumed_low_ids.len() as u64 - retired,
                plan.consumed_low_ids.len()
            )));
        }
        let stamps = vec![at; plan.promoted as usize];
        let rows = FoodUnitRepo::create_batch(&mut *tx, character_id, Tier::High, &stamps)
            .await
            .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        into_units(rows)
    }

    async fn commit_consumption(
        &self,
        commit: ConsumptionCommit,
    ) -> Result<ConsumptionApplied, CoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let consumed = FoodUnitRepo::mark_consumed(
            &mut *tx,
            commit.character_id,
            commit.unit_id,
            commit.consumed_at,
        )
        .await
        .map_err(store_err)?;
        let unit: ResourceUnit = match consumed {
            Some(row) => row.try_into()?,
            None => {
                let exists = FoodUnitRepo::find(&mut *tx, commit.character_id, commit.unit_id)
                    .await
                    .map_err(store_err)?
                    .is_some();
                return Err(if exists {
                    CoreError::AlreadyConsumed { id: commit.unit_id }
                } else {
                    CoreError::NotFound {
                        entity: "ResourceUnit",
                        id: commit.unit_id,
                    }
                });
            }
        };

        let progression = Self::progress(
            &mut tx,
            commit.character_id,
            commit.experience,
            commit.coins,
            commit.actions,
        )
        .await?;
        let boxes = BonusBoxRepo::create_batch(
            &mut *tx,
            commit.character_id,
            commit.containers as i32,
            commit.consumed_at,
        )
        .await
        .map_err(store_err)?;
        let containers = boxes
            .into_iter()
            .map(BonusContainer::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await.map_err(store_err)?;
        Ok(ConsumptionApplied {
            unit,
            progression,
            containers,
        })
    }

    // -- progression -------------------------------------------------------

    async fn apply_progression(
        &self,
        character_id: DbId,
        experience: i64,
        coins: i64,
    ) -> Result<ProgressionChange, CoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let change = Self::progress(&mut tx, character_id, experience, coins, 0).await?;
        tx.commit().await.map_err(store_err)?;
        Ok(change)
    }

    // -- containers --------------------------------------------------------

    async fn list_containers(&self, character_id: DbId) -> Result<Vec<BonusContainer>, CoreError> {
        BonusBoxRepo::list_for_character(&self.pool, character_id)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(BonusContainer::try_from)
            .collect()
    }

    async fn get_container(
        &self,
        character_id: DbId,
        container_id: DbId,
    ) -> Result<BonusContainer, CoreError> {
        BonusBoxRepo::find(&self.pool, character_id, container_id)
            .await
            .map_err(store_err)?
            .ok_or(CoreError::NotFound {
                entity: "BonusContainer",
                id: container_id,
            })?
            .try_into()
    }

    async fn commit_open_container(
        &self,
        commit: OpenContainerCommit,
    ) -> Result<OpenContainerApplied, CoreError> {
        let reward = to_json(&commit.reward)?;
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let opened = BonusBoxRepo::open(
            &mut *tx,
            commit.character_id,
            commit.container_id,
            commit.opened_at,
            &reward,
        )
        .await
        .map_err(store_err)?;
        let container: BonusContainer = match opened {
            Some(row) => row.try_into()?,
            None => {
                let exists = BonusBoxRepo::find(&mut *tx, commit.character_id, commit.container_id)
                    .await
                    .map_err(store_err)?
                    .is_some();
                return Err(if exists {
                    CoreError::AlreadyOpened {
                        id: commit.container_id,
                    }
                } else {
                    CoreError::NotFound {
                        entity: "BonusContainer",
                        id: commit.container_id,
                    }
                });
            }
        };

        let progression =
            Self::progress(&mut tx, commit.character_id, 0, commit.reward.coins(), 0).await?;
        let units = match commit.reward {
            BoxReward::Food { units } => {
                Self::mint_low(&mut tx, commit.character_id, units, commit.opened_at).await?
            }
            BoxReward::Coins { .. } => Vec::new(),
        };

        tx.commit().await.map_err(store_err)?;
        Ok(OpenContainerApplied {
            container,
            progression,
            units,
        })
    }

    // -- quests ------------------------------------------------------------

    async fn quest_definitions(&self) -> Result<Vec<QuestDefinition>, CoreError> {
        let rows = QuestDefinitionRepo::list_active(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(QuestDefinition::from).collect())
    }

    async fn insert_quests(
        &self,
        character_id: DbId,
        quests: &[NewQuest],
        created_at: Timestamp,
    ) -> Result<Vec<Quest>, CoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let quests = Self::insert_received(&mut tx, character_id, quests, created_at).await?;
        tx.commit().await.map_err(store_err)?;
        Ok(quests)
    }

    async fn list_quests(&self, character_id: DbId) -> Result<Vec<Quest>, CoreError> {
        let rows = QuestRepo::list_for_character(&self.pool, character_id)
            .await
            .map_err(store_err)?;
        into_quests(rows)
    }

    async fn get_quest(&self, character_id: DbId, quest_id: DbId) -> Result<Quest, CoreError> {
        QuestRepo::find(&self.pool, character_id, quest_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| quest_not_found(quest_id))?
            .try_into()
    }

    async fn quest_progress(
        &self,
        character_id: DbId,
        day_start: Timestamp,
    ) -> Result<QuestProgress, CoreError> {
        let (accepted, completed_today) =
            QuestRepo::progress_counts(&self.pool, character_id, day_start)
                .await
                .map_err(store_err)?;
        Ok(QuestProgress::new(accepted, completed_today))
    }

    async fn count_completed_quests(&self, character_id: DbId) -> Result<i64, CoreError> {
        QuestRepo::count_completed(&self.pool, character_id)
            .await
            .map_err(store_err)
    }

    async fn accept_quest(&self, commit: AcceptQuestCommit) -> Result<Quest, CoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // Serialises acceptances per character so the slot counts stay exact.
        CharacterRepo::find_for_update(&mut *tx, commit.character_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| character_not_found(commit.character_id))?;
        let quest = Self::locked_quest(&mut tx, commit.character_id, commit.quest_id).await?;
        state_machine::validate_transition(quest.status, QuestStatus::Accepted)?;

        let (accepted, completed_today) =
            QuestRepo::progress_counts(&mut *tx, commit.character_id, commit.day_start)
                .await
                .map_err(store_err)?;
        QuestProgress::new(accepted, completed_today).check_can_accept()?;

        let expires_at = commit.accepted_at + quest.duration();
        let row = QuestRepo::accept(&mut *tx, commit.quest_id, commit.accepted_at, expires_at)
            .await
            .map_err(store_err)?
            .ok_or_else(|| {
                CoreError::InvalidTransition(format!(
                    "quest {} changed concurrently",
                    commit.quest_id
                ))
            })?;

        tx.commit().await.map_err(store_err)?;
        row.try_into()
    }

    async fn reject_quest(&self, character_id: DbId, quest_id: DbId) -> Result<Quest, CoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let quest = Self::locked_quest(&mut tx, character_id, quest_id).await?;
        state_machine::validate_transition(quest.status, QuestStatus::Available)?;
        let row = QuestRepo::reject(&mut *tx, quest_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| {
                CoreError::InvalidTransition(format!("quest {quest_id} changed concurrently"))
            })?;

        tx.commit().await.map_err(store_err)?;
        row.try_into()
    }

    async fn complete_quest(
        &self,
        character_id: DbId,
        quest_id: DbId,
        completed_at: Timestamp,
    ) -> Result<QuestCompletion, CoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let quest = Self::locked_quest(&mut tx, character_id, quest_id).await?;
        state_machine::validate_transition(quest.status, QuestStatus::Completed)?;
        let row = QuestRepo::complete(&mut *tx, quest_id, completed_at)
            .await
            .map_err(store_err)?
            .ok_or_else(|| {
                CoreError::InvalidTransition(format!("quest {quest_id} changed concurrently"))
            })?;
        let quest: Quest = row.try_into()?;
        let units = Self::mint_low(
            &mut tx,
            character_id,
            i64::from(quest.reward_food_count),
            completed_at,
        )
        .await?;

        tx.commit().await.map_err(store_err)?;
        Ok(QuestCompletion { quest, units })
    }

    // -- achievements ------------------------------------------------------

    async fn list_achievements(&self, character_id: DbId) -> Result<Vec<Achievement>, CoreError> {
        AchievementRepo::list_for_character(&self.pool, character_id)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(Achievement::try_from)
            .collect()
    }

    async fn unlock_achievement(
        &self,
        character_id: DbId,
        key: &str,
        reward: AchievementReward,
        at: Timestamp,
    ) -> Result<Option<AchievementUnlock>, CoreError> {
        let reward_json = to_json(&reward)?;
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let Some(row) =
            AchievementRepo::create_if_absent(&mut *tx, character_id, key, &reward_json, at)
                .await
                .map_err(|e| owner_err(e, character_id))?
        else {
            return Ok(None);
        };
        let achievement = Achievement::try_from(row)?;
        let progression = Self::progress(&mut tx, character_id, reward.exp, reward.coins, 0).await?;

        tx.commit().await.map_err(store_err)?;
        Ok(Some(AchievementUnlock {
            achievement,
            progression,
        }))
    }

    // -- notifications -----------------------------------------------------

    async fn record_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, CoreError> {
        let row = EventRepo::insert(&self.pool, &CreateEvent::from(notification))
            .await
            .map_err(|e| owner_err(e, notification.character_id))?;
        Ok(row.into())
    }

    async fn list_notifications(
        &self,
        character_id: DbId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, CoreError> {
        let rows = EventRepo::list_for_character(&self.pool, character_id, unread_only)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_notification_read(
        &self,
        character_id: DbId,
        notification_id: DbId,
    ) -> Result<Notification, CoreError> {
        EventRepo::mark_read(&self.pool, character_id, notification_id)
            .await
            .map_err(store_err)?
            .map(Notification::from)
            .ok_or(CoreError::NotFound {
                entity: "Notification",
                id: notification_id,
            })
    }
}

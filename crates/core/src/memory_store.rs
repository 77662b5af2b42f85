//! In-process [`Store`] backed by a single mutex.
//!
//! Each trait method holds the lock for its whole body, which gives the same
//! all-or-nothing behaviour as a database transaction: validation happens
//! before the first write, so a failed call leaves the state untouched.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::Mutex;

use crate::achievement::{Achievement, AchievementReward};
use crate::character::{Character, LeaderboardEntry, NewCharacterRecord};
use crate::container::{BonusContainer, BoxReward};
use crate::conversion::ConversionPlan;
use crate::error::CoreError;
use crate::leveling::{level_for, ProgressionChange};
use crate::notification::{NewNotification, Notification};
use crate::quest::{state_machine, NewQuest, Quest, QuestDefinition, QuestProgress, QuestStatus};
use crate::resource::{ResourceUnit, Tier, TierCounts};
use crate::stats::{CharacterStats, StatsUpdate};
use crate::store::{
    AcceptQuestCommit, AccrualCommit, AccrualRecord, AchievementUnlock, ConsumptionApplied,
    ConsumptionCommit, CreatedCharacter, OpenContainerApplied, OpenContainerCommit,
    QuestCompletion, Store,
};
use crate::types::{DbId, Timestamp};

#[derive(Debug, Default)]
struct Inner {
    next_id: DbId,
    characters: BTreeMap<DbId, Character>,
    accrual_anchors: BTreeMap<DbId, Timestamp>,
    units: BTreeMap<DbId, ResourceUnit>,
    containers: BTreeMap<DbId, BonusContainer>,
    quests: BTreeMap<DbId, Quest>,
    definitions: Vec<QuestDefinition>,
    achievements: Vec<Achievement>,
    notifications: BTreeMap<DbId, Notification>,
}

impl Inner {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn character(&self, id: DbId) -> Result<&Character, CoreError> {
        self.characters.get(&id).ok_or(CoreError::NotFound {
            entity: "Character",
            id,
        })
    }

    fn character_mut(&mut self, id: DbId) -> Result<&mut Character, CoreError> {
        self.characters.get_mut(&id).ok_or(CoreError::NotFound {
            entity: "Character",
            id,
        })
    }

    fn insert_quests(
        &mut self,
        character_id: DbId,
        quests: &[NewQuest],
        created_at: Timestamp,
    ) -> Vec<Quest> {
        quests
            .iter()
            .map(|q| {
                let quest = Quest {
                    id: self.next_id(),
                    character_id,
                    title: q.title.clone(),
                    description: q.description.clone(),
                    status: QuestStatus::Received,
                    duration_hours: q.duration_hours,
                    reward_food_count: q.reward_food_count,
                    accepted_at: None,
                    expires_at: None,
                    completed_at: None,
                    created_at,
                };
                self.quests.insert(quest.id, quest.clone());
                quest
            })
            .collect()
    }

    fn insert_units(
        &mut self,
        character_id: DbId,
        tier: Tier,
        timestamps: impl IntoIterator<Item = Timestamp>,
    ) -> Vec<ResourceUnit> {
        timestamps
            .into_iter()
            .map(|created_at| {
                let unit = ResourceUnit {
                    id: self.next_id(),
                    character_id,
                    tier,
                    created_at,
                    consumed: false,
                    consumed_at: None,
                };
                self.units.insert(unit.id, unit.clone());
                unit
            })
            .collect()
    }

    fn owned_unit(&self, character_id: DbId, unit_id: DbId) -> Result<&ResourceUnit, CoreError> {
        self.units
            .get(&unit_id)
            .filter(|u| u.character_id == character_id)
            .ok_or(CoreError::NotFound {
                entity: "ResourceUnit",
                id: unit_id,
            })
    }

    fn owned_quest(&self, character_id: DbId, quest_id: DbId) -> Result<&Quest, CoreError> {
        self.quests
            .get(&quest_id)
            .filter(|q| q.character_id == character_id)
            .ok_or(CoreError::NotFound {
                entity: "Quest",
                id: quest_id,
            })
    }

    fn counts(&self, character_id: DbId) -> TierCounts {
        let units: Vec<ResourceUnit> = self
            .units
            .values()
            .filter(|u| u.character_id == character_id)
            .cloned()
            .collect();
        TierCounts::of(&units)
    }

    fn apply_progression(
        &mut self,
        character_id: DbId,
        experience: i64,
        coins: i64,
    ) -> Result<ProgressionChange, CoreError> {
        let character = self.character_mut(character_id)?;
        let before = character.progression();
        let after = before.gain(experience, coins);
        character.experience = after.experience;
        character.level = level_for(after.experience);
        character.coins = after.coins;
        Ok(ProgressionChange { before, after })
    }

    fn quest_progress(&self, character_id: DbId, day_start: Timestamp) -> QuestProgress {
        let owned = self.quests.values().filter(|q| q.character_id == character_id);
        let accepted = owned
            .clone()
            .filter(|q| q.status == QuestStatus::Accepted)
            .count() as i64;
        let completed_today = owned
            .filter(|q| q.status == QuestStatus::Completed)
            .filter(|q| q.completed_at.is_some_and(|at| at >= day_start))
            .count() as i64;
        QuestProgress::new(accepted, completed_today)
    }
}

/// Volatile [`Store`] for tests and local runs without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that serves `definitions` instead of the built-in quest set.
    pub fn with_quest_definitions(definitions: Vec<QuestDefinition>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                definitions,
                ..Inner::default()
            }),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_character(
        &self,
        record: NewCharacterRecord,
        initial_food: i64,
        first_quests: &[NewQuest],
    ) -> Result<CreatedCharacter, CoreError> {
        let mut inner = self.inner.lock().await;
        if inner.characters.values().any(|c| c.name == record.name) {
            return Err(CoreError::Conflict(format!(
                "Character name '{}' is already taken",
                record.name
            )));
        }

        let character = Character {
            id: inner.next_id(),
            name: record.name,
            password_hash: record.password_hash,
            species: record.species,
            job: record.job,
            emotion: record.emotion,
            experience: 0,
            level: 1,
            coins: record.coins,
            food_eaten: 0,
            stats: CharacterStats::default(),
            evolution_stage: 0,
            created_at: record.created_at,
            last_played_at: record.created_at,
        };
        inner.characters.insert(character.id, character.clone());
        inner.accrual_anchors.insert(character.id, record.created_at);
        let food = inner.insert_units(
            character.id,
            Tier::Low,
            (0..initial_food.max(0)).map(|_| record.created_at),
        );
        let quests = inner.insert_quests(character.id, first_quests, record.created_at);
        Ok(CreatedCharacter {
            character,
            food,
            quests,
        })
    }

    async fn get_character(&self, character_id: DbId) -> Result<Character, CoreError> {
        self.inner.lock().await.character(character_id).cloned()
    }

    async fn find_character_by_name(&self, name: &str) -> Result<Option<Character>, CoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.characters.values().find(|c| c.name == name).cloned())
    }

    async fn touch_last_played(&self, character_id: DbId, at: Timestamp) -> Result<(), CoreError> {
        self.inner
            .lock()
            .await
            .character_mut(character_id)?
            .last_played_at = at;
        Ok(())
    }

    async fn list_active_character_ids(&self, since: Timestamp) -> Result<Vec<DbId>, CoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .characters
            .values()
            .filter(|c| c.last_played_at >= since)
            .map(|c| c.id)
            .collect())
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, CoreError> {
        let inner = self.inner.lock().await;
        let mut ranked: Vec<&Character> = inner.characters.values().collect();
        ranked.sort_by(|a, b| {
            b.experience
                .cmp(&a.experience)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(ranked
            .into_iter()
            .take(limit.max(0) as usize)
            .enumerate()
            .map(|(i, c)| LeaderboardEntry {
                rank: i as i64 + 1,
                character_id: c.id,
                name: c.name.clone(),
                species: c.species.clone(),
                level: c.level,
                experience: c.experience,
            })
            .collect())
    }

    async fn update_emotion(
        &self,
        character_id: DbId,
        emotion: &str,
    ) -> Result<Character, CoreError> {
        let mut inner = self.inner.lock().await;
        let character = inner.character_mut(character_id)?;
        character.emotion = emotion.to_string();
        Ok(character.clone())
    }

    async fn update_stats(
        &self,
        character_id: DbId,
        update: &StatsUpdate,
    ) -> Result<Character, CoreError> {
        let mut inner = self.inner.lock().await;
        let character = inner.character_mut(character_id)?;
        character.stats = character.stats.merged(update);
        Ok(character.clone())
    }

    async fn advance_evolution_stage(
        &self,
        character_id: DbId,
        from_stage: i32,
    ) -> Result<Character, CoreError> {
        let mut inner = self.inner.lock().await;
        let character = inner.character_mut(character_id)?;
        if character.evolution_stage != from_stage {
            return Err(CoreError::Conflict(format!(
                "character {character_id} already left evolution stage {from_stage}"
            )));
        }
        character.evolution_stage = from_stage + 1;
        Ok(character.clone())
    }

    async fn load_accrual(&self, character_id: DbId) -> Result<AccrualRecord, CoreError> {
        let inner = self.inner.lock().await;
        let last_generated_at = *inner
            .accrual_anchors
            .get(&character_id)
            .ok_or(CoreError::NotFound {
                entity: "AccrualState",
                id: character_id,
            })?;
        Ok(AccrualRecord {
            character_id,
            last_generated_at,
            counts: inner.counts(character_id),
        })
    }

    async fn commit_accrual(&self, commit: AccrualCommit) -> Result<Vec<ResourceUnit>, CoreError> {
        let mut inner = self.inner.lock().await;
        let anchor = inner
            .accrual_anchors
            .get_mut(&commit.character_id)
            .ok_or(CoreError::NotFound {
                entity: "AccrualState",
                id: commit.character_id,
            })?;
        if *anchor != commit.expected_last_generated_at {
            return Err(CoreError::Conflict(format!(
                "accrual state of character {} changed concurrently",
                commit.character_id
            )));
        }
        *anchor = commit.last_generated_at;
        Ok(inner.insert_units(commit.character_id, Tier::Low, commit.unit_timestamps))
    }

    async fn list_units(
        &self,
        character_id: DbId,
        include_consumed: bool,
    ) -> Result<Vec<ResourceUnit>, CoreError> {
        let inner = self.inner.lock().await;
        let mut units: Vec<ResourceUnit> = inner
            .units
            .values()
            .filter(|u| u.character_id == character_id)
            .filter(|u| include_consumed || !u.consumed)
            .cloned()
            .collect();
        units.sort_by_key(|u| (u.created_at, u.id));
        Ok(units)
    }

    async fn get_unit(&self, character_id: DbId, unit_id: DbId) -> Result<ResourceUnit, CoreError> {
        self.inner
            .lock()
            .await
            .owned_unit(character_id, unit_id)
            .cloned()
    }

    async fn apply_conversion(
        &self,
        character_id: DbId,
        plan: &ConversionPlan,
        at: Timestamp,
    ) -> Result<Vec<ResourceUnit>, CoreError> {
        let mut inner = self.inner.lock().await;
        for id in &plan.consumed_low_ids {
            let unit = inner.owned_unit(character_id, *id)?;
            if unit.consumed || unit.tier != Tier::Low {
                return Err(CoreError::Conflict(format!(
                    "resource unit {id} is no longer convertible"
                )));
            }
        }
        for id in &plan.consumed_low_ids {
            if let Some(unit) = inner.units.get_mut(id) {
                unit.consumed = true;
                unit.consumed_at = Some(at);
            }
        }
        Ok(inner.insert_units(
            character_id,
            Tier::High,
            (0..plan.promoted).map(|_| at),
        ))
    }

    async fn commit_consumption(
        &self,
        commit: ConsumptionCommit,
    ) -> Result<ConsumptionApplied, CoreError> {
        let mut inner = self.inner.lock().await;
        inner.character(commit.character_id)?;
        if inner.owned_unit(commit.character_id, commit.unit_id)?.consumed {
            return Err(CoreError::AlreadyConsumed { id: commit.unit_id });
        }

        let unit = match inner.units.get_mut(&commit.unit_id) {
            Some(unit) => {
                unit.consumed = true;
                unit.consumed_at = Some(commit.consumed_at);
                unit.clone()
            }
            None => {
                return Err(CoreError::NotFound {
                    entity: "ResourceUnit",
                    id: commit.unit_id,
                })
            }
        };
        let progression =
            inner.apply_progression(commit.character_id, commit.experience, commit.coins)?;
        if let Some(character) = inner.characters.get_mut(&commit.character_id) {
            character.food_eaten += commit.actions;
        }
        let containers = (0..commit.containers)
            .map(|_| {
                let container = BonusContainer {
                    id: inner.next_id(),
                    character_id: commit.character_id,
                    created_at: commit.consumed_at,
                    opened: false,
                    opened_at: None,
                    reward: None,
                };
                inner.containers.insert(container.id, container.clone());
                container
            })
            .collect();

        Ok(ConsumptionApplied {
            unit,
            progression,
            containers,
        })
    }

    async fn apply_progression(
        &self,
        character_id: DbId,
        experience: i64,
        coins: i64,
    ) -> Result<ProgressionChange, CoreError> {
        self.inner
            .lock()
            .await
            .apply_progression(character_id, experience, coins)
    }

    async fn list_containers(&self, character_id: DbId) -> Result<Vec<BonusContainer>, CoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .containers
            .values()
            .filter(|c| c.character_id == character_id)
            .cloned()
            .collect())
    }

    async fn get_container(
        &self,
        character_id: DbId,
        container_id: DbId,
    ) -> Result<BonusContainer, CoreError> {
        let inner = self.inner.lock().await;
        inner
            .containers
            .get(&container_id)
            .filter(|c| c.character_id == character_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "BonusContainer",
                id: container_id,
            })
    }

    async fn commit_open_container(
        &self,
        commit: OpenContainerCommit,
    ) -> Result<OpenContainerApplied, CoreError> {
        let mut inner = self.inner.lock().await;
        let container = inner
            .containers
            .get_mut(&commit.container_id)
            .filter(|c| c.character_id == commit.character_id)
            .ok_or(CoreError::NotFound {
                entity: "BonusContainer",
                id: commit.container_id,
            })?;
        if container.opened {
            return Err(CoreError::AlreadyOpened {
                id: commit.container_id,
            });
        }
        container.opened = true;
        container.opened_at = Some(commit.opened_at);
        container.reward = Some(commit.reward);
        let container = container.clone();

        let progression = inner.apply_progression(commit.character_id, 0, commit.reward.coins())?;
        let units = match commit.reward {
            BoxReward::Food { units } => inner.insert_units(
                commit.character_id,
                Tier::Low,
                (0..units).map(|_| commit.opened_at),
            ),
            BoxReward::Coins { .. } => Vec::new(),
        };

        Ok(OpenContainerApplied {
            container,
            progression,
            units,
        })
    }

    async fn quest_definitions(&self) -> Result<Vec<QuestDefinition>, CoreError> {
        Ok(self.inner.lock().await.definitions.clone())
    }

    async fn insert_quests(
        &self,
        character_id: DbId,
        quests: &[NewQuest],
        created_at: Timestamp,
    ) -> Result<Vec<Quest>, CoreError> {
        let mut inner = self.inner.lock().await;
        inner.character(character_id)?;
        Ok(inner.insert_quests(character_id, quests, created_at))
    }

    async fn list_quests(&self, character_id: DbId) -> Result<Vec<Quest>, CoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .quests
            .values()
            .filter(|q| q.character_id == character_id)
            .cloned()
            .collect())
    }

    async fn get_quest(&self, character_id: DbId, quest_id: DbId) -> Result<Quest, CoreError> {
        self.inner
            .lock()
            .await
            .owned_quest(character_id, quest_id)
            .cloned()
    }

    async fn quest_progress(
        &self,
        character_id: DbId,
        day_start: Timestamp,
    ) -> Result<QuestProgress, CoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .quest_progress(character_id, day_start))
    }

    async fn count_completed_quests(&self, character_id: DbId) -> Result<i64, CoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .quests
            .values()
            .filter(|q| q.character_id == character_id && q.status == QuestStatus::Completed)
            .count() as i64)
    }

    async fn accept_quest(&self, commit: AcceptQuestCommit) -> Result<Quest, CoreError> {
        let mut inner = self.inner.lock().await;
        let status = inner.owned_quest(commit.character_id, commit.quest_id)?.status;
        state_machine::validate_transition(status, QuestStatus::Accepted)?;
        inner
            .quest_progress(commit.character_id, commit.day_start)
            .check_can_accept()?;

        let quest = inner
            .quests
            .get_mut(&commit.quest_id)
            .ok_or(CoreError::NotFound {
                entity: "Quest",
                id: commit.quest_id,
            })?;
        quest.status = QuestStatus::Accepted;
        quest.accepted_at = Some(commit.accepted_at);
        quest.expires_at =
            Some(commit.accepted_at + Duration::hours(i64::from(quest.duration_hours)));
        Ok(quest.clone())
    }

    async fn reject_quest(&self, character_id: DbId, quest_id: DbId) -> Result<Quest, CoreError> {
        let mut inner = self.inner.lock().await;
        let status = inner.owned_quest(character_id, quest_id)?.status;
        state_machine::validate_transition(status, QuestStatus::Available)?;
        let quest = inner.quests.get_mut(&quest_id).ok_or(CoreError::NotFound {
            entity: "Quest",
            id: quest_id,
        })?;
        quest.status = QuestStatus::Available;
        Ok(quest.clone())
    }

    async fn complete_quest(
        &self,
        character_id: DbId,
        quest_id: DbId,
        completed_at: Timestamp,
    ) -> Result<QuestCompletion, CoreError> {
        let mut inner = self.inner.lock().await;
        let status = inner.owned_quest(character_id, quest_id)?.status;
        state_machine::validate_transition(status, QuestStatus::Completed)?;
        let quest = inner.quests.get_mut(&quest_id).ok_or(CoreError::NotFound {
            entity: "Quest",
            id: quest_id,
        })?;
        quest.status = QuestStatus::Completed;
        quest.completed_at = Some(completed_at);
        let quest = quest.clone();

        let units = inner.insert_units(
            character_id,
            Tier::Low,
            (0..quest.reward_food_count.max(0)).map(|_| completed_at),
        );
        Ok(QuestCompletion { quest, units })
    }

    async fn list_achievements(&self, character_id: DbId) -> Result<Vec<Achievement>, CoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .achievements
            .iter()
            .filter(|a| a.character_id == character_id)
            .cloned()
            .collect())
    }

    async fn unlock_achievement(
        &self,
        character_id: DbId,
        key: &str,
        reward: AchievementReward,
        at: Timestamp,
    ) -> Result<Option<AchievementUnlock>, CoreError> {
        let mut inner = self.inner.lock().await;
        inner.character(character_id)?;
        if inner
            .achievements
            .iter()
            .any(|a| a.character_id == character_id && a.key == key)
        {
            return Ok(None);
        }

        let achievement = Achievement {
            id: inner.next_id(),
            character_id,
            key: key.to_string(),
            achieved_at: at,
            reward,
        };
        inner.achievements.push(achievement.clone());
        let progression = inner.apply_progression(character_id, reward.exp, reward.coins)?;
        Ok(Some(AchievementUnlock {
            achievement,
            progression,
        }))
    }

    async fn record_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, CoreError> {
        let mut inner = self.inner.lock().await;
        inner.character(notification.character_id)?;
        let stored = Notification {
            id: inner.next_id(),
            character_id: notification.character_id,
            kind: notification.kind.clone(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            metadata: notification.metadata.clone(),
            is_read: false,
            created_at: notification.created_at,
        };
        inner.notifications.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_notifications(
        &self,
        character_id: DbId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, CoreError> {
        let inner = self.inner.lock().await;
        let mut notes: Vec<Notification> = inner
            .notifications
            .values()
            .filter(|n| n.character_id == character_id)
            .filter(|n| !unread_only || !n.is_read)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notes)
    }

    async fn mark_notification_read(
        &self,
        character_id: DbId,
        notification_id: DbId,
    ) -> Result<Notification, CoreError> {
        let mut inner = self.inner.lock().await;
        let note = inner
            .notifications
            .get_mut(&notification_id)
            .filter(|n| n.character_id == character_id)
            .ok_or(CoreError::NotFound {
                entity: "Notification",
                id: notification_id,
            })?;
        note.is_read = true;
        Ok(note.clone())
    }
}

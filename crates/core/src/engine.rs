//! The progression engine.
//!
//! [`Engine`] combines the pure rules in this crate with the injected
//! [`Store`], [`Clock`], [`RandomSource`] and [`NotificationSink`]. Every
//! public operation reads the clock once, computes the outcome with the pure
//! rules, commits it through one atomic store call and only then publishes
//! events. Once that commit succeeds the operation succeeds: follow-up work
//! such as tier conversion is logged and skipped when it fails.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use crate::accrual::{accrue, AccrualState};
use crate::achievement::{
    eligible, Achievement, AchievementSnapshot, AchievementStats, DEFINITIONS,
};
use crate::character::{
    Character, EmotionUpdate, LeaderboardEntry, NewCharacter, NewCharacterRecord,
    DEFAULT_EMOTION, STARTING_COINS,
};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::container::{roll_box_reward, BonusContainer, BoxReward};
use crate::conversion::plan_conversion;
use crate::error::CoreError;
use crate::events::{self as ev, GameEvent, NotificationSink};
use crate::evolution::{self, EvolutionStage, EvolutionStatus};
use crate::leveling::{LevelChange, ProgressionChange, ProgressionState};
use crate::notification::Notification;
use crate::quest::{
    default_definitions, generate_batch, start_of_day, state_machine, Quest, QuestDefinition,
    QuestProgress, QuestStatus, QUEST_BATCH_SIZE,
};
use crate::random::RandomSource;
use crate::resource::{ResourceUnit, Tier, TierCounts};
use crate::rewards::resolve_consumption;
use crate::stats::StatsUpdate;
use crate::store::{
    AcceptQuestCommit, AccrualCommit, ConsumptionCommit, CreatedCharacter, OpenContainerCommit,
    Store,
};
use crate::types::{DbId, Timestamp};

/// Largest page served by [`Engine::leaderboard`].
pub const MAX_LEADERBOARD_LIMIT: i64 = 100;

/// Page size when the caller does not ask for one.
pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionOutcome {
    pub promoted: i64,
    pub retired_low_ids: Vec<DbId>,
    pub high_units: Vec<ResourceUnit>,
}

/// Current food stock and accrual timing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inventory {
    pub units: Vec<ResourceUnit>,
    pub counts: TierCounts,
    pub stock: i64,
    pub cap: i64,
    pub last_generated_at: Timestamp,
    /// `None` while storage is full.
    pub next_unit_at: Option<Timestamp>,
    pub seconds_until_next_unit: Option<i64>,
    pub storage_usage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccrualReport {
    pub units_created: i64,
    pub units: Vec<ResourceUnit>,
    pub conversion: ConversionOutcome,
    pub inventory: Inventory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumptionResult {
    pub unit_id: DbId,
    pub tier: Tier,
    pub actions_resolved: u32,
    pub exp_gained: i64,
    pub currency_gained: Option<i64>,
    pub bonus_container_granted: bool,
    pub containers_granted: Vec<BonusContainer>,
    pub progression: ProgressionState,
    pub level_change: LevelChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenedBox {
    pub container: BonusContainer,
    pub reward: BoxReward,
    pub units: Vec<ResourceUnit>,
    pub progression: ProgressionState,
    pub conversion: ConversionOutcome,
}

/// A character's quests grouped by status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestBoard {
    pub received: Vec<Quest>,
    pub available: Vec<Quest>,
    pub accepted: Vec<Quest>,
    pub completed: Vec<Quest>,
    pub progress: QuestProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedQuest {
    pub quest: Quest,
    pub units: Vec<ResourceUnit>,
    pub conversion: ConversionOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollReport {
    pub accrual: AccrualReport,
    pub completed_quests: Vec<CompletedQuest>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub polled: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AchievementOverview {
    pub achievements: Vec<Achievement>,
    pub stats: AchievementStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evolved {
    pub character: Character,
    pub stage: EvolutionStage,
    /// Abilities unlocked by this stage.
    pub unlocked: Vec<&'static str>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    sink: Arc<dyn NotificationSink>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
        sink: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            clock,
            rng,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn notify(
        &self,
        character_id: DbId,
        action_type: &str,
        metadata: serde_json::Value,
        at: Timestamp,
    ) {
        self.sink.notify(
            GameEvent::new(character_id, action_type)
                .with_metadata(metadata)
                .at(at),
        );
    }

    fn notify_progression(&self, character_id: DbId, change: &ProgressionChange, at: Timestamp) {
        if change.leveled_up() {
            let level = change.level_change();
            tracing::info!(
                character_id,
                old_level = level.old_level,
                new_level = level.new_level,
                "Character leveled up"
            );
            self.notify(
                character_id,
                ev::LEVEL_UP,
                serde_json::json!({
                    "old_level": level.old_level,
                    "new_level": level.new_level,
                    "experience": change.after.experience,
                }),
                at,
            );
        }
    }

    // -- characters --------------------------------------------------------

    /// Create a character with its starting food, accrual clock and first
    /// quest batch in one store call. `password_hash` is stored as given.
    pub async fn create_character(
        &self,
        input: NewCharacter,
        password_hash: String,
    ) -> Result<CreatedCharacter, CoreError> {
        let input = input.checked()?;
        let now = self.clock.now();
        let record = NewCharacterRecord {
            name: input.name,
            password_hash,
            species: input.species,
            job: input.job,
            emotion: DEFAULT_EMOTION.to_string(),
            coins: STARTING_COINS,
            created_at: now,
        };

        let definitions = self.quest_definitions().await?;
        let first_quests = generate_batch(&definitions, QUEST_BATCH_SIZE, &*self.rng)?;

        let created = self
            .store
            .create_character(record, self.config.initial_food, &first_quests)
            .await?;
        let character = &created.character;

        tracing::info!(
            character_id = character.id,
            name = %character.name,
            food = created.food.len(),
            quests = created.quests.len(),
            "Character created"
        );
        self.notify(
            character.id,
            ev::CHARACTER_CREATED,
            serde_json::json!({
                "name": character.name,
                "species": character.species,
                "job": character.job,
            }),
            now,
        );
        self.notify(
            character.id,
            ev::QUESTS_GENERATED,
            serde_json::json!({ "count": created.quests.len() }),
            now,
        );

        Ok(created)
    }

    pub async fn character(&self, character_id: DbId) -> Result<Character, CoreError> {
        self.store.get_character(character_id).await
    }

    pub async fn find_character_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Character>, CoreError> {
        self.store.find_character_by_name(name.trim()).await
    }

    /// Mark the character as played now and catch up on everything that
    /// happened while away.
    pub async fn record_login(&self, character_id: DbId) -> Result<PollReport, CoreError> {
        self.store
            .touch_last_played(character_id, self.clock.now())
            .await?;
        self.poll(character_id).await
    }

    pub async fn leaderboard(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<LeaderboardEntry>, CoreError> {
        let limit = limit
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
            .clamp(1, MAX_LEADERBOARD_LIMIT);
        self.store.leaderboard(limit).await
    }

    pub async fn update_emotion(
        &self,
        character_id: DbId,
        input: EmotionUpdate,
    ) -> Result<Character, CoreError> {
        let input = input.checked()?;
        let now = self.clock.now();
        let character = self
            .store
            .update_emotion(character_id, &input.emotion)
            .await?;

        tracing::info!(character_id, emotion = %character.emotion, "Emotion changed");
        self.notify(
            character_id,
            ev::EMOTION_CHANGED,
            serde_json::json!({ "emotion": character.emotion }),
            now,
        );
        Ok(character)
    }

    /// Merge a partial stats update. An empty update is rejected.
    pub async fn update_stats(
        &self,
        character_id: DbId,
        update: StatsUpdate,
    ) -> Result<Character, CoreError> {
        let update = update.checked()?;
        if update == StatsUpdate::default() {
            return Err(CoreError::Validation(
                "Stats update must set at least one stat".into(),
            ));
        }
        let now = self.clock.now();
        let character = self.store.update_stats(character_id, &update).await?;

        tracing::info!(character_id, "Stats updated");
        self.notify(
            character_id,
            ev::STATS_UPDATED,
            serde_json::json!({ "stats": character.stats }),
            now,
        );
        Ok(character)
    }

    // -- evolution ---------------------------------------------------------

    pub async fn evolution(&self, character_id: DbId) -> Result<EvolutionStatus, CoreError> {
        let character = self.store.get_character(character_id).await?;
        Ok(evolution::status(&character))
    }

    /// Advance one evolution stage when level and stats allow it.
    pub async fn evolve(&self, character_id: DbId) -> Result<Evolved, CoreError> {
        let now = self.clock.now();
        let character = self.store.get_character(character_id).await?;
        let status = evolution::status(&character);
        let Some(next) = status.next else {
            return Err(CoreError::InvalidTransition(format!(
                "character {character_id} is at its final evolution stage"
            )));
        };
        if !status.can_evolve {
            return Err(CoreError::InvalidTransition(format!(
                "evolving into {} requires {}",
                next.name,
                status.missing.join(", ")
            )));
        }

        let character = self
            .store
            .advance_evolution_stage(character_id, character.evolution_stage)
            .await?;

        tracing::info!(character_id, stage = next.stage, name = next.name, "Character evolved");
        self.notify(
            character_id,
            ev::CHARACTER_EVOLVED,
            serde_json::json!({
                "stage": next.stage,
                "name": next.name,
                "unlocks": next.unlocks,
            }),
            now,
        );
        Ok(Evolved {
            character,
            stage: next,
            unlocked: next.unlocks.to_vec(),
        })
    }

    // -- notifications -----------------------------------------------------

    pub async fn notifications(
        &self,
        character_id: DbId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, CoreError> {
        self.store.get_character(character_id).await?;
        self.store
            .list_notifications(character_id, unread_only)
            .await
    }

    pub async fn mark_notification_read(
        &self,
        character_id: DbId,
        notification_id: DbId,
    ) -> Result<Notification, CoreError> {
        self.store
            .mark_notification_read(character_id, notification_id)
            .await
    }

    // -- food --------------------------------------------------------------

    async fn accrual_state(&self, character_id: DbId) -> Result<AccrualState, CoreError> {
        let record = self.store.load_accrual(character_id).await?;
        Ok(self
            .config
            .accrual_state(record.last_generated_at, record.counts))
    }

    /// Create whatever food is due and convert. Nothing due is not an error.
    pub async fn accrue(&self, character_id: DbId) -> Result<AccrualReport, CoreError> {
        self.run_accrual(character_id, false).await
    }

    /// Like [`accrue`](Self::accrue), but fails with `LimitReached` when
    /// storage is full and `TooEarly` when no unit is due yet.
    pub async fn generate_food(&self, character_id: DbId) -> Result<AccrualReport, CoreError> {
        self.run_accrual(character_id, true).await
    }

    async fn run_accrual(
        &self,
        character_id: DbId,
        strict: bool,
    ) -> Result<AccrualReport, CoreError> {
        let now = self.clock.now();
        let state = self.accrual_state(character_id).await?;
        let outcome = accrue(&state, now)?;

        if strict && outcome.units_created == 0 {
            return Err(match state.time_until_next_unit(now) {
                None => CoreError::LimitReached(format!(
                    "food storage is full ({}/{})",
                    state.occupancy(),
                    state.cap
                )),
                Some(wait) => CoreError::TooEarly {
                    remaining_secs: ceil_secs(wait),
                },
            });
        }

        let held = self.store.list_units(character_id, false).await?;
        let mut anchor = state.last_generated_at;
        let mut raced = false;
        let units = if outcome.units_created > 0 {
            let commit = AccrualCommit {
                character_id,
                expected_last_generated_at: state.last_generated_at,
                last_generated_at: outcome.state.last_generated_at,
                unit_timestamps: outcome.unit_timestamps.clone(),
            };
            match self.store.commit_accrual(commit).await {
                Ok(units) => {
                    anchor = outcome.state.last_generated_at;
                    units
                }
                Err(CoreError::Conflict(msg)) if !strict => {
                    tracing::debug!(
                        character_id,
                        reason = %msg,
                        "Accrual already applied concurrently"
                    );
                    raced = true;
                    Vec::new()
                }
                Err(e) => return Err(e),
            }
        } else {
            Vec::new()
        };

        if !units.is_empty() {
            tracing::info!(
                character_id,
                units = units.len(),
                last_generated_at = %outcome.state.last_generated_at,
                "Food accrued"
            );
            self.notify(
                character_id,
                ev::FOOD_ACCRUED,
                serde_json::json!({
                    "units": units.len(),
                    "last_generated_at": outcome.state.last_generated_at,
                }),
                now,
            );
        }

        let conversion = self.convert_after_commit(character_id).await;
        let inventory = if raced {
            self.inventory(character_id).await?
        } else {
            self.settled_inventory(anchor, held, &units, &conversion, now)
        };

        Ok(AccrualReport {
            units_created: units.len() as i64,
            units,
            conversion,
            inventory,
        })
    }

    /// Fold every ten unconsumed low-tier units into one high-tier unit.
    pub async fn convert(&self, character_id: DbId) -> Result<ConversionOutcome, CoreError> {
        // A concurrent consumption can invalidate the plan; re-plan once.
        let mut attempts = 0;
        loop {
            attempts += 1;
            let now = self.clock.now();
            let units = self.store.list_units(character_id, false).await?;
            let plan = plan_conversion(&units);
            if plan.is_empty() {
                return Ok(ConversionOutcome::default());
            }

            match self.store.apply_conversion(character_id, &plan, now).await {
                Ok(high_units) => {
                    tracing::info!(character_id, promoted = plan.promoted, "Food converted");
                    self.notify(
                        character_id,
                        ev::FOOD_CONVERTED,
                        serde_json::json!({
                            "promoted": plan.promoted,
                            "retired": plan.consumed_low_ids.len(),
                        }),
                        now,
                    );
                    return Ok(ConversionOutcome {
                        promoted: plan.promoted,
                        retired_low_ids: plan.consumed_low_ids,
                        high_units,
                    });
                }
                Err(CoreError::Conflict(msg)) if attempts < 2 => {
                    tracing::debug!(
                        character_id,
                        reason = %msg,
                        "Conversion plan went stale, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// [`convert`](Self::convert) following a committed change. Failure is
    /// logged and reported as no conversion; the next accrual picks it up.
    async fn convert_after_commit(&self, character_id: DbId) -> ConversionOutcome {
        match self.convert(character_id).await {
            Ok(conversion) => conversion,
            Err(e) => {
                tracing::warn!(
                    character_id,
                    error = %e,
                    "Conversion after commit failed, leaving units unconverted"
                );
                ConversionOutcome::default()
            }
        }
    }

    pub async fn inventory(&self, character_id: DbId) -> Result<Inventory, CoreError> {
        let now = self.clock.now();
        let state = self.accrual_state(character_id).await?;
        let units = self.store.list_units(character_id, false).await?;
        Ok(inventory_of(&state, units, now))
    }

    /// Inventory at the end of an accrual: the units `held` before it plus the
    /// `created` ones, with the conversion applied. Reads nothing.
    fn settled_inventory(
        &self,
        last_generated_at: Timestamp,
        mut units: Vec<ResourceUnit>,
        created: &[ResourceUnit],
        conversion: &ConversionOutcome,
        now: Timestamp,
    ) -> Inventory {
        units.extend_from_slice(created);
        units.retain(|u| !conversion.retired_low_ids.contains(&u.id));
        units.extend_from_slice(&conversion.high_units);
        units.sort_by_key(|u| (u.created_at, u.id));
        let state = self
            .config
            .accrual_state(last_generated_at, TierCounts::of(&units));
        inventory_of(&state, units, now)
    }

    /// Eat one unit: experience, coins and bonus containers for every
    /// feeding action it carries.
    pub async fn consume(
        &self,
        character_id: DbId,
        unit_id: DbId,
    ) -> Result<ConsumptionResult, CoreError> {
        let now = self.clock.now();
        let unit = self.store.get_unit(character_id, unit_id).await?;
        if unit.consumed {
            return Err(CoreError::AlreadyConsumed { id: unit_id });
        }

        let roll = resolve_consumption(unit.tier, self.config.currency_policy, &*self.rng);
        let applied = self
            .store
            .commit_consumption(ConsumptionCommit {
                character_id,
                unit_id,
                consumed_at: now,
                experience: roll.experience,
                coins: roll.coins,
                actions: i64::from(roll.actions),
                containers: roll.containers,
            })
            .await?;

        tracing::info!(
            character_id,
            unit_id,
            tier = unit.tier.name(),
            exp = roll.experience,
            coins = roll.coins,
            containers = roll.containers,
            "Food consumed"
        );
        self.notify(
            character_id,
            ev::FOOD_CONSUMED,
            serde_json::json!({
                "unit_id": unit_id,
                "tier": unit.tier,
                "actions": roll.actions,
                "exp_gained": roll.experience,
                "coins_gained": roll.coins,
            }),
            now,
        );
        for container in &applied.containers {
            self.notify(
                character_id,
                ev::BOX_GRANTED,
                serde_json::json!({ "box_id": container.id }),
                now,
            );
        }
        self.notify_progression(character_id, &applied.progression, now);

        Ok(ConsumptionResult {
            unit_id,
            tier: unit.tier,
            actions_resolved: roll.actions,
            exp_gained: roll.experience,
            currency_gained: roll.coins_gained(),
            bonus_container_granted: !applied.containers.is_empty(),
            containers_granted: applied.containers,
            progression: applied.progression.after,
            level_change: applied.progression.level_change(),
        })
    }

    // -- progression -------------------------------------------------------

    pub async fn progression(&self, character_id: DbId) -> Result<ProgressionState, CoreError> {
        Ok(self.store.get_character(character_id).await?.progression())
    }

    /// Grant experience outside of feeding. `amount` must be at least 1.
    pub async fn grant_experience(
        &self,
        character_id: DbId,
        amount: i64,
    ) -> Result<ProgressionChange, CoreError> {
        if amount < 1 {
            return Err(CoreError::Validation(
                "Experience amount must be at least 1".into(),
            ));
        }
        let now = self.clock.now();
        let change = self
            .store
            .apply_progression(character_id, amount, 0)
            .await?;

        tracing::info!(
            character_id,
            amount,
            level = change.after.level,
            "Experience granted"
        );
        self.notify(
            character_id,
            ev::EXPERIENCE_GRANTED,
            serde_json::json!({ "amount": amount, "experience": change.after.experience }),
            now,
        );
        self.notify_progression(character_id, &change, now);
        Ok(change)
    }

    // -- containers --------------------------------------------------------

    pub async fn containers(&self, character_id: DbId) -> Result<Vec<BonusContainer>, CoreError> {
        self.store.get_character(character_id).await?;
        self.store.list_containers(character_id).await
    }

    /// Roll, store and apply the reward of an unopened container.
    pub async fn open_box(
        &self,
        character_id: DbId,
        container_id: DbId,
    ) -> Result<OpenedBox, CoreError> {
        let now = self.clock.now();
        let container = self.store.get_container(character_id, container_id).await?;
        if container.opened {
            return Err(CoreError::AlreadyOpened { id: container_id });
        }

        let reward = roll_box_reward(&*self.rng);
        let applied = self
            .store
            .commit_open_container(OpenContainerCommit {
                character_id,
                container_id,
                opened_at: now,
                reward,
            })
            .await?;

        tracing::info!(character_id, container_id, ?reward, "Bonus box opened");
        self.notify(
            character_id,
            ev::BOX_OPENED,
            serde_json::json!({ "box_id": container_id, "reward": reward }),
            now,
        );

        let conversion = if applied.units.is_empty() {
            ConversionOutcome::default()
        } else {
            self.convert_after_commit(character_id).await
        };

        Ok(OpenedBox {
            container: applied.container,
            reward,
            units: applied.units,
            progression: applied.progression.after,
            conversion,
        })
    }

    // -- quests ------------------------------------------------------------

    /// Stored quest definitions, or the built-in set when none are stored.
    pub async fn quest_definitions(&self) -> Result<Vec<QuestDefinition>, CoreError> {
        let stored = self.store.quest_definitions().await?;
        Ok(if stored.is_empty() {
            default_definitions()
        } else {
            stored
        })
    }

    /// Roll a fresh batch of received quests.
    pub async fn generate_quests(&self, character_id: DbId) -> Result<Vec<Quest>, CoreError> {
        let now = self.clock.now();
        self.store.get_character(character_id).await?;
        let definitions = self.quest_definitions().await?;
        let batch = generate_batch(&definitions, QUEST_BATCH_SIZE, &*self.rng)?;
        let quests = self.store.insert_quests(character_id, &batch, now).await?;

        tracing::info!(character_id, count = quests.len(), "Quests generated");
        self.notify(
            character_id,
            ev::QUESTS_GENERATED,
            serde_json::json!({ "count": quests.len() }),
            now,
        );
        Ok(quests)
    }

    pub async fn quests(&self, character_id: DbId) -> Result<QuestBoard, CoreError> {
        self.store.get_character(character_id).await?;
        let now = self.clock.now();
        let quests = self.store.list_quests(character_id).await?;
        let progress = self
            .store
            .quest_progress(character_id, start_of_day(now))
            .await?;

        let mut board = QuestBoard {
            received: Vec::new(),
            available: Vec::new(),
            accepted: Vec::new(),
            completed: Vec::new(),
            progress,
        };
        for quest in quests {
            match quest.status {
                QuestStatus::Received => board.received.push(quest),
                QuestStatus::Available => board.available.push(quest),
                QuestStatus::Accepted => board.accepted.push(quest),
                QuestStatus::Completed | QuestStatus::Expired => board.completed.push(quest),
            }
        }
        Ok(board)
    }

    pub async fn accept_quest(
        &self,
        character_id: DbId,
        quest_id: DbId,
    ) -> Result<Quest, CoreError> {
        let now = self.clock.now();
        let quest = self
            .store
            .accept_quest(AcceptQuestCommit {
                character_id,
                quest_id,
                accepted_at: now,
                day_start: start_of_day(now),
            })
            .await?;

        tracing::info!(character_id, quest_id, expires_at = ?quest.expires_at, "Quest accepted");
        self.notify(
            character_id,
            ev::QUEST_ACCEPTED,
            serde_json::json!({ "quest_id": quest_id, "expires_at": quest.expires_at }),
            now,
        );
        Ok(quest)
    }

    pub async fn reject_quest(
        &self,
        character_id: DbId,
        quest_id: DbId,
    ) -> Result<Quest, CoreError> {
        let now = self.clock.now();
        let quest = self.store.reject_quest(character_id, quest_id).await?;
        tracing::info!(character_id, quest_id, "Quest rejected");
        self.notify(
            character_id,
            ev::QUEST_REJECTED,
            serde_json::json!({ "quest_id": quest_id }),
            now,
        );
        Ok(quest)
    }

    /// Complete an accepted quest whose timer has run out.
    pub async fn complete_quest(
        &self,
        character_id: DbId,
        quest_id: DbId,
    ) -> Result<CompletedQuest, CoreError> {
        let now = self.clock.now();
        let quest = self.store.get_quest(character_id, quest_id).await?;
        state_machine::validate_transition(quest.status, QuestStatus::Completed)?;
        if !quest.is_due(now) {
            return Err(CoreError::TooEarly {
                remaining_secs: quest.remaining_secs(now).max(1),
            });
        }
        self.finish_quest(character_id, quest_id, now).await
    }

    async fn finish_quest(
        &self,
        character_id: DbId,
        quest_id: DbId,
        now: Timestamp,
    ) -> Result<CompletedQuest, CoreError> {
        let completion = self
            .store
            .complete_quest(character_id, quest_id, now)
            .await?;

        tracing::info!(
            character_id,
            quest_id,
            reward_food = completion.units.len(),
            "Quest completed"
        );
        self.notify(
            character_id,
            ev::QUEST_COMPLETED,
            serde_json::json!({
                "quest_id": quest_id,
                "reward_food_count": completion.quest.reward_food_count,
            }),
            now,
        );

        let conversion = self.convert_after_commit(character_id).await;
        Ok(CompletedQuest {
            quest: completion.quest,
            units: completion.units,
            conversion,
        })
    }

    /// Complete every accepted quest that is due.
    pub async fn tick_quests(&self, character_id: DbId) -> Result<Vec<CompletedQuest>, CoreError> {
        let now = self.clock.now();
        let due: Vec<Quest> = self
            .store
            .list_quests(character_id)
            .await?
            .into_iter()
            .filter(|q| q.is_due(now))
            .collect();

        let mut completed = Vec::with_capacity(due.len());
        for quest in due {
            match self.finish_quest(character_id, quest.id, now).await {
                Ok(done) => completed.push(done),
                // Completed by a concurrent request.
                Err(CoreError::InvalidTransition(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(completed)
    }

    /// Accrual plus quest tick for one character.
    pub async fn poll(&self, character_id: DbId) -> Result<PollReport, CoreError> {
        let completed_quests = self.tick_quests(character_id).await?;
        let accrual = self.accrue(character_id).await?;
        Ok(PollReport {
            accrual,
            completed_quests,
        })
    }

    /// Poll every character played within `active_window`.
    pub async fn poll_active_characters(
        &self,
        active_window: Duration,
    ) -> Result<PollSummary, CoreError> {
        let since = self.clock.now() - active_window;
        let ids = self.store.list_active_character_ids(since).await?;
        let mut summary = PollSummary::default();
        for character_id in ids {
            match self.poll(character_id).await {
                Ok(_) => summary.polled += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(character_id, error = %e, "Character poll failed");
                }
            }
        }
        Ok(summary)
    }

    // -- achievements ------------------------------------------------------

    pub async fn achievement_snapshot(
        &self,
        character_id: DbId,
    ) -> Result<AchievementSnapshot, CoreError> {
        let character = self.store.get_character(character_id).await?;
        let quests_completed = self.store.count_completed_quests(character_id).await?;
        Ok(AchievementSnapshot {
            character_id,
            level: character.level,
            food_eaten: character.food_eaten,
            quests_completed,
            created_at: character.created_at,
            now: self.clock.now(),
        })
    }

    /// Unlock every achievement the character now qualifies for and pay the
    /// rewards. Rewards may push the level further, so evaluation repeats
    /// until nothing new qualifies.
    pub async fn unlock_achievements(
        &self,
        character_id: DbId,
    ) -> Result<Vec<Achievement>, CoreError> {
        let mut unlocked_now = Vec::new();
        for _ in 0..=DEFINITIONS.len() {
            let snapshot = self.achievement_snapshot(character_id).await?;
            let unlocked: Vec<String> = self
                .store
                .list_achievements(character_id)
                .await?
                .into_iter()
                .map(|a| a.key)
                .collect();
            let due = eligible(&snapshot, &unlocked);
            if due.is_empty() {
                break;
            }

            for def in due {
                let Some(unlock) = self
                    .store
                    .unlock_achievement(character_id, def.key, def.reward, snapshot.now)
                    .await?
                else {
                    continue;
                };
                tracing::info!(character_id, key = def.key, "Achievement unlocked");
                self.notify(
                    character_id,
                    ev::ACHIEVEMENT_UNLOCKED,
                    serde_json::json!({
                        "key": def.key,
                        "title": def.title,
                        "reward": def.reward,
                    }),
                    snapshot.now,
                );
                self.notify_progression(character_id, &unlock.progression, snapshot.now);
                unlocked_now.push(unlock.achievement);
            }
        }
        Ok(unlocked_now)
    }

    pub async fn achievements(&self, character_id: DbId) -> Result<AchievementOverview, CoreError> {
        self.store.get_character(character_id).await?;
        let achievements = self.store.list_achievements(character_id).await?;
        let stats = AchievementStats::of(&achievements);
        Ok(AchievementOverview {
            achievements,
            stats,
        })
    }
}

fn inventory_of(state: &AccrualState, units: Vec<ResourceUnit>, now: Timestamp) -> Inventory {
    let counts = TierCounts::of(&units);
    Inventory {
        counts,
        stock: counts.stock(),
        cap: state.cap,
        last_generated_at: state.last_generated_at,
        next_unit_at: state.next_unit_at(),
        seconds_until_next_unit: state.time_until_next_unit(now).map(ceil_secs),
        storage_usage_percent: state.storage_usage_percent(),
        units,
    }
}

/// Whole seconds, rounded up.
fn ceil_secs(d: Duration) -> i64 {
    let ms = d.num_milliseconds().max(0);
    (ms + 999) / 1000
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::accrual::CapPolicy;
    use crate::achievement::AchievementReward;
    use crate::character::NewCharacterRecord;
    use crate::clock::FixedClock;
    use crate::conversion::ConversionPlan;
    use crate::events::RecordingSink;
    use crate::leveling::experience_for_level;
    use crate::memory_store::MemoryStore;
    use crate::notification::NewNotification;
    use crate::quest::NewQuest;
    use crate::random::SequenceRandom;
    use crate::rewards::CurrencyPolicy;
    use crate::store::{
        AccrualRecord, AchievementUnlock, ConsumptionApplied, OpenContainerApplied,
        QuestCompletion,
    };

    struct Harness {
        engine: Engine,
        clock: Arc<FixedClock>,
        rng: Arc<SequenceRandom>,
        sink: Arc<RecordingSink>,
    }

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
    }

    fn harness_on(store: MemoryStore, config: EngineConfig) -> Harness {
        harness_over(Arc::new(store), config)
    }

    fn harness_over(store: Arc<dyn Store>, config: EngineConfig) -> Harness {
        let clock = Arc::new(FixedClock::new(t0()));
        let rng = Arc::new(SequenceRandom::new(Vec::<f64>::new()));
        let sink = Arc::new(RecordingSink::default());
        let engine = Engine::new(
            store,
            clock.clone(),
            rng.clone(),
            sink.clone(),
            config,
        );
        Harness {
            engine,
            clock,
            rng,
            sink,
        }
    }

    /// Memory store whose conversion and quest insert can be switched to fail.
    #[derive(Default)]
    struct FailingStore {
        inner: MemoryStore,
        fail_conversion: AtomicBool,
        fail_quest_insert: AtomicBool,
    }

    fn unavailable() -> CoreError {
        CoreError::StoreUnavailable("connection reset".into())
    }

    #[async_trait::async_trait]
    impl Store for FailingStore {
        async fn create_character(
            &self,
            record: NewCharacterRecord,
            initial_food: i64,
            first_quests: &[NewQuest],
        ) -> Result<CreatedCharacter, CoreError> {
            self.inner
                .create_character(record, initial_food, first_quests)
                .await
        }

        async fn get_character(&self, character_id: DbId) -> Result<Character, CoreError> {
            self.inner.get_character(character_id).await
        }

        async fn find_character_by_name(
            &self,
            name: &str,
        ) -> Result<Option<Character>, CoreError> {
            self.inner.find_character_by_name(name).await
        }

        async fn touch_last_played(
            &self,
            character_id: DbId,
            at: Timestamp,
        ) -> Result<(), CoreError> {
            self.inner.touch_last_played(character_id, at).await
        }

        async fn list_active_character_ids(
            &self,
            since: Timestamp,
        ) -> Result<Vec<DbId>, CoreError> {
            self.inner.list_active_character_ids(since).await
        }

        async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, CoreError> {
            self.inner.leaderboard(limit).await
        }

        async fn update_emotion(
            &self,
            character_id: DbId,
            emotion: &str,
        ) -> Result<Character, CoreError> {
            self.inner.update_emotion(character_id, emotion).await
        }

        async fn update_stats(
            &self,
            character_id: DbId,
            update: &StatsUpdate,
        ) -> Result<Character, CoreError> {
            self.inner.update_stats(character_id, update).await
        }

        async fn advance_evolution_stage(
            &self,
            character_id: DbId,
            from_stage: i32,
        ) -> Result<Character, CoreError> {
            self.inner
                .advance_evolution_stage(character_id, from_stage)
                .await
        }

        async fn load_accrual(&self, character_id: DbId) -> Result<AccrualRecord, CoreError> {
            self.inner.load_accrual(character_id).await
        }

        async fn commit_accrual(
            &self,
            commit: AccrualCommit,
        ) -> Result<Vec<ResourceUnit>, CoreError> {
            self.inner.commit_accrual(commit).await
        }

        async fn list_units(
            &self,
            character_id: DbId,
            include_consumed: bool,
        ) -> Result<Vec<ResourceUnit>, CoreError> {
            self.inner.list_units(character_id, include_consumed).await
        }

        async fn get_unit(
            &self,
            character_id: DbId,
            unit_id: DbId,
        ) -> Result<ResourceUnit, CoreError> {
            self.inner.get_unit(character_id, unit_id).await
        }

        async fn apply_conversion(
            &self,
            character_id: DbId,
            plan: &ConversionPlan,
            at: Timestamp,
        ) -> Result<Vec<ResourceUnit>, CoreError> {
            if self.fail_conversion.load(Ordering::SeqCst) {
                return Err(unavailable());
            }
            self.inner.apply_conversion(character_id, plan, at).await
        }

        async fn commit_consumption(
            &self,
            commit: ConsumptionCommit,
        ) -> Result<ConsumptionApplied, CoreError> {
            self.inner.commit_consumption(commit).await
        }

        async fn apply_progression(
            &self,
            character_id: DbId,
            experience: i64,
            coins: i64,
        ) -> Result<ProgressionChange, CoreError> {
            self.inner
                .apply_progression(character_id, experience, coins)
                .await
        }

        async fn list_containers(
            &self,
            character_id: DbId,
        ) -> Result<Vec<BonusContainer>, CoreError> {
            self.inner.list_containers(character_id).await
        }

        async fn get_container(
            &self,
            character_id: DbId,
            container_id: DbId,
        ) -> Result<BonusContainer, CoreError> {
            self.inner.get_container(character_id, container_id).await
        }

        async fn commit_open_container(
            &self,
            commit: OpenContainerCommit,
        ) -> Result<OpenContainerApplied, CoreError> {
            self.inner.commit_open_container(commit).await
        }

        async fn quest_definitions(&self) -> Result<Vec<QuestDefinition>, CoreError> {
            self.inner.quest_definitions().await
        }

        async fn insert_quests(
            &self,
            character_id: DbId,
            quests: &[NewQuest],
            created_at: Timestamp,
        ) -> Result<Vec<Quest>, CoreError> {
            if self.fail_quest_insert.load(Ordering::SeqCst) {
                return Err(unavailable());
            }
            self.inner
                .insert_quests(character_id, quests, created_at)
                .await
        }

        async fn list_quests(&self, character_id: DbId) -> Result<Vec<Quest>, CoreError> {
            self.inner.list_quests(character_id).await
        }

        async fn get_quest(&self, character_id: DbId, quest_id: DbId) -> Result<Quest, CoreError> {
            self.inner.get_quest(character_id, quest_id).await
        }

        async fn quest_progress(
            &self,
            character_id: DbId,
            day_start: Timestamp,
        ) -> Result<QuestProgress, CoreError> {
            self.inner.quest_progress(character_id, day_start).await
        }

        async fn count_completed_quests(&self, character_id: DbId) -> Result<i64, CoreError> {
            self.inner.count_completed_quests(character_id).await
        }

        async fn accept_quest(&self, commit: AcceptQuestCommit) -> Result<Quest, CoreError> {
            self.inner.accept_quest(commit).await
        }

        async fn reject_quest(
            &self,
            character_id: DbId,
            quest_id: DbId,
        ) -> Result<Quest, CoreError> {
            self.inner.reject_quest(character_id, quest_id).await
        }

        async fn complete_quest(
            &self,
            character_id: DbId,
            quest_id: DbId,
            completed_at: Timestamp,
        ) -> Result<QuestCompletion, CoreError> {
            self.inner
                .complete_quest(character_id, quest_id, completed_at)
                .await
        }

        async fn list_achievements(
            &self,
            character_id: DbId,
        ) -> Result<Vec<Achievement>, CoreError> {
            self.inner.list_achievements(character_id).await
        }

        async fn unlock_achievement(
            &self,
            character_id: DbId,
            key: &str,
            reward: AchievementReward,
            at: Timestamp,
        ) -> Result<Option<AchievementUnlock>, CoreError> {
            self.inner
                .unlock_achievement(character_id, key, reward, at)
                .await
        }

        async fn record_notification(
            &self,
            notification: &NewNotification,
        ) -> Result<Notification, CoreError> {
            self.inner.record_notification(notification).await
        }

        async fn list_notifications(
            &self,
            character_id: DbId,
            unread_only: bool,
        ) -> Result<Vec<Notification>, CoreError> {
            self.inner
                .list_notifications(character_id, unread_only)
                .await
        }

        async fn mark_notification_read(
            &self,
            character_id: DbId,
            notification_id: DbId,
        ) -> Result<Notification, CoreError> {
            self.inner
                .mark_notification_read(character_id, notification_id)
                .await
        }
    }

    fn failing_harness(config: EngineConfig) -> (Harness, Arc<FailingStore>) {
        let store = Arc::new(FailingStore::default());
        (harness_over(store.clone(), config), store)
    }

    fn harness_with(config: EngineConfig) -> Harness {
        harness_on(MemoryStore::new(), config)
    }

    fn harness() -> Harness {
        harness_with(EngineConfig::default())
    }

    fn new_character(name: &str) -> NewCharacter {
        NewCharacter {
            name: name.into(),
            password: "secret".into(),
            species: "hamster".into(),
            job: "scholar".into(),
        }
    }

    async fn create(h: &Harness, name: &str) -> Character {
        h.engine
            .create_character(new_character(name), "hash".into())
            .await
            .unwrap()
            .character
    }

    fn minutes(m: i64) -> Duration {
        Duration::minutes(m)
    }

    // -----------------------------------------------------------------------
    // Characters
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn creation_seeds_food_and_quests() {
        let h = harness();
        let created = h
            .engine
            .create_character(new_character("Mochi"), "hash".into())
            .await
            .unwrap();

        assert_eq!(created.character.level, 1);
        assert_eq!(created.character.coins, 100);
        assert_eq!(created.character.emotion, "happy");
        assert_eq!(created.food.len(), 9);
        assert!(created.food.iter().all(|u| u.tier == Tier::Low));
        assert_eq!(created.quests.len(), 5);
        assert!(created
            .quests
            .iter()
            .all(|q| q.status == QuestStatus::Received));

        let inventory = h.engine.inventory(created.character.id).await.unwrap();
        assert_eq!(inventory.counts, TierCounts { low: 9, high: 0 });
        assert_eq!(inventory.last_generated_at, t0());
        assert_eq!(inventory.next_unit_at, Some(t0() + minutes(30)));
        assert!(h.sink.action_types().contains(&"character.created".to_string()));
    }

    #[tokio::test]
    async fn first_quests_are_created_with_the_character() {
        let (h, store) = failing_harness(EngineConfig::default());
        store.fail_quest_insert.store(true, Ordering::SeqCst);

        let created = h
            .engine
            .create_character(new_character("Mochi"), "hash".into())
            .await
            .unwrap();
        assert_eq!(created.quests.len(), 5);
        let board = h.engine.quests(created.character.id).await.unwrap();
        assert_eq!(board.received.len(), 5);
        assert!(h.sink.action_types().contains(&"quests.generated".to_string()));
    }

    #[tokio::test]
    async fn broken_quest_definitions_leave_no_character_behind() {
        let mut broken = one_hour_definition();
        broken.min_duration_hours = 5;
        let h = harness_on(
            MemoryStore::with_quest_definitions(vec![broken]),
            EngineConfig::default(),
        );
        assert_matches!(
            h.engine
                .create_character(new_character("Mochi"), "hash".into())
                .await,
            Err(CoreError::Validation(_))
        );
        assert!(h
            .engine
            .find_character_by_name("Mochi")
            .await
            .unwrap()
            .is_none());
        assert!(h.sink.action_types().is_empty());
    }

    fn feeling(emotion: &str) -> EmotionUpdate {
        EmotionUpdate {
            emotion: emotion.into(),
        }
    }

    #[tokio::test]
    async fn emotion_changes_are_checked_and_announced() {
        let h = harness();
        let c = create(&h, "Mochi").await;

        let updated = h
            .engine
            .update_emotion(c.id, feeling(" proud "))
            .await
            .unwrap();
        assert_eq!(updated.emotion, "proud");
        assert!(h
            .sink
            .action_types()
            .contains(&"character.emotion_changed".to_string()));

        assert_matches!(
            h.engine.update_emotion(c.id, feeling("bored")).await,
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            h.engine.update_emotion(404, feeling("sad")).await,
            Err(CoreError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn stats_updates_merge_into_the_stored_stats() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        let update = StatsUpdate {
            appetite: Some(22),
            ..StatsUpdate::default()
        };
        let updated = h.engine.update_stats(c.id, update).await.unwrap();
        assert_eq!(updated.stats.appetite, 22);
        assert_eq!(updated.stats.pragmatism, 10);

        assert_matches!(
            h.engine.update_stats(c.id, StatsUpdate::default()).await,
            Err(CoreError::Validation(_))
        );
        let too_high = StatsUpdate {
            str: Some(1000),
            ..StatsUpdate::default()
        };
        assert_matches!(
            h.engine.update_stats(c.id, too_high).await,
            Err(CoreError::Validation(_))
        );
        assert_eq!(h.engine.character(c.id).await.unwrap().stats.str, 10);
    }

    #[tokio::test]
    async fn create_rejects_unknown_species() {
        let h = harness();
        let mut input = new_character("Mochi");
        input.species = "dragon".into();
        assert_matches!(
            h.engine.create_character(input, "hash".into()).await,
            Err(CoreError::Validation(_))
        );
    }

    #[tokio::test]
    async fn login_touches_last_played_and_polls() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        h.clock.advance(minutes(65));
        let report = h.engine.record_login(c.id).await.unwrap();
        // 9 seeded + 2 accrued = 11 -> one high tier unit, one low left.
        assert_eq!(report.accrual.units_created, 2);
        assert_eq!(report.accrual.conversion.promoted, 1);
        assert_eq!(report.accrual.inventory.counts, TierCounts { low: 1, high: 1 });
        let character = h.engine.character(c.id).await.unwrap();
        assert_eq!(character.last_played_at, t0() + minutes(65));
    }

    // -----------------------------------------------------------------------
    // Accrual and conversion
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn accrual_converts_at_ten_and_keeps_remainder() {
        let h = harness_with(EngineConfig {
            initial_food: 0,
            ..EngineConfig::default()
        });
        let c = create(&h, "Mochi").await;

        h.clock.advance(minutes(30 * 23 + 10));
        let report = h.engine.accrue(c.id).await.unwrap();
        assert_eq!(report.units_created, 23);
        assert_eq!(report.conversion.promoted, 2);
        assert_eq!(report.conversion.retired_low_ids.len(), 20);
        assert_eq!(report.inventory.counts, TierCounts { low: 3, high: 2 });
        assert_eq!(report.inventory.stock, 23);
        assert_eq!(report.inventory.last_generated_at, t0() + minutes(30 * 23));
        assert_eq!(report.inventory.seconds_until_next_unit, Some(20 * 60));

        // Same instant again: nothing new.
        let again = h.engine.accrue(c.id).await.unwrap();
        assert_eq!(again.units_created, 0);
        assert_eq!(again.conversion.promoted, 0);
    }

    #[tokio::test]
    async fn conversion_retires_the_oldest_units() {
        let h = harness_with(EngineConfig {
            initial_food: 0,
            ..EngineConfig::default()
        });
        let c = create(&h, "Mochi").await;
        h.clock.advance(minutes(30 * 11));
        let report = h.engine.accrue(c.id).await.unwrap();
        let remaining = &report.inventory.units;
        let low: Vec<_> = remaining.iter().filter(|u| u.tier == Tier::Low).collect();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].created_at, t0() + minutes(30 * 11));
    }

    #[tokio::test]
    async fn full_storage_banks_elapsed_time() {
        let h = harness_with(EngineConfig {
            food_cap: 5,
            initial_food: 5,
            ..EngineConfig::default()
        });
        let c = create(&h, "Mochi").await;

        h.clock.advance(minutes(30 * 4));
        let report = h.engine.accrue(c.id).await.unwrap();
        assert_eq!(report.units_created, 0);
        assert_eq!(report.inventory.next_unit_at, None);
        assert_eq!(report.inventory.last_generated_at, t0());

        // Eating two frees room; the banked intervals pay out right away.
        let units = h.engine.inventory(c.id).await.unwrap().units;
        h.engine.consume(c.id, units[0].id).await.unwrap();
        h.engine.consume(c.id, units[1].id).await.unwrap();
        let report = h.engine.accrue(c.id).await.unwrap();
        assert_eq!(report.units_created, 2);
        assert_eq!(report.inventory.counts.low, 5);
        assert_eq!(report.inventory.last_generated_at, t0() + minutes(60));
    }

    #[tokio::test]
    async fn stock_cap_policy_counts_high_tier_value() {
        let h = harness_with(EngineConfig {
            food_cap: 12,
            initial_food: 10,
            cap_policy: CapPolicy::Stock,
            ..EngineConfig::default()
        });
        let c = create(&h, "Mochi").await;
        h.engine.convert(c.id).await.unwrap();
        h.clock.advance(minutes(30 * 5));
        let report = h.engine.accrue(c.id).await.unwrap();
        assert_eq!(report.units_created, 2);
        assert_eq!(report.inventory.stock, 12);
    }

    #[tokio::test]
    async fn strict_generation_reports_why_nothing_was_made() {
        let h = harness_with(EngineConfig {
            food_cap: 9,
            ..EngineConfig::default()
        });
        let c = create(&h, "Mochi").await;
        h.clock.advance(minutes(45));
        assert_matches!(h.engine.generate_food(c.id).await, Err(CoreError::LimitReached(_)));

        let units = h.engine.inventory(c.id).await.unwrap().units;
        h.engine.consume(c.id, units[0].id).await.unwrap();
        let report = h.engine.generate_food(c.id).await.unwrap();
        assert_eq!(report.units_created, 1);

        h.clock.advance(minutes(10));
        h.engine.consume(c.id, units[1].id).await.unwrap();
        assert_matches!(
            h.engine.generate_food(c.id).await,
            Err(CoreError::TooEarly { remaining_secs: 300 })
        );
    }

    #[tokio::test]
    async fn concurrent_polls_do_not_duplicate_food() {
        let h = harness_with(EngineConfig {
            initial_food: 0,
            ..EngineConfig::default()
        });
        let c = create(&h, "Mochi").await;
        h.clock.advance(minutes(30 * 7));
        let (a, b) = tokio::join!(h.engine.accrue(c.id), h.engine.accrue(c.id));
        assert_eq!(a.unwrap().units_created + b.unwrap().units_created, 7);
        let counts = h.engine.inventory(c.id).await.unwrap().counts;
        assert_eq!(counts, TierCounts { low: 7, high: 0 });
    }

    // -----------------------------------------------------------------------
    // Consumption
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn consuming_low_tier_rolls_one_action() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        let unit = h.engine.inventory(c.id).await.unwrap().units[0].clone();

        h.rng.push([0.6, 0.01]);
        let result = h.engine.consume(c.id, unit.id).await.unwrap();
        assert_eq!(result.actions_resolved, 1);
        assert_eq!(result.exp_gained, 80);
        assert_eq!(result.currency_gained, Some(200));
        assert!(result.bonus_container_granted);
        assert_eq!(result.progression.coins, 300);
        assert_eq!(h.engine.containers(c.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn a_unit_is_consumed_once() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        let unit = h.engine.inventory(c.id).await.unwrap().units[0].clone();

        h.engine.consume(c.id, unit.id).await.unwrap();
        let before = h.engine.progression(c.id).await.unwrap();
        assert_matches!(
            h.engine.consume(c.id, unit.id).await,
            Err(CoreError::AlreadyConsumed { .. })
        );
        assert_eq!(h.engine.progression(c.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn racing_consumers_get_one_success() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        let unit = h.engine.inventory(c.id).await.unwrap().units[0].clone();

        let (a, b) = tokio::join!(h.engine.consume(c.id, unit.id), h.engine.consume(c.id, unit.id));
        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        assert_eq!(h.engine.progression(c.id).await.unwrap().experience, 80);
    }

    #[tokio::test]
    async fn unknown_or_foreign_units_are_not_found() {
        let h = harness();
        let a = create(&h, "A").await;
        let b = create(&h, "B").await;
        let unit = h.engine.inventory(a.id).await.unwrap().units[0].clone();
        assert_matches!(h.engine.consume(b.id, unit.id).await, Err(CoreError::NotFound { .. }));
        assert_matches!(h.engine.consume(a.id, 9_999).await, Err(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn high_tier_equals_ten_low_tier_meals() {
        let h = harness_with(EngineConfig {
            initial_food: 10,
            ..EngineConfig::default()
        });
        let c = create(&h, "Mochi").await;
        let outcome = h.engine.convert(c.id).await.unwrap();
        let high = outcome.high_units[0].clone();

        let result = h.engine.consume(c.id, high.id).await.unwrap();
        assert_eq!(result.actions_resolved, 10);
        assert_eq!(result.exp_gained, 800);
        assert_eq!(result.progression.experience, 800);
        // Fallback draw 0.99: top coin bracket, never a container.
        assert_eq!(result.currency_gained, Some(5000));
        assert!(!result.bonus_container_granted);
        assert_eq!(h.engine.character(c.id).await.unwrap().food_eaten, 10);
    }

    #[tokio::test]
    async fn gated_currency_can_pay_nothing() {
        let h = harness_with(EngineConfig {
            currency_policy: CurrencyPolicy::gated(0.8).unwrap(),
            ..EngineConfig::default()
        });
        let c = create(&h, "Mochi").await;
        let unit = h.engine.inventory(c.id).await.unwrap().units[0].clone();
        h.rng.push([0.85, 0.5]);
        let result = h.engine.consume(c.id, unit.id).await.unwrap();
        assert_eq!(result.currency_gained, None);
        assert_eq!(result.progression.coins, 100);
    }

    #[tokio::test]
    async fn eating_the_starting_food_reaches_level_three() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        let units = h.engine.inventory(c.id).await.unwrap().units;
        assert_eq!(units.len(), 9);

        let mut level_ups = Vec::new();
        for unit in units {
            let result = h.engine.consume(c.id, unit.id).await.unwrap();
            if result.level_change.leveled_up {
                level_ups.push(result.level_change.new_level);
            }
        }

        let progression = h.engine.progression(c.id).await.unwrap();
        assert_eq!(progression.experience, 720);
        assert_eq!(progression.level, 3);
        assert_eq!(level_ups, vec![2, 3]);
        let level_events = h
            .sink
            .action_types()
            .into_iter()
            .filter(|t| t == "character.level_up")
            .count();
        assert_eq!(level_events, 2);
    }

    // -----------------------------------------------------------------------
    // Experience and boxes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn granted_experience_recomputes_level() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        let change = h.engine.grant_experience(c.id, 400).await.unwrap();
        assert_eq!(change.after.level, 3);
        assert!(change.leveled_up());
        assert_matches!(
            h.engine.grant_experience(c.id, 0).await,
            Err(CoreError::Validation(_))
        );
    }

    #[tokio::test]
    async fn boxes_open_once() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        let unit = h.engine.inventory(c.id).await.unwrap().units[0].clone();
        h.rng.push([0.1, 0.0]);
        let consumed = h.engine.consume(c.id, unit.id).await.unwrap();
        let box_id = consumed.containers_granted[0].id;

        // Coins branch, table draw 0.55 -> 200, doubled.
        h.rng.push([0.2, 0.55]);
        let opened = h.engine.open_box(c.id, box_id).await.unwrap();
        assert_eq!(opened.reward, BoxReward::Coins { amount: 400 });
        assert!(opened.container.opened);
        assert_eq!(opened.progression.coins, 100 + 100 + 400);

        assert_matches!(
            h.engine.open_box(c.id, box_id).await,
            Err(CoreError::AlreadyOpened { .. })
        );
        assert_matches!(
            h.engine.open_box(c.id, 777).await,
            Err(CoreError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn food_boxes_add_units_and_convert() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        let unit = h.engine.inventory(c.id).await.unwrap().units[0].clone();
        h.rng.push([0.1, 0.0]);
        let box_id = h.engine.consume(c.id, unit.id).await.unwrap().containers_granted[0].id;

        // 8 low left; food branch with 3 units -> 11 -> one high, one low.
        h.rng.push([0.9, 0.99]);
        let opened = h.engine.open_box(c.id, box_id).await.unwrap();
        assert_eq!(opened.reward, BoxReward::Food { units: 3 });
        assert_eq!(opened.units.len(), 3);
        assert_eq!(opened.conversion.promoted, 1);
        let counts = h.engine.inventory(c.id).await.unwrap().counts;
        assert_eq!(counts, TierCounts { low: 1, high: 1 });
    }

    // -----------------------------------------------------------------------
    // Quests
    // -----------------------------------------------------------------------

    async fn received_quest(h: &Harness, character_id: DbId) -> Quest {
        h.engine.quests(character_id).await.unwrap().received[0].clone()
    }

    #[tokio::test]
    async fn quest_completes_only_after_its_duration() {
        let h = harness_with(EngineConfig {
            initial_food: 0,
            ..EngineConfig::default()
        });
        let c = create(&h, "Mochi").await;
        let quest = received_quest(&h, c.id).await;

        let accepted = h.engine.accept_quest(c.id, quest.id).await.unwrap();
        assert_eq!(accepted.status, QuestStatus::Accepted);
        assert_eq!(accepted.accepted_at, Some(t0()));
        assert_eq!(accepted.expires_at, Some(t0() + accepted.duration()));

        h.clock.advance(accepted.duration() - Duration::seconds(1));
        assert_matches!(
            h.engine.complete_quest(c.id, quest.id).await,
            Err(CoreError::TooEarly { remaining_secs: 1 })
        );

        h.clock.advance(Duration::seconds(1));
        let done = h.engine.complete_quest(c.id, quest.id).await.unwrap();
        assert_eq!(done.quest.status, QuestStatus::Completed);
        assert_eq!(done.units.len() as i32, accepted.reward_food_count);
        assert!(done.units.iter().all(|u| u.tier == Tier::Low));

        assert_matches!(
            h.engine.complete_quest(c.id, quest.id).await,
            Err(CoreError::InvalidTransition(_))
        );
    }

    #[tokio::test]
    async fn eight_hour_quest_is_due_at_eight_hours() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        // Definition 0 with minimum duration and base reward 3, no bonus.
        h.rng.push([0.0, 0.0, 0.0, 0.5]);
        let quests = h.engine.generate_quests(c.id).await.unwrap();
        let quest = quests[0].clone();
        assert_eq!(quest.duration_hours, 8);
        assert_eq!(quest.reward_food_count, 3);

        h.engine.accept_quest(c.id, quest.id).await.unwrap();
        h.clock.advance(Duration::hours(8) - Duration::seconds(1));
        assert!(h.engine.tick_quests(c.id).await.unwrap().is_empty());
        h.clock.advance(Duration::seconds(1));
        let done = h.engine.tick_quests(c.id).await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].units.len(), 3);
    }

    #[tokio::test]
    async fn rejected_quests_park_as_available() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        let quest = received_quest(&h, c.id).await;
        let rejected = h.engine.reject_quest(c.id, quest.id).await.unwrap();
        assert_eq!(rejected.status, QuestStatus::Available);
        assert_matches!(
            h.engine.accept_quest(c.id, quest.id).await,
            Err(CoreError::InvalidTransition(_))
        );
        assert_eq!(h.engine.quests(c.id).await.unwrap().available.len(), 1);
    }

    #[tokio::test]
    async fn at_most_four_quests_run_at_once() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        let board = h.engine.quests(c.id).await.unwrap();
        for quest in &board.received[..4] {
            h.engine.accept_quest(c.id, quest.id).await.unwrap();
        }
        assert_matches!(
            h.engine.accept_quest(c.id, board.received[4].id).await,
            Err(CoreError::LimitReached(_))
        );
        let board = h.engine.quests(c.id).await.unwrap();
        assert_eq!(board.progress.accepted, 4);
        assert_eq!(board.received.len(), 1);
    }

    fn one_hour_definition() -> QuestDefinition {
        let mut def = default_definitions()[0].clone();
        def.key = "nap".into();
        def.title = "Nap Time".into();
        def.min_duration_hours = 1;
        def.max_duration_hours = 1;
        def.bonus_reward_chance = 0.0;
        def
    }

    #[tokio::test]
    async fn daily_completion_limit_blocks_acceptance() {
        let h = harness_on(
            MemoryStore::with_quest_definitions(vec![one_hour_definition()]),
            EngineConfig {
                initial_food: 0,
                ..EngineConfig::default()
            },
        );
        let c = create(&h, "Mochi").await;
        h.engine.generate_quests(c.id).await.unwrap();
        h.engine.generate_quests(c.id).await.unwrap();

        let mut completed = 0;
        while completed < 10 {
            let received = h.engine.quests(c.id).await.unwrap().received;
            for quest in received.iter().take((10 - completed).min(4)) {
                h.engine.accept_quest(c.id, quest.id).await.unwrap();
            }
            h.clock.advance(Duration::hours(1));
            completed += h.engine.tick_quests(c.id).await.unwrap().len();
        }

        let board = h.engine.quests(c.id).await.unwrap();
        assert_eq!(board.progress.completed_today, 10);
        assert_eq!(board.progress.accepted, 0);
        let next = board.received[0].id;
        assert_matches!(
            h.engine.accept_quest(c.id, next).await,
            Err(CoreError::LimitReached(_))
        );

        // The limit resets at the next UTC midnight.
        h.clock.set(t0() + Duration::days(1));
        h.engine.accept_quest(c.id, next).await.unwrap();
    }

    #[tokio::test]
    async fn stored_definitions_replace_the_defaults() {
        let h = harness_on(
            MemoryStore::with_quest_definitions(vec![one_hour_definition()]),
            EngineConfig::default(),
        );
        let created = h
            .engine
            .create_character(new_character("Mochi"), "hash".into())
            .await
            .unwrap();
        assert!(created.quests.iter().all(|q| q.title == "Nap Time"));
        assert!(created.quests.iter().all(|q| q.duration_hours == 1));
    }

    // -----------------------------------------------------------------------
    // Committed changes survive a failing conversion
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn accrual_is_reported_when_conversion_fails() {
        let (h, store) = failing_harness(EngineConfig {
            initial_food: 0,
            ..EngineConfig::default()
        });
        let c = create(&h, "Mochi").await;
        store.fail_conversion.store(true, Ordering::SeqCst);

        h.clock.advance(minutes(30 * 12));
        let report = h.engine.accrue(c.id).await.unwrap();
        assert_eq!(report.units_created, 12);
        assert_eq!(report.conversion, ConversionOutcome::default());
        assert_eq!(report.inventory.counts, TierCounts { low: 12, high: 0 });
        assert_eq!(report.inventory.last_generated_at, t0() + minutes(30 * 12));
        assert!(h.sink.action_types().contains(&"food.accrued".to_string()));

        // The next pass converts what was left behind.
        store.fail_conversion.store(false, Ordering::SeqCst);
        let report = h.engine.accrue(c.id).await.unwrap();
        assert_eq!(report.conversion.promoted, 1);
        assert_eq!(report.inventory.counts, TierCounts { low: 2, high: 1 });
    }

    #[tokio::test]
    async fn box_opening_is_reported_when_conversion_fails() {
        let (h, store) = failing_harness(EngineConfig::default());
        let c = create(&h, "Mochi").await;
        let unit = h.engine.inventory(c.id).await.unwrap().units[0].clone();
        h.rng.push([0.1, 0.0]);
        let box_id = h.engine.consume(c.id, unit.id).await.unwrap().containers_granted[0].id;
        store.fail_conversion.store(true, Ordering::SeqCst);

        h.rng.push([0.9, 0.99]);
        let opened = h.engine.open_box(c.id, box_id).await.unwrap();
        assert_eq!(opened.reward, BoxReward::Food { units: 3 });
        assert_eq!(opened.conversion, ConversionOutcome::default());
        assert!(h.sink.action_types().contains(&"box.opened".to_string()));
        let counts = h.engine.inventory(c.id).await.unwrap().counts;
        assert_eq!(counts, TierCounts { low: 11, high: 0 });
    }

    #[tokio::test]
    async fn quest_completion_is_reported_when_conversion_fails() {
        let (h, store) = failing_harness(EngineConfig::default());
        let c = create(&h, "Mochi").await;
        let quest = received_quest(&h, c.id).await;
        let accepted = h.engine.accept_quest(c.id, quest.id).await.unwrap();
        store.fail_conversion.store(true, Ordering::SeqCst);

        h.clock.advance(accepted.duration());
        let done = h.engine.complete_quest(c.id, quest.id).await.unwrap();
        assert_eq!(done.quest.status, QuestStatus::Completed);
        assert_eq!(done.conversion, ConversionOutcome::default());
        assert!(h.sink.action_types().contains(&"quest.completed".to_string()));
        assert_matches!(
            h.engine.complete_quest(c.id, quest.id).await,
            Err(CoreError::InvalidTransition(_))
        );
    }

    // -----------------------------------------------------------------------
    // Evolution and notifications
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn evolving_needs_level_and_stats() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        assert_matches!(
            h.engine.evolve(c.id).await,
            Err(CoreError::InvalidTransition(msg)) if msg.contains("level 10 (currently 1)")
        );

        h.engine
            .grant_experience(c.id, experience_for_level(10))
            .await
            .unwrap();
        let update = StatsUpdate {
            appetite: Some(20),
            pragmatism: Some(15),
            ..StatsUpdate::default()
        };
        h.engine.update_stats(c.id, update).await.unwrap();
        let status = h.engine.evolution(c.id).await.unwrap();
        assert!(status.can_evolve);

        let evolved = h.engine.evolve(c.id).await.unwrap();
        assert_eq!(evolved.character.evolution_stage, 1);
        assert_eq!(evolved.stage.name, "Hoarder Hamster");
        assert!(evolved.unlocked.contains(&"mega_hoard"));
        assert!(h.sink.action_types().contains(&"character.evolved".to_string()));

        // Stage 2 needs level 25.
        assert_matches!(
            h.engine.evolve(c.id).await,
            Err(CoreError::InvalidTransition(_))
        );
    }

    #[tokio::test]
    async fn notifications_belong_to_an_existing_character() {
        let h = harness();
        let c = create(&h, "Mochi").await;
        let event = GameEvent::new(c.id, ev::LEVEL_UP)
            .with_metadata(serde_json::json!({ "new_level": 2 }));
        let stored = h
            .engine
            .store
            .record_notification(&NewNotification::from_event(&event))
            .await
            .unwrap();

        let unread = h.engine.notifications(c.id, true).await.unwrap();
        assert_eq!(unread.len(), 1);
        let read = h.engine.mark_notification_read(c.id, stored.id).await.unwrap();
        assert!(read.is_read);
        assert!(h.engine.notifications(c.id, true).await.unwrap().is_empty());
        assert_eq!(h.engine.notifications(c.id, false).await.unwrap().len(), 1);

        assert_matches!(
            h.engine.notifications(404, false).await,
            Err(CoreError::NotFound { .. })
        );
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn poll_catches_up_after_a_long_absence() {
        let h = harness_with(EngineConfig {
            initial_food: 0,
            ..EngineConfig::default()
        });
        let c = create(&h, "Mochi").await;
        let quest = received_quest(&h, c.id).await;
        let accepted = h.engine.accept_quest(c.id, quest.id).await.unwrap();

        h.clock.advance(Duration::hours(20));
        let report = h.engine.poll(c.id).await.unwrap();
        assert_eq!(report.completed_quests.len(), 1);
        assert_eq!(report.accrual.units_created, 40);
        let expected_stock = 40 + i64::from(accepted.reward_food_count);
        assert_eq!(report.accrual.inventory.stock, expected_stock);
    }

    #[tokio::test]
    async fn background_poll_only_visits_recent_players() {
        let h = harness_with(EngineConfig {
            initial_food: 0,
            ..EngineConfig::default()
        });
        let old = create(&h, "Old").await;
        h.clock.advance(Duration::hours(30));
        let recent = create(&h, "Recent").await;
        h.clock.advance(minutes(30));

        let summary = h.engine.poll_active_characters(Duration::hours(24)).await.unwrap();
        assert_eq!(summary, PollSummary { polled: 1, failed: 0 });
        assert_eq!(h.engine.inventory(recent.id).await.unwrap().counts.low, 1);
        assert_eq!(h.engine.inventory(old.id).await.unwrap().counts.low, 0);
    }

    // -----------------------------------------------------------------------
    // Achievements and leaderboard
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn achievements_unlock_once_and_cascade() {
        let h = harness();
        let c = create(&h, "Mochi").await;

        let first = h.engine.unlock_achievements(c.id).await.unwrap();
        let keys: Vec<_> = first.iter().map(|a| a.key.as_str()).collect();
        // first_character pays 50 exp, not enough for level 2.
        assert_eq!(keys, vec!["first_character"]);
        assert!(h.engine.unlock_achievements(c.id).await.unwrap().is_empty());

        // 60 more exp -> 110 -> level 2 -> first_level_up pays 100 more.
        h.engine.grant_experience(c.id, 60).await.unwrap();
        let second = h.engine.unlock_achievements(c.id).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].key, "first_level_up");
        let progression = h.engine.progression(c.id).await.unwrap();
        assert_eq!(progression.experience, 210);
        assert_eq!(progression.coins, 100 + 100 + 150);

        let overview = h.engine.achievements(c.id).await.unwrap();
        assert_eq!(overview.stats.unlocked, 2);
        assert_eq!(overview.stats.points, 25);
    }

    #[tokio::test]
    async fn leaderboard_limit_is_clamped() {
        let h = harness();
        let a = create(&h, "A").await;
        let b = create(&h, "B").await;
        h.engine.grant_experience(b.id, 1000).await.unwrap();

        let board = h.engine.leaderboard(Some(0)).await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].character_id, b.id);

        let board = h.engine.leaderboard(None).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[1].character_id, a.id);
    }
}

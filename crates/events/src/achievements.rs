//! Achievement tracking service.
//!
//! [`AchievementTracker`] listens on the event bus and, for every progress
//! event, asks the engine to unlock whatever the character has become
//! eligible for. Unlocks publish `achievement.unlocked` (ignored here) and may
//! publish `character.level_up`, which is handled like any other event; the
//! second pass finds nothing new and the loop settles.

use std::sync::Arc;

use critter_core::achievement::Achievement;
use critter_core::engine::Engine;
use critter_core::error::CoreError;
use critter_core::events::{GameEvent, ACHIEVEMENT_UNLOCKED};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Background service that unlocks achievements from game events.
pub struct AchievementTracker {
    engine: Arc<Engine>,
}

impl AchievementTracker {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Run until the bus closes or `cancel` fires.
    pub async fn run(
        &self,
        mut receiver: broadcast::Receiver<GameEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Achievement tracker started");
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Achievement tracker cancelled");
                    break;
                }
                received = receiver.recv() => received,
            };
            match received {
                Ok(event) => {
                    if let Err(e) = self.handle(&event).await {
                        tracing::error!(
                            error = %e,
                            character_id = event.character_id,
                            action_type = %event.action_type,
                            "Failed to evaluate achievements"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Achievement tracker lagged behind the event bus");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, achievement tracker shutting down");
                    break;
                }
            }
        }
    }

    /// Evaluate one event, returning the achievements it unlocked.
    pub async fn handle(&self, event: &GameEvent) -> Result<Vec<Achievement>, CoreError> {
        if event.action_type == ACHIEVEMENT_UNLOCKED {
            return Ok(Vec::new());
        }
        let unlocked = self.engine.unlock_achievements(event.character_id).await?;
        if !unlocked.is_empty() {
            tracing::debug!(
                character_id = event.character_id,
                count = unlocked.len(),
                trigger = %event.action_type,
                "Achievements unlocked from event"
            );
        }
        Ok(unlocked)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use critter_core::character::NewCharacter;
    use critter_core::clock::FixedClock;
    use critter_core::config::EngineConfig;
    use critter_core::events::{CHARACTER_CREATED, FOOD_CONSUMED};
    use critter_core::memory_store::MemoryStore;
    use critter_core::random::SequenceRandom;

    use super::*;
    use crate::bus::EventBus;

    fn engine_on(bus: Arc<EventBus>) -> Arc<Engine> {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap(),
        ));
        Arc::new(Engine::new(
            Arc::new(MemoryStore::new()),
            clock,
            Arc::new(SequenceRandom::new(Vec::<f64>::new())),
            bus,
            EngineConfig::default(),
        ))
    }

    fn new_character(name: &str) -> NewCharacter {
        NewCharacter {
            name: name.into(),
            password: "secret".into(),
            species: "hamster".into(),
            job: "scholar".into(),
        }
    }

    #[tokio::test]
    async fn creation_event_unlocks_first_character() {
        let bus = Arc::new(EventBus::default());
        let engine = engine_on(bus.clone());
        let tracker = AchievementTracker::new(engine.clone());

        let created = engine
            .create_character(new_character("Mochi"), "hash".into())
            .await
            .unwrap();
        let id = created.character.id;

        let unlocked = tracker
            .handle(&GameEvent::new(id, CHARACTER_CREATED))
            .await
            .unwrap();
        let keys: Vec<&str> = unlocked.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["first_character"]);

        // Already unlocked: a repeat event is a no-op.
        let again = tracker
            .handle(&GameEvent::new(id, FOOD_CONSUMED))
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn unlock_events_are_ignored() {
        let bus = Arc::new(EventBus::default());
        let engine = engine_on(bus.clone());
        let tracker = AchievementTracker::new(engine.clone());
        let id = engine
            .create_character(new_character("Mochi"), "hash".into())
            .await
            .unwrap()
            .character
            .id;

        let unlocked = tracker
            .handle(&GameEvent::new(id, ACHIEVEMENT_UNLOCKED))
            .await
            .unwrap();
        assert!(unlocked.is_empty());
        assert!(engine.achievements(id).await.unwrap().achievements.is_empty());
    }

    #[tokio::test]
    async fn background_loop_reacts_to_the_bus_and_stops_on_cancel() {
        let bus = Arc::new(EventBus::default());
        let engine = engine_on(bus.clone());
        let tracker = AchievementTracker::new(engine.clone());
        let cancel = CancellationToken::new();
        let mut watcher = bus.subscribe();

        let handle = tokio::spawn({
            let receiver = bus.subscribe();
            let cancel = cancel.clone();
            async move { tracker.run(receiver, cancel).await }
        });

        let id = engine
            .create_character(new_character("Mochi"), "hash".into())
            .await
            .unwrap()
            .character
            .id;

        let unlocked = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match watcher.recv().await {
                    Ok(event) if event.action_type == ACHIEVEMENT_UNLOCKED => break event,
                    Ok(_) => continue,
                    Err(e) => panic!("bus failed: {e}"),
                }
            }
        })
        .await
        .expect("an achievement should be unlocked");
        assert_eq!(unlocked.character_id, id);
        assert_eq!(unlocked.metadata["key"], "first_character");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("tracker should stop")
            .unwrap();
    }
}

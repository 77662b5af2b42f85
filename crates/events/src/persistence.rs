//! Durable event persistence service.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! broadcast channel and records every received [`GameEvent`] as a player
//! notification through the [`Store`]. It runs as a long-lived background
//! task and shuts down when the bus sender is dropped or the cancellation
//! token fires.

use std::sync::Arc;

use critter_core::events::GameEvent;
use critter_core::notification::NewNotification;
use critter_core::store::Store;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Background service that persists game events.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes or `cancel` fires.
    pub async fn run(
        store: Arc<dyn Store>,
        mut receiver: broadcast::Receiver<GameEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event persistence cancelled");
                    break;
                }
                received = receiver.recv() => received,
            };
            match received {
                Ok(event) => {
                    let notification = NewNotification::from_event(&event);
                    if let Err(e) = store.record_notification(&notification).await {
                        tracing::error!(
                            error = %e,
                            action_type = %event.action_type,
                            character_id = event.character_id,
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use critter_core::character::NewCharacterRecord;
    use critter_core::events::QUEST_COMPLETED;
    use critter_core::memory_store::MemoryStore;
    use critter_core::types::DbId;

    use super::*;
    use crate::bus::EventBus;

    async fn character(store: &MemoryStore) -> DbId {
        let record = NewCharacterRecord {
            name: "Mochi".into(),
            password_hash: "hash".into(),
            species: "cat".into(),
            job: "mage".into(),
            emotion: "happy".into(),
            coins: 100,
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap(),
        };
        store
            .create_character(record, 0, &[])
            .await
            .unwrap()
            .character
            .id
    }

    async fn stored(store: &MemoryStore, character_id: DbId, want: usize) -> usize {
        for _ in 0..100 {
            let found = store
                .list_notifications(character_id, false)
                .await
                .unwrap()
                .len();
            if found >= want {
                return found;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        0
    }

    #[tokio::test]
    async fn published_events_become_notifications() {
        let store = Arc::new(MemoryStore::new());
        let id = character(&store).await;
        let bus = EventBus::default();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(EventPersistence::run(
            store.clone(),
            bus.subscribe(),
            cancel.clone(),
        ));

        bus.publish(
            GameEvent::new(id, QUEST_COMPLETED)
                .with_metadata(serde_json::json!({ "reward_food_count": 4 })),
        );
        assert_eq!(stored(&store, id, 1).await, 1);
        let notes = store.list_notifications(id, true).await.unwrap();
        assert_eq!(notes[0].kind, "quest.completed");
        assert_eq!(notes[0].message, "Earned 4 food.");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn store_errors_do_not_stop_the_loop() {
        let store = Arc::new(MemoryStore::new());
        let id = character(&store).await;
        let bus = EventBus::default();
        let handle = tokio::spawn(EventPersistence::run(
            store.clone(),
            bus.subscribe(),
            CancellationToken::new(),
        ));

        // Unknown owner: recording fails and is logged.
        bus.publish(GameEvent::new(id + 100, QUEST_COMPLETED));
        bus.publish(GameEvent::new(id, QUEST_COMPLETED));
        assert_eq!(stored(&store, id, 1).await, 1);

        drop(bus);
        handle.await.unwrap();
    }
}

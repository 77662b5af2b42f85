//! Critter event bus and event consumers.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`; it is the engine's notification sink.
//! - [`EventPersistence`]: background service that records every event as a
//!   player notification through the store.
//! - [`AchievementTracker`]: background service that unlocks achievements as
//!   progress events arrive.

pub mod achievements;
pub mod bus;
pub mod persistence;

pub use achievements::AchievementTracker;
pub use bus::EventBus;
pub use persistence::EventPersistence;

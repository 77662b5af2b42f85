//! Critter game core.
//!
//! Domain types, the pure progression rules (accrual, tier conversion,
//! rewards, leveling, quests, achievements, evolution) and the
//! [`engine::Engine`] that drives them over the collaborator seams in
//! [`store`], [`clock`], [`random`] and [`events`].
//!
//! Nothing here talks to a database or the network directly; persistence is
//! injected through [`store::Store`].

pub mod accrual;
pub mod achievement;
pub mod character;
pub mod clock;
pub mod config;
pub mod container;
pub mod conversion;
pub mod engine;
pub mod error;
pub mod events;
pub mod evolution;
pub mod leveling;
pub mod memory_store;
pub mod notification;
pub mod quest;
pub mod random;
pub mod resource;
pub mod rewards;
pub mod stats;
pub mod store;
pub mod types;

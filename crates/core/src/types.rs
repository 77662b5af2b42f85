//! Id and time aliases shared across the critter crates.

/// Row id. Postgres hands these out per table; the in-memory store uses one
/// counter for every entity.
pub type DbId = i64;

/// A UTC instant, normally read from the engine's [`Clock`](crate::clock::Clock).
pub type Timestamp = chrono::DateTime<chrono::Utc>;

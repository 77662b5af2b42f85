use std::sync::Arc;

use critter_core::engine::Engine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Game engine over the configured store.
    pub engine: Arc<Engine>,
    /// Database pool when running on PostgreSQL; `None` on the in-memory store.
    pub pool: Option<critter_db::DbPool>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Event bus the engine publishes to.
    pub event_bus: Arc<critter_events::EventBus>,
}

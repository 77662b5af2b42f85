use axum::routing::get;
use axum::Router;

use crate::handlers::quest;
use crate::state::AppState;

/// ```text
/// GET    /quests/definitions                             -> definitions
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/quests/definitions", get(quest::definitions))
}

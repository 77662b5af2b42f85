use axum::routing::get;
use axum::Router;

use crate::handlers::leaderboard;
use crate::state::AppState;

/// ```text
/// GET    /leaderboards/level?limit=                      -> level
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/leaderboards/level", get(leaderboard::level))
}

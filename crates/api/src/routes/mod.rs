pub mod character;
pub mod health;
pub mod leaderboard;
pub mod quest;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /characters                                      create (POST)
/// /characters/login                                login (POST)
/// /characters/{id}                                 get
/// /characters/{id}/progression                     level, experience, coins
/// /characters/{id}/experience                      grant experience (POST)
/// /characters/{id}/poll                            accrue + settle quests (POST)
/// /characters/{id}/emotion                         set emotion (PUT)
/// /characters/{id}/stats                           merge stats (PUT)
/// /characters/{id}/evolution                       stage + requirements
/// /characters/{id}/evolve                          advance a stage (POST)
///
/// /characters/{id}/food                            inventory
/// /characters/{id}/food/accrue                     lenient accrual (POST)
/// /characters/{id}/food/generate                   strict accrual (POST)
/// /characters/{id}/food/convert                    tier conversion (POST)
/// /characters/{id}/food/{unit_id}/consume          eat one unit (POST)
///
/// /characters/{id}/boxes                           bonus boxes
/// /characters/{id}/boxes/{box_id}/open             open a box (POST)
///
/// /characters/{id}/quests                          quest board
/// /characters/{id}/quests/generate                 roll a new batch (POST)
/// /characters/{id}/quests/{quest_id}/accept        accept (POST)
/// /characters/{id}/quests/{quest_id}/reject        reject (POST)
/// /characters/{id}/quests/{quest_id}/complete      complete (POST)
///
/// /characters/{id}/achievements                    unlocked + stats
///
/// /characters/{id}/notifications                   newest first (?unread_only=)
/// /characters/{id}/notifications/{nid}/read        mark read (POST)
///
/// /quests/definitions                              quest templates
///
/// /leaderboards/level                              top characters (?limit=)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Characters and everything scoped to one.
        .merge(character::router())
        // Quest templates.
        .merge(quest::router())
        // Leaderboards.
        .merge(leaderboard::router())
}

//! Route definitions for characters and their sub-resources.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{achievement, boxes, character, food, notification, quest};
use crate::state::AppState;

/// Character routes, mounted under `/api/v1`.
///
/// ```text
/// POST   /characters                                     -> create
/// POST   /characters/login                               -> login
/// GET    /characters/{id}                                -> get_by_id
/// GET    /characters/{id}/progression                    -> progression
/// POST   /characters/{id}/experience                     -> grant_experience
/// POST   /characters/{id}/poll                           -> poll
/// PUT    /characters/{id}/emotion                        -> update_emotion
/// PUT    /characters/{id}/stats                          -> update_stats
/// GET    /characters/{id}/evolution                      -> evolution
/// POST   /characters/{id}/evolve                         -> evolve
///
/// GET    /characters/{id}/food                           -> inventory
/// POST   /characters/{id}/food/accrue                    -> accrue
/// POST   /characters/{id}/food/generate                  -> generate
/// POST   /characters/{id}/food/convert                   -> convert
/// POST   /characters/{id}/food/{unit_id}/consume         -> consume
///
/// GET    /characters/{id}/boxes                          -> list
/// POST   /characters/{id}/boxes/{box_id}/open            -> open
///
/// GET    /characters/{id}/quests                         -> board
/// POST   /characters/{id}/quests/generate                -> generate
/// POST   /characters/{id}/quests/{quest_id}/accept       -> accept
/// POST   /characters/{id}/quests/{quest_id}/reject       -> reject
/// POST   /characters/{id}/quests/{quest_id}/complete     -> complete
///
/// GET    /characters/{id}/achievements                   -> list
///
/// GET    /characters/{id}/notifications                  -> list
/// POST   /characters/{id}/notifications/{nid}/read       -> mark_read
/// ```
pub fn router() -> Router<AppState> {
    let character_routes = Router::new()
        .route("/characters", post(character::create))
        .route("/characters/login", post(character::login))
        .route("/characters/{id}", get(character::get_by_id))
        .route("/characters/{id}/progression", get(character::progression))
        .route("/characters/{id}/experience", post(character::grant_experience))
        .route("/characters/{id}/poll", post(character::poll))
        .route("/characters/{id}/emotion", put(character::update_emotion))
        .route("/characters/{id}/stats", put(character::update_stats))
        .route("/characters/{id}/evolution", get(character::evolution))
        .route("/characters/{id}/evolve", post(character::evolve));

    let food_routes = Router::new()
        .route("/characters/{id}/food", get(food::inventory))
        .route("/characters/{id}/food/accrue", post(food::accrue))
        .route("/characters/{id}/food/generate", post(food::generate))
        .route("/characters/{id}/food/convert", post(food::convert))
        .route(
            "/characters/{id}/food/{unit_id}/consume",
            post(food::consume),
        );

    let box_routes = Router::new()
        .route("/characters/{id}/boxes", get(boxes::list))
        .route("/characters/{id}/boxes/{box_id}/open", post(boxes::open));

    let quest_routes = Router::new()
        .route("/characters/{id}/quests", get(quest::board))
        .route("/characters/{id}/quests/generate", post(quest::generate))
        .route(
            "/characters/{id}/quests/{quest_id}/accept",
            post(quest::accept),
        )
        .route(
            "/characters/{id}/quests/{quest_id}/reject",
            post(quest::reject),
        )
        .route(
            "/characters/{id}/quests/{quest_id}/complete",
            post(quest::complete),
        );

    let notification_routes = Router::new()
        .route("/characters/{id}/notifications", get(notification::list))
        .route(
            "/characters/{id}/notifications/{notification_id}/read",
            post(notification::mark_read),
        );

    Router::new()
        .merge(character_routes)
        .merge(food_routes)
        .merge(box_routes)
        .merge(quest_routes)
        .merge(notification_routes)
        .route("/characters/{id}/achievements", get(achievement::list))
}

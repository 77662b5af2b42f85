#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use critter_api::config::ServerConfig;
use critter_api::router::build_app_router;
use critter_api::state::AppState;
use critter_core::clock::FixedClock;
use critter_core::config::EngineConfig;
use critter_core::engine::Engine;
use critter_core::memory_store::MemoryStore;
use critter_core::random::SequenceRandom;
use critter_events::{EventBus, EventPersistence};
use tokio_util::sync::CancellationToken;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        poll_interval_secs: 60,
        poll_active_window_hours: 24,
    }
}

/// Router plus the handles tests use to steer the game.
pub struct TestApp {
    pub router: Router,
    pub clock: Arc<FixedClock>,
    pub random: Arc<SequenceRandom>,
    pub event_bus: Arc<EventBus>,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router over the in-memory store.
///
/// Uses the same middleware stack as `main.rs` and runs event persistence
/// like production does. The clock starts at 2026-03-14 09:00 UTC and
/// unscripted random draws return `0.99`.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap(),
    ));
    let random = Arc::new(SequenceRandom::new(Vec::<f64>::new()));
    let event_bus = Arc::new(EventBus::default());

    let store = Arc::new(MemoryStore::new());
    tokio::spawn(EventPersistence::run(
        store.clone(),
        event_bus.subscribe(),
        CancellationToken::new(),
    ));

    let engine = Arc::new(Engine::new(
        store,
        clock.clone(),
        random.clone(),
        event_bus.clone(),
        EngineConfig::default(),
    ));

    let state = AppState {
        engine,
        pool: None,
        config: Arc::new(config.clone()),
        event_bus: event_bus.clone(),
    };

    TestApp {
        router: build_app_router(state, &config),
        clock,
        random,
        event_bus,
    }
}

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create a character through the API and return the `data` payload.
pub async fn create_character(app: Router, name: &str) -> serde_json::Value {
    let body = serde_json::json!({
        "name": name,
        "password": "secret-pass",
        "species": "hamster",
        "job": "scholar",
    });
    let response = post_json(app, "/api/v1/characters", body).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

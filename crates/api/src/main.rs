use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use critter_core::clock::SystemClock;
use critter_core::config::EngineConfig;
use critter_core::engine::Engine;
use critter_core::random::ThreadRandom;
use critter_core::store::Store;
use critter_db::PgStore;
use critter_events::{AchievementTracker, EventBus, EventPersistence};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use critter_api::background::accrual_poll;
use critter_api::config::ServerConfig;
use critter_api::router::build_app_router;
use critter_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "critter_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let engine_config = EngineConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        food_interval_secs = engine_config.food_interval_secs,
        food_cap = engine_config.food_cap,
        "Loaded engine configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = critter_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    critter_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    critter_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    tracing::info!("Event bus created");

    // --- Engine ---
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
    let engine = Arc::new(Engine::new(
        Arc::clone(&store),
        Arc::new(SystemClock),
        Arc::new(ThreadRandom),
        event_bus.clone(),
        engine_config,
    ));

    // --- Background services ---
    let cancel = CancellationToken::new();

    let persistence_handle = tokio::spawn(EventPersistence::run(
        store,
        event_bus.subscribe(),
        cancel.clone(),
    ));

    let tracker = AchievementTracker::new(Arc::clone(&engine));
    let tracker_handle = tokio::spawn({
        let receiver = event_bus.subscribe();
        let cancel = cancel.clone();
        async move { tracker.run(receiver, cancel).await }
    });

    let poll_handle = tokio::spawn(accrual_poll::run(
        Arc::clone(&engine),
        Duration::from_secs(config.poll_interval_secs),
        chrono::Duration::hours(config.poll_active_window_hours),
        cancel.clone(),
    ));

    tracing::info!("Background services started (event persistence, achievements, accrual poll)");

    // --- App state ---
    let state = AppState {
        engine,
        pool: Some(pool),
        config: Arc::new(config.clone()),
        event_bus: Arc::clone(&event_bus),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    let _ = tokio::time::timeout(grace, poll_handle).await;
    let _ = tokio::time::timeout(grace, tracker_handle).await;
    let _ = tokio::time::timeout(grace, persistence_handle).await;
    tracing::info!("Background services stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

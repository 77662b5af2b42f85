//! Periodic accrual and quest settlement for active characters.
//!
//! Food keeps accruing and accepted quests keep running while nobody is
//! looking. This job polls every character played within the active window
//! on a fixed interval so their stock and quests are settled without waiting
//! for the next request.

use std::sync::Arc;
use std::time::Duration;

use critter_core::engine::Engine;
use tokio_util::sync::CancellationToken;

/// Run the accrual poll loop until `cancel` is triggered.
pub async fn run(
    engine: Arc<Engine>,
    interval: Duration,
    active_window: chrono::Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        active_window_hours = active_window.num_hours(),
        "Accrual poll job started"
    );

    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Accrual poll job stopping");
                break;
            }
            _ = interval.tick() => {
                match engine.poll_active_characters(active_window).await {
                    Ok(summary) => {
                        if summary.failed > 0 {
                            tracing::warn!(
                                polled = summary.polled,
                                failed = summary.failed,
                                "Accrual poll: some characters failed"
                            );
                        } else if summary.polled > 0 {
                            tracing::debug!(
                                polled = summary.polled,
                                "Accrual poll: characters settled"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            "Accrual poll: listing active characters failed"
                        );
                    }
                }
            }
        }
    }
}

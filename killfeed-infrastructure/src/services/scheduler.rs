use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

use killfeed_application::commands::refresh_all;
use killfeed_application::AppState;

/// Runs a refresh tick every `tick_interval_seconds` until `shutdown` flips.
/// A slow tick shortens the following pause instead of stacking ticks.
pub async fn schedule_ticks(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(state.config.tick_interval_seconds.max(1));
    info!(period_secs = period.as_secs(), "ingestion scheduler started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let started = Instant::now();
        match refresh_all(&state).await {
            Ok(tick) => debug!(
                servers = tick.servers,
                skipped = tick.skipped,
                failed = tick.failed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "tick finished"
            ),
            Err(err) => error!(error = %err, "tick failed"),
        }
        tokio::select! {
            _ = sleep(next_delay(started.elapsed(), period)) => {}
            _ = shutdown.changed() => break,
        }
    }
    info!("ingestion scheduler stopped");
}

pub fn next_delay(elapsed: Duration, period: Duration) -> Duration {
    period.saturating_sub(elapsed).max(Duration::from_secs(1))
}

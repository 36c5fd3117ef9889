use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use killfeed_application::commands::{cancel_reconcile, refresh_all};
use killfeed_application::AppState;
use killfeed_infrastructure::{schedule_ticks, AppConfig};
use killfeed_interfaces_http::build_router;

use crate::context::AppContext;

fn build_router_with_layers(state: AppState) -> Router {
    build_router(state.clone())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(
            state.config.request_timeout_seconds.max(1),
        )))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(config: AppConfig) -> Result<()> {
    let context = AppContext::new(config).await?;
    let state = context.state;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(schedule_ticks(state.clone(), shutdown_rx));

    let app = build_router_with_layers(state.clone());
    let addr: std::net::SocketAddr = state.config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(err) = scheduler.await {
        warn!(error = %err, "scheduler task ended abnormally");
    }
    release(&state).await;
    Ok(())
}

/// Single tick for cron-style deployments.
pub async fn run_once(config: AppConfig) -> Result<()> {
    let context = AppContext::new(config).await?;
    let state = context.state;
    let tick = refresh_all(&state).await;
    release(&state).await;
    let tick = tick?;
    info!(servers = tick.servers, skipped = tick.skipped, failed = tick.failed, "tick complete");
    Ok(())
}

async fn release(state: &AppState) {
    for progress in state.reconciles.running().await {
        if let Err(err) = cancel_reconcile(state, progress.guild_id, &progress.server_id).await {
            warn!(guild = %progress.guild_id, server = %progress.server_id, error = %err, "cancelling reconcile failed");
        }
    }
    state.pool.close();
    let remote = state.remote.clone();
    if let Err(err) = tokio::task::spawn_blocking(move || remote.close_all()).await {
        warn!(error = %err, "closing remote connections failed");
    }
    info!("shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "sigterm handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

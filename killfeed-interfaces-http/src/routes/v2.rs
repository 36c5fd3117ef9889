use axum::routing::{get, post};
use axum::Router;

use killfeed_application::AppState;

use crate::handlers::{ops_handlers, server_handlers};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v2/ops/health/live", get(ops_handlers::health_live))
        .route("/v2/ops/health/ready", get(ops_handlers::health_ready))
        .route(
            "/v2/ops/metrics/prometheus",
            get(ops_handlers::metrics_prometheus),
        )
        .route("/v2/ops/reconciles", get(ops_handlers::running_reconciles))
        .route(
            "/v2/servers/:guild/:server/sessions",
            get(server_handlers::get_sessions),
        )
        .route(
            "/v2/servers/:guild/:server/refresh",
            post(server_handlers::refresh),
        )
        .route(
            "/v2/servers/:guild/:server/reconcile",
            post(server_handlers::post_reconcile)
                .get(server_handlers::get_reconcile)
                .delete(server_handlers::delete_reconcile),
        )
        .route(
            "/v2/servers/:guild/:server/parser-state/:kind/reset",
            post(server_handlers::reset_parser),
        )
        .with_state(state)
}

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use killfeed_application::commands::{
    cancel_reconcile, parse_kind, refresh_server, reset_parser_state, start_reconcile,
    RefreshReport,
};
use killfeed_application::ops::ReconcileStatus;
use killfeed_application::queries::{get_reconcile_status, list_sessions, SessionsView};
use killfeed_application::AppState;
use killfeed_domain::{GuildId, ParserState, ReconcileProgress, ServerId};

use crate::error::HttpError;
use crate::middleware::authorize;

#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    #[serde(default)]
    pub include_offline: bool,
}

fn server_path(guild: u64, server: String) -> (GuildId, ServerId) {
    (GuildId(guild), ServerId::new(server))
}

pub async fn get_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((guild, server)): Path<(u64, String)>,
    Query(query): Query<SessionsQuery>,
) -> Result<Json<SessionsView>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let (guild_id, server_id) = server_path(guild, server);
    let view = list_sessions(&state, guild_id, &server_id, query.include_offline).await?;
    Ok(Json(view))
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((guild, server)): Path<(u64, String)>,
) -> Result<Json<RefreshReport>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let (guild_id, server_id) = server_path(guild, server);
    info!(guild = %guild_id, server = %server_id, "manual refresh requested");
    let report = refresh_server(&state, guild_id, &server_id).await?;
    Ok(Json(report))
}

pub async fn post_reconcile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((guild, server)): Path<(u64, String)>,
) -> Result<(StatusCode, Json<ReconcileProgress>), HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let (guild_id, server_id) = server_path(guild, server);
    let progress = start_reconcile(&state, guild_id, &server_id).await?;
    Ok((StatusCode::ACCEPTED, Json(progress)))
}

pub async fn get_reconcile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((guild, server)): Path<(u64, String)>,
) -> Result<Json<ReconcileStatus>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let (guild_id, server_id) = server_path(guild, server);
    Ok(Json(get_reconcile_status(&state, guild_id, &server_id).await?))
}

pub async fn delete_reconcile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((guild, server)): Path<(u64, String)>,
) -> Result<StatusCode, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let (guild_id, server_id) = server_path(guild, server);
    cancel_reconcile(&state, guild_id, &server_id).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn reset_parser(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((guild, server, kind)): Path<(u64, String, String)>,
) -> Result<Json<ParserState>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let (guild_id, server_id) = server_path(guild, server);
    let kind = parse_kind(&kind)?;
    state.find_server(guild_id, &server_id).await?;
    let reset = reset_parser_state(&state, guild_id, &server_id, kind).await?;
    info!(guild = %guild_id, server = %server_id, kind = %kind, "parser state reset");
    Ok(Json(reset))
}

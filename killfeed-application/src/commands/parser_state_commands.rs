use killfeed_domain::{GuildId, ParserKind, ParserState, ParserStateKey, ServerId};
use tracing::info;

use crate::parser_state_store::HealReport;
use crate::{AppError, AppState};

/// Explicit reset: the next pass of this kind runs cold. Resetting the
/// presence parser also drops the server's session rows.
pub async fn reset_parser_state(
    state: &AppState,
    guild_id: GuildId,
    server_id: &ServerId,
    kind: ParserKind,
) -> Result<ParserState, AppError> {
    let key = ParserStateKey::new(guild_id, server_id.clone(), kind);
    let _guard = state.locks.lock(&key).await;

    let reset = state.parser_states().reset(&key).await?;
    if kind == ParserKind::Presence {
        state.session_repo.delete_sessions(guild_id, server_id).await?;
        info!(key = %key, "sessions dropped with parser reset");
    }
    Ok(reset)
}

/// Startup migration over the parser-state table.
pub async fn heal_parser_states(state: &AppState) -> Result<HealReport, AppError> {
    Ok(state.parser_states().heal_duplicates().await?)
}

pub fn parse_kind(raw: &str) -> Result<ParserKind, AppError> {
    raw.parse::<ParserKind>()
        .map_err(|err| AppError::BadRequest(err.to_string()))
}

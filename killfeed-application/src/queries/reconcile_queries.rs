use killfeed_domain::{GuildId, ReconcileProgress, ServerId, ServerKey};

use crate::ops::ReconcileStatus;
use crate::{AppError, AppState};

pub async fn get_reconcile_status(
    state: &AppState,
    guild_id: GuildId,
    server_id: &ServerId,
) -> Result<ReconcileStatus, AppError> {
    let key = ServerKey::new(guild_id, server_id.clone());
    state
        .reconciles
        .status(&key)
        .await
        .ok_or_else(|| AppError::NotFound(format!("no reconciliation recorded for {}", key)))
}

pub async fn list_running_reconciles(state: &AppState) -> Vec<ReconcileProgress> {
    state.reconciles.running().await
}

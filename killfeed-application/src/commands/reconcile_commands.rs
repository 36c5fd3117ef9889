use killfeed_domain::{GuildId, ReconcileProgress, ReconcileSummary, ServerId, ServerKey, ServerSource};
use tracing::info;

use crate::ingest::reconcile_server;
use crate::ops::ReconcileHandle;
use crate::{AppError, AppState};

/// Starts a background reconciliation and returns its initial progress.
/// A second request for a server that is already reconciling is a conflict.
pub async fn start_reconcile(state: &AppState, guild_id: GuildId, server_id: &ServerId) -> Result<ReconcileProgress, AppError> {
    let source = state.find_server(guild_id, server_id).await?;
    source.validate()?;
    let handle = begin(state, &source).await?;
    let progress = handle.snapshot();

    let task_state = state.clone();
    tokio::spawn(async move {
        let summary = reconcile_server(&task_state, &source, &handle).await;
        task_state.reconciles.finish(&source.key(), summary).await;
    });
    Ok(progress)
}

/// Runs a reconciliation to completion on the caller's task.
pub async fn reconcile_now(state: &AppState, source: &ServerSource) -> Result<ReconcileSummary, AppError> {
    source.validate()?;
    let handle = begin(state, source).await?;
    let summary = reconcile_server(state, source, &handle).await;
    state.reconciles.finish(&source.key(), summary.clone()).await;
    Ok(summary)
}

pub async fn cancel_reconcile(state: &AppState, guild_id: GuildId, server_id: &ServerId) -> Result<(), AppError> {
    let key = ServerKey::new(guild_id, server_id.clone());
    if state.reconciles.cancel(&key).await {
        info!(server = %key, "reconciliation cancel requested");
        Ok(())
    } else {
        Err(AppError::NotFound(format!("no running reconciliation for {}", key)))
    }
}

async fn begin(state: &AppState, source: &ServerSource) -> Result<ReconcileHandle, AppError> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let handle = state.reconciles.begin(&source.key(), &run_id).await?;
    info!(server = %source.key(), run_id = %run_id, "reconciliation started");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use killfeed_domain::{ReconcileOutcome, ReconcilePhase};

    #[tokio::test]
    async fn inline_run_records_summary() {
        let harness = Harness::new();
        harness.remote.put(
            &format!("{}/2024.01.15-09.00.00.csv", harness.kill_dir()),
            "2024.01.15-09.00.00;Foo;A;Bar;B;AK;50\n",
        );
        let summary = reconcile_now(&harness.state, &harness.source).await.expect("run");
        assert_eq!(summary.outcome, ReconcileOutcome::Completed);

        let status = harness.state.reconciles.status(&harness.source.key()).await.expect("status");
        assert_eq!(status.progress.phase, ReconcilePhase::Completed);
        assert_eq!(status.summary.expect("summary").applied_rows, 1);
    }

    #[tokio::test]
    async fn background_run_completes() {
        let harness = Harness::new();
        harness.remote.put(
            &format!("{}/2024.01.15-09.00.00.csv", harness.kill_dir()),
            "2024.01.15-09.00.00;Foo;A;Bar;B;AK;50\n",
        );
        let key = harness.source.key();
        start_reconcile(&harness.state, key.guild_id, &key.server_id).await.expect("start");

        let mut rx = harness.state.reconciles.subscribe(&key).await.expect("subscribe");
        rx.wait_for(|progress| progress.phase.is_finished()).await.expect("finished");
        assert_eq!(harness.kills.kill_count(), 1);
    }

    #[tokio::test]
    async fn cancel_without_run_is_not_found() {
        let harness = Harness::new();
        let key = harness.source.key();
        let result = cancel_reconcile(&harness.state, key.guild_id, &key.server_id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}

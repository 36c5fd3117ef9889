use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use tracing::error;

use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Unset,
    Error,
    Timeout,
}

#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub database: CheckStatus,
    pub notify_target: CheckStatus,
    pub running_reconciles: usize,
}

impl Readiness {
    /// The notification target is advisory; only the store gates readiness.
    pub fn is_ready(&self) -> bool {
        self.database == CheckStatus::Ok
    }
}

pub async fn check_readiness(state: &AppState) -> Readiness {
    let limit = Duration::from_secs(state.config.request_timeout_seconds.max(1));
    let database = match timeout(limit, state.health.check_database()).await {
        Ok(Ok(true)) => CheckStatus::Ok,
        Ok(Ok(false)) => CheckStatus::Error,
        Ok(Err(err)) => {
            error!(error = %err, "ready check failed");
            CheckStatus::Error
        }
        Err(_) => {
            error!(seconds = limit.as_secs(), "ready check timed out");
            CheckStatus::Timeout
        }
    };
    let notify_target = match timeout(limit, state.health.check_notify_target()).await {
        Ok(Ok(true)) => CheckStatus::Ok,
        Ok(Ok(false)) => CheckStatus::Unset,
        Ok(Err(err)) => {
            error!(error = %err, "notify target check failed");
            CheckStatus::Error
        }
        Err(_) => CheckStatus::Timeout,
    };
    Readiness {
        database,
        notify_target,
        running_reconciles: state.reconciles.running().await.len(),
    }
}

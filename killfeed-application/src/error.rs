use killfeed_domain::SourceError;
use thiserror::Error;

use crate::dispatch::DispatchError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::TimedOut { .. } => AppError::Timeout(err.to_string()),
            other => AppError::Internal(other.into()),
        }
    }
}

// Remote source error taxonomy

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("remote path not found: {0}")]
    NotFound(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("authentication rejected: {0}")]
    Authentication(String),
    #[error("remote operation timed out: {0}")]
    Timeout(String),
    #[error("could not decode {path} with any of [{tried}]")]
    Decode { path: String, tried: String },
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SourceError {
    /// Terminal errors are not retried; the server is skipped until its configuration changes.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SourceError::Authentication(_) | SourceError::Configuration(_)
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Connection(_) | SourceError::Timeout(_))
    }
}

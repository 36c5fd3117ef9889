// Killfeed Application Layer

pub mod commands;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod ops;
pub mod parser_state_store;
pub mod queries;
pub mod router;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use error::AppError;
pub use metrics::Metrics;
pub use state::{AppState, Collaborators};

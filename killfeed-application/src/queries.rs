// Queries: read-only views
pub mod health_queries;
pub mod reconcile_queries;
pub mod session_queries;

pub use health_queries::*;
pub use reconcile_queries::*;
pub use session_queries::*;

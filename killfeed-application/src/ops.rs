// Long-running operation bookkeeping
pub mod reconcile_registry;

pub use reconcile_registry::*;

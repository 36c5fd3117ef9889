// Concurrency/dispatch layer: bounded worker pool and per-key locks
pub mod keyed_lock;
pub mod worker_pool;

pub use keyed_lock::*;
pub use worker_pool::*;

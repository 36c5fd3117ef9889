pub mod health_service;
pub mod scheduler;
pub mod webhook_sink;

pub use health_service::*;
pub use scheduler::*;
pub use webhook_sink::*;

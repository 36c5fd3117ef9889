pub mod context;
pub mod lifecycle;
pub mod telemetry;

pub use lifecycle::run;
pub use telemetry::init_tracing;

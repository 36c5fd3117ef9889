// Domain value objects
pub mod identifiers;
pub mod log_timestamp;
pub mod platform;

pub use identifiers::*;
pub use log_timestamp::*;
pub use platform::*;

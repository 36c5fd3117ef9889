pub mod ops_handlers;
pub mod server_handlers;

pub use ops_handlers::*;
pub use server_handlers::*;

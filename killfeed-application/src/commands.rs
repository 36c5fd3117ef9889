// Commands: operations that mutate state
pub mod parser_state_commands;
pub mod reconcile_commands;
pub mod refresh_commands;

pub use parser_state_commands::*;
pub use reconcile_commands::*;
pub use refresh_commands::*;

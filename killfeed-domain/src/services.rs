// Domain services
pub mod classifier;
pub mod kill_ledger;
pub mod kill_row;
pub mod session_machine;

pub use classifier::*;
pub use kill_ledger::*;
pub use kill_row::*;
pub use session_machine::*;

// Log ingestion: live-log replay, killfeed tail and historical reconciliation
pub mod archive;
pub mod killfeed_tail;
pub mod reconciler;
pub mod replay;

pub use archive::*;
pub use killfeed_tail::*;
pub use reconciler::*;
pub use replay::*;

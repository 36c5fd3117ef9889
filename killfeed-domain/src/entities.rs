// Domain entities
pub mod channel_binding;
pub mod kill_record;
pub mod log_event;
pub mod notification;
pub mod parser_state;
pub mod player_session;
pub mod reconcile;
pub mod runtime_config;
pub mod server_source;

pub use channel_binding::*;
pub use kill_record::*;
pub use log_event::*;
pub use notification::*;
pub use parser_state::*;
pub use player_session::*;
pub use reconcile::*;
pub use runtime_config::*;
pub use server_source::*;

pub mod credentials;
pub mod encoding;
pub mod sftp_source;
pub mod transport;

pub use encoding::TextDecoder;
pub use sftp_source::*;

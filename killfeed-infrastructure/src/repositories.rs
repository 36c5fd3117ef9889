pub mod clickhouse_repo;
pub mod clickhouse_rows;
pub mod config_files;

pub use clickhouse_repo::*;
pub use config_files::*;

// Runtime configuration shared across layers

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub bind_addr: String,
    pub api_token: Option<String>,
    pub servers_path: String,
    pub notify_webhook_url: Option<String>,
    pub presence_webhook_url: Option<String>,
    pub tick_interval_seconds: u64,
    pub worker_threads: usize,
    pub blocking_timeout_seconds: u64,
    pub reconcile_batch_size: usize,
    pub request_timeout_seconds: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3240".to_string(),
            api_token: None,
            servers_path: "./servers.yaml".to_string(),
            notify_webhook_url: None,
            presence_webhook_url: None,
            tick_interval_seconds: 60,
            worker_threads: 4,
            blocking_timeout_seconds: 120,
            reconcile_batch_size: 500,
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub clickhouse_url: String,
    pub clickhouse_database: String,
    pub clickhouse_user: Option<String>,
    pub clickhouse_password: Option<String>,
}

/// Settings of the remote file-transfer reader.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub retry_attempts: u32,
    pub retry_base_ms: u64,
    pub connect_timeout_seconds: u64,
    pub encodings: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_base_ms: 1_000,
            connect_timeout_seconds: 15,
            encodings: vec![
                "utf-8".to_string(),
                "utf-16le".to_string(),
                "windows-1252".to_string(),
            ],
        }
    }
}

use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use killfeed_domain::{DbConfig, RemoteConfig, RuntimeConfig};

use crate::config::validation::{validate_encodings, validate_url};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub api_token: Option<String>,
    pub servers_path: String,
    pub clickhouse_url: String,
    pub clickhouse_database: String,
    pub clickhouse_user: Option<String>,
    pub clickhouse_password: Option<String>,
    pub notify_webhook_url: Option<String>,
    pub presence_webhook_url: Option<String>,
    pub tick_interval_seconds: u64,
    pub worker_threads: usize,
    pub blocking_timeout_seconds: u64,
    pub remote_retry_attempts: u32,
    pub remote_retry_base_ms: u64,
    pub remote_connect_timeout_seconds: u64,
    pub remote_encodings: Vec<String>,
    pub reconcile_batch_size: usize,
    pub request_timeout_seconds: u64,
    pub log_format: LogFormat,
    pub log_dir: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let runtime = RuntimeConfig::default();
        let remote = RemoteConfig::default();
        Self {
            bind_addr: runtime.bind_addr,
            api_token: None,
            servers_path: runtime.servers_path,
            clickhouse_url: "http://127.0.0.1:8123".to_string(),
            clickhouse_database: "killfeed".to_string(),
            clickhouse_user: None,
            clickhouse_password: None,
            notify_webhook_url: None,
            presence_webhook_url: None,
            tick_interval_seconds: runtime.tick_interval_seconds,
            worker_threads: runtime.worker_threads,
            blocking_timeout_seconds: runtime.blocking_timeout_seconds,
            remote_retry_attempts: remote.retry_attempts,
            remote_retry_base_ms: remote.retry_base_ms,
            remote_connect_timeout_seconds: remote.connect_timeout_seconds,
            remote_encodings: remote.encodings,
            reconcile_batch_size: runtime.reconcile_batch_size,
            request_timeout_seconds: runtime.request_timeout_seconds,
            log_format: LogFormat::Text,
            log_dir: None,
        }
    }
}

impl AppConfig {
    pub async fn load() -> Result<Self> {
        let path = env::var("KILLFEED_CONFIG").unwrap_or_else(|_| "./config.toml".to_string());
        Self::load_from(&path).await
    }

    pub async fn load_from(path: &str) -> Result<Self> {
        let file_path = Path::new(path);
        let base_dir = file_path.parent();
        let mut config = if file_path.exists() {
            let content = fs::read_to_string(file_path).await?;
            Self::from_toml(&content)?
        } else {
            warn!(path = %path, "config file not found, using defaults");
            AppConfig::default()
        };
        config.apply_env_overrides();
        config.resolve_paths(base_dir);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn normalize(&mut self) {
        self.api_token = blank_to_none(self.api_token.take());
        self.clickhouse_user = blank_to_none(self.clickhouse_user.take());
        self.clickhouse_password = blank_to_none(self.clickhouse_password.take());
        self.notify_webhook_url = blank_to_none(self.notify_webhook_url.take());
        self.presence_webhook_url = blank_to_none(self.presence_webhook_url.take());
        self.log_dir = blank_to_none(self.log_dir.take());
        self.remote_encodings = normalize_encodings(std::mem::take(&mut self.remote_encodings));
        if self.remote_encodings.is_empty() {
            self.remote_encodings = RemoteConfig::default().encodings;
        }
        self.worker_threads = self.worker_threads.max(1);
        self.reconcile_batch_size = self.reconcile_batch_size.max(1);
        self.remote_retry_attempts = self.remote_retry_attempts.max(1);
    }

    fn resolve_paths(&mut self, base_dir: Option<&Path>) {
        let Some(base) = base_dir else {
            return;
        };
        self.servers_path = resolve_path(base, &self.servers_path);
        if let Some(log_dir) = &self.log_dir {
            self.log_dir = Some(resolve_path(base, log_dir));
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|err| anyhow!("invalid bind_addr: {}", err))?;
        if self.servers_path.trim().is_empty() {
            return Err(anyhow!("servers_path must not be empty"));
        }
        if self.clickhouse_database.trim().is_empty()
            || !self
                .clickhouse_database
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(anyhow!(
                "clickhouse_database must be a plain identifier, got '{}'",
                self.clickhouse_database
            ));
        }
        validate_url("clickhouse_url", &self.clickhouse_url)?;
        if let Some(url) = &self.notify_webhook_url {
            validate_url("notify_webhook_url", url)?;
        }
        if let Some(url) = &self.presence_webhook_url {
            validate_url("presence_webhook_url", url)?;
        }
        if self.tick_interval_seconds == 0 {
            return Err(anyhow!("tick_interval_seconds must be greater than 0"));
        }
        if self.blocking_timeout_seconds == 0 {
            return Err(anyhow!("blocking_timeout_seconds must be greater than 0"));
        }
        validate_encodings(&self.remote_encodings)?;
        Ok(())
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            bind_addr: self.bind_addr.clone(),
            api_token: self.api_token.clone(),
            servers_path: self.servers_path.clone(),
            notify_webhook_url: self.notify_webhook_url.clone(),
            presence_webhook_url: self.presence_webhook_url.clone(),
            tick_interval_seconds: self.tick_interval_seconds,
            worker_threads: self.worker_threads,
            blocking_timeout_seconds: self.blocking_timeout_seconds,
            reconcile_batch_size: self.reconcile_batch_size,
            request_timeout_seconds: self.request_timeout_seconds,
        }
    }

    pub fn to_db_config(&self) -> DbConfig {
        DbConfig {
            clickhouse_url: self.clickhouse_url.clone(),
            clickhouse_database: self.clickhouse_database.clone(),
            clickhouse_user: self.clickhouse_user.clone(),
            clickhouse_password: self.clickhouse_password.clone(),
        }
    }

    pub fn to_remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            retry_attempts: self.remote_retry_attempts,
            retry_base_ms: self.remote_retry_base_ms,
            connect_timeout_seconds: self.remote_connect_timeout_seconds,
            encodings: self.remote_encodings.clone(),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("KILLFEED_BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Ok(value) = env::var("KILLFEED_API_TOKEN") {
            self.api_token = Some(value);
        }
        if let Ok(value) = env::var("KILLFEED_SERVERS_PATH") {
            self.servers_path = value;
        }
        if let Ok(value) = env::var("KILLFEED_CLICKHOUSE_URL") {
            self.clickhouse_url = value;
        }
        if let Ok(value) = env::var("KILLFEED_CLICKHOUSE_DATABASE") {
            self.clickhouse_database = value;
        }
        if let Ok(value) = env::var("KILLFEED_CLICKHOUSE_USER") {
            self.clickhouse_user = Some(value);
        }
        if let Ok(value) = env::var("KILLFEED_CLICKHOUSE_PASSWORD") {
            self.clickhouse_password = Some(value);
        }
        if let Ok(value) = env::var("KILLFEED_NOTIFY_WEBHOOK_URL") {
            self.notify_webhook_url = Some(value);
        }
        if let Ok(value) = env::var("KILLFEED_PRESENCE_WEBHOOK_URL") {
            self.presence_webhook_url = Some(value);
        }
        if let Ok(value) = env::var("KILLFEED_TICK_INTERVAL_SECONDS") {
            self.tick_interval_seconds = value.parse().unwrap_or(self.tick_interval_seconds);
        }
        if let Ok(value) = env::var("KILLFEED_WORKER_THREADS") {
            self.worker_threads = value.parse().unwrap_or(self.worker_threads);
        }
        if let Ok(value) = env::var("KILLFEED_BLOCKING_TIMEOUT_SECONDS") {
            self.blocking_timeout_seconds = value.parse().unwrap_or(self.blocking_timeout_seconds);
        }
        if let Ok(value) = env::var("KILLFEED_REMOTE_RETRY_ATTEMPTS") {
            self.remote_retry_attempts = value.parse().unwrap_or(self.remote_retry_attempts);
        }
        if let Ok(value) = env::var("KILLFEED_REMOTE_RETRY_BASE_MS") {
            self.remote_retry_base_ms = value.parse().unwrap_or(self.remote_retry_base_ms);
        }
        if let Ok(value) = env::var("KILLFEED_REMOTE_CONNECT_TIMEOUT_SECONDS") {
            self.remote_connect_timeout_seconds =
                value.parse().unwrap_or(self.remote_connect_timeout_seconds);
        }
        if let Ok(value) = env::var("KILLFEED_REMOTE_ENCODINGS") {
            self.remote_encodings = parse_env_list(&value);
        }
        if let Ok(value) = env::var("KILLFEED_RECONCILE_BATCH_SIZE") {
            self.reconcile_batch_size = value.parse().unwrap_or(self.reconcile_batch_size);
        }
        if let Ok(value) = env::var("KILLFEED_REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = value.parse().unwrap_or(self.request_timeout_seconds);
        }
        if let Ok(value) = env::var("KILLFEED_LOG_FORMAT") {
            if value.trim().eq_ignore_ascii_case("json") {
                self.log_format = LogFormat::Json;
            } else {
                self.log_format = LogFormat::Text;
            }
        }
        if let Ok(value) = env::var("KILLFEED_LOG_DIR") {
            self.log_dir = Some(value);
        }
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn resolve_path(base: &Path, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }
    let path = Path::new(trimmed);
    if path.is_absolute() {
        trimmed.to_string()
    } else {
        base.join(path).to_string_lossy().to_string()
    }
}

fn parse_env_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn normalize_encodings(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let label = value.trim().to_lowercase();
        if !label.is_empty() && !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use killfeed_domain::{
    ChannelId, ConfigRepository, EventCategory, GuildChannels, GuildId, ServerId, ServerSource,
    DEFAULT_KILL_LOG_DIR_TEMPLATE, DEFAULT_KILL_LOG_PATTERN, DEFAULT_LIVE_LOG_TEMPLATE,
};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ServersFile {
    servers: Vec<ServerEntry>,
    guilds: Vec<GuildEntry>,
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    guild_id: u64,
    server_id: String,
    #[serde(default)]
    name: String,
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    username: String,
    credential: String,
    live_log: Option<String>,
    kill_log_dir: Option<String>,
    kill_log_pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GuildEntry {
    guild_id: u64,
    fallback_channel: Option<u64>,
    #[serde(default)]
    defaults: HashMap<String, u64>,
    #[serde(default)]
    legacy: HashMap<String, u64>,
    #[serde(default)]
    servers: HashMap<String, HashMap<String, u64>>,
}

fn default_port() -> u16 {
    22
}

/// Reads servers and channel bindings from the YAML file on every call, so
/// edits apply on the next tick.
pub struct ConfigFileRepository {
    path: PathBuf,
}

impl ConfigFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<ServersFile> {
        if !Path::new(&self.path).exists() {
            warn!(path = %self.path.display(), "servers file not found, no servers configured");
            return Ok(ServersFile::default());
        }
        let content = fs::read_to_string(&self.path).await?;
        parse_servers_file(&content)
    }
}

fn parse_servers_file(content: &str) -> Result<ServersFile> {
    if content.trim().is_empty() {
        return Ok(ServersFile::default());
    }
    let file: ServersFile = serde_yaml::from_str(content)?;
    let mut seen = HashSet::new();
    for entry in &file.servers {
        if !seen.insert((entry.guild_id, entry.server_id.trim().to_string())) {
            return Err(anyhow!(
                "server {}/{} is configured twice",
                entry.guild_id,
                entry.server_id
            ));
        }
    }
    Ok(file)
}

fn to_source(entry: ServerEntry) -> ServerSource {
    ServerSource {
        guild_id: GuildId(entry.guild_id),
        server_id: ServerId::new(entry.server_id),
        name: entry.name.trim().to_string(),
        host: entry.host.trim().to_string(),
        port: entry.port,
        username: entry.username,
        credential_ref: entry.credential,
        live_log_template: entry
            .live_log
            .unwrap_or_else(|| DEFAULT_LIVE_LOG_TEMPLATE.to_string()),
        kill_log_dir_template: entry
            .kill_log_dir
            .unwrap_or_else(|| DEFAULT_KILL_LOG_DIR_TEMPLATE.to_string()),
        kill_log_pattern: entry
            .kill_log_pattern
            .unwrap_or_else(|| DEFAULT_KILL_LOG_PATTERN.to_string()),
    }
}

fn parse_category(raw: &str) -> Result<EventCategory> {
    let wanted = raw.trim().to_lowercase();
    EventCategory::ALL
        .into_iter()
        .find(|category| category.as_str() == wanted)
        .ok_or_else(|| anyhow!("unknown event category '{}'", raw))
}

fn category_map(raw: &HashMap<String, u64>) -> Result<HashMap<EventCategory, ChannelId>> {
    raw.iter()
        .map(|(name, channel)| Ok((parse_category(name)?, ChannelId(*channel))))
        .collect()
}

fn to_channels(entry: &GuildEntry) -> Result<GuildChannels> {
    let mut server_bindings = HashMap::new();
    for (server_id, bindings) in &entry.servers {
        server_bindings.insert(ServerId::new(server_id.as_str()), category_map(bindings)?);
    }
    Ok(GuildChannels {
        guild_id: GuildId(entry.guild_id),
        server_bindings,
        default_bindings: category_map(&entry.defaults)?,
        legacy_bindings: entry
            .legacy
            .iter()
            .map(|(key, channel)| (key.trim().to_lowercase(), ChannelId(*channel)))
            .collect(),
        fallback_channel: entry.fallback_channel.map(ChannelId),
    })
}

#[async_trait]
impl ConfigRepository for ConfigFileRepository {
    async fn load_servers(&self) -> anyhow::Result<Vec<ServerSource>> {
        let file = self.read().await?;
        Ok(file.servers.into_iter().map(to_source).collect())
    }

    async fn load_guild_channels(&self, guild_id: GuildId) -> anyhow::Result<Option<GuildChannels>> {
        let file = self.read().await?;
        file.guilds
            .iter()
            .find(|entry| entry.guild_id == guild_id.0)
            .map(to_channels)
            .transpose()
    }
}

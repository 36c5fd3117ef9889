// In-memory fakes of every port, for orchestration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use killfeed_domain::ports::{
    ConfigRepository, HealthCheckService, KillRepository, NotificationSink,
    ParserStateRepository, PlayerSessionRepository, PresenceOutcome, PresenceSink, RemoteEntry, RemoteSource, RemoteText,
};
use killfeed_domain::{
    ChannelId, Delivery, GuildChannels, GuildId, KillRecord, ParserState, ParserStateKey,
    PlayerId, PlayerSession, PlayerStats, PresenceSnapshot, RuntimeConfig, ServerId, ServerKey,
    ServerSource, SessionState, SourceError, DEFAULT_KILL_LOG_DIR_TEMPLATE,
    DEFAULT_KILL_LOG_PATTERN, DEFAULT_LIVE_LOG_TEMPLATE,
};

use crate::state::Collaborators;
use crate::AppState;

#[derive(Default)]
pub struct InMemoryParserStates {
    records: Mutex<Vec<ParserState>>,
}

impl InMemoryParserStates {
    /// Inserts without replacing, to simulate duplicates left by older schemas.
    pub fn insert_raw(&self, state: ParserState) {
        self.records.lock().expect("lock").push(state);
    }

    pub fn count(&self, key: &ParserStateKey) -> usize {
        self.records
            .lock()
            .expect("lock")
            .iter()
            .filter(|state| &state.key == key)
            .count()
    }

    pub fn current(&self, key: &ParserStateKey) -> Option<ParserState> {
        self.records
            .lock()
            .expect("lock")
            .iter()
            .filter(|state| &state.key == key)
            .max_by_key(|state| state.updated_at)
            .cloned()
    }
}

#[async_trait]
impl ParserStateRepository for InMemoryParserStates {
    async fn find_states(&self, key: &ParserStateKey) -> anyhow::Result<Vec<ParserState>> {
        Ok(self
            .records
            .lock()
            .expect("lock")
            .iter()
            .filter(|state| &state.key == key)
            .cloned()
            .collect())
    }

    async fn upsert_state(&self, state: &ParserState) -> anyhow::Result<()> {
        let mut records = self.records.lock().expect("lock");
        records.retain(|existing| existing.key != state.key);
        records.push(state.clone());
        Ok(())
    }

    async fn delete_stale_states(&self, key: &ParserStateKey, keep_updated_at: i64) -> anyhow::Result<u64> {
        let mut records = self.records.lock().expect("lock");
        let before = records.len();
        records.retain(|state| &state.key != key || state.updated_at == keep_updated_at);
        Ok((before - records.len()) as u64)
    }

    async fn find_duplicate_keys(&self) -> anyhow::Result<Vec<ParserStateKey>> {
        let records = self.records.lock().expect("lock");
        let mut counts: HashMap<ParserStateKey, usize> = HashMap::new();
        for state in records.iter() {
            *counts.entry(state.key.clone()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, _)| key)
            .collect())
    }
}

#[derive(Default)]
pub struct InMemorySessions {
    rows: Mutex<HashMap<(GuildId, ServerId, PlayerId), PlayerSession>>,
}

impl InMemorySessions {
    pub fn all(&self, guild_id: GuildId, server_id: &ServerId) -> Vec<PlayerSession> {
        let mut sessions: Vec<PlayerSession> = self
            .rows
            .lock()
            .expect("lock")
            .values()
            .filter(|session| session.guild_id == guild_id && &session.server_id == server_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        sessions
    }

    pub fn present(&self, guild_id: GuildId, server_id: &ServerId) -> Vec<PlayerSession> {
        self.all(guild_id, server_id)
            .into_iter()
            .filter(|session| session.state.is_present())
            .collect()
    }

    pub fn insert(&self, session: PlayerSession) {
        self.rows.lock().expect("lock").insert(
            (session.guild_id, session.server_id.clone(), session.player_id.clone()),
            session,
        );
    }
}

#[async_trait]
impl PlayerSessionRepository for InMemorySessions {
    async fn list_sessions(&self, guild_id: GuildId, server_id: &ServerId) -> anyhow::Result<Vec<PlayerSession>> {
        Ok(self.all(guild_id, server_id))
    }

    async fn upsert_sessions(&self, sessions: &[PlayerSession]) -> anyhow::Result<()> {
        for session in sessions {
            self.insert(session.clone());
        }
        Ok(())
    }

    async fn mark_all_offline(&self, guild_id: GuildId, server_id: &ServerId, at: i64) -> anyhow::Result<u64> {
        let mut rows = self.rows.lock().expect("lock");
        let mut changed = 0;
        for session in rows.values_mut() {
            if session.guild_id == guild_id && &session.server_id == server_id && session.state.is_present() {
                session.state = SessionState::Offline;
                session.last_transition_at = at;
                session.left_at = Some(at);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete_sessions(&self, guild_id: GuildId, server_id: &ServerId) -> anyhow::Result<()> {
        self.rows
            .lock()
            .expect("lock")
            .retain(|(guild, server, _), _| !(*guild == guild_id && server == server_id));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryKills {
    kills: Mutex<Vec<KillRecord>>,
    stats: Mutex<HashMap<(GuildId, ServerId, PlayerId), PlayerStats>>,
}

impl InMemoryKills {
    pub fn kill_count(&self) -> usize {
        self.kills.lock().expect("lock").len()
    }

    pub fn kills(&self) -> Vec<KillRecord> {
        self.kills.lock().expect("lock").clone()
    }

    pub fn stats_for(&self, guild_id: GuildId, server_id: &ServerId, player: &str) -> Option<PlayerStats> {
        self.stats
            .lock()
            .expect("lock")
            .get(&(guild_id, server_id.clone(), PlayerId::new(player)))
            .cloned()
    }

    pub fn all_stats(&self) -> Vec<PlayerStats> {
        let mut all: Vec<PlayerStats> = self.stats.lock().expect("lock").values().cloned().collect();
        all.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        all
    }
}

#[async_trait]
impl KillRepository for InMemoryKills {
    async fn clear_server(&self, guild_id: GuildId, server_id: &ServerId) -> anyhow::Result<()> {
        self.kills
            .lock()
            .expect("lock")
            .retain(|kill| !(kill.guild_id == guild_id && &kill.server_id == server_id));
        self.stats
            .lock()
            .expect("lock")
            .retain(|(guild, server, _), _| !(*guild == guild_id && server == server_id));
        Ok(())
    }

    async fn insert_kills(&self, kills: &[KillRecord]) -> anyhow::Result<()> {
        self.kills.lock().expect("lock").extend_from_slice(kills);
        Ok(())
    }

    async fn load_stats(&self, guild_id: GuildId, server_id: &ServerId) -> anyhow::Result<Vec<PlayerStats>> {
        Ok(self
            .all_stats()
            .into_iter()
            .filter(|stats| stats.guild_id == guild_id && &stats.server_id == server_id)
            .collect())
    }

    async fn upsert_stats(&self, stats: &[PlayerStats]) -> anyhow::Result<()> {
        let mut rows = self.stats.lock().expect("lock");
        for entry in stats {
            rows.insert(
                (entry.guild_id, entry.server_id.clone(), entry.player_id.clone()),
                entry.clone(),
            );
        }
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct StaticConfig {
    servers: Vec<ServerSource>,
    channels: HashMap<GuildId, GuildChannels>,
}

impl StaticConfig {
    pub fn with_server(mut self, source: ServerSource) -> Self {
        self.servers.push(source);
        self
    }

    pub fn with_channels(mut self, channels: GuildChannels) -> Self {
        self.channels.insert(channels.guild_id, channels);
        self
    }
}

#[async_trait]
impl ConfigRepository for StaticConfig {
    async fn load_servers(&self) -> anyhow::Result<Vec<ServerSource>> {
        Ok(self.servers.clone())
    }

    async fn load_guild_channels(&self, guild_id: GuildId) -> anyhow::Result<Option<GuildChannels>> {
        Ok(self.channels.get(&guild_id).cloned())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().expect("lock").clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, delivery: &Delivery) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("sink unavailable");
        }
        self.deliveries.lock().expect("lock").push(delivery.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPresence {
    snapshots: Mutex<Vec<PresenceSnapshot>>,
    unsupported: bool,
}

impl RecordingPresence {
    pub fn unsupported() -> Self {
        Self {
            snapshots: Mutex::new(Vec::new()),
            unsupported: true,
        }
    }

    pub fn snapshots(&self) -> Vec<PresenceSnapshot> {
        self.snapshots.lock().expect("lock").clone()
    }
}

#[async_trait]
impl PresenceSink for RecordingPresence {
    async fn publish_presence(&self, snapshot: &PresenceSnapshot) -> anyhow::Result<PresenceOutcome> {
        if self.unsupported {
            return Ok(PresenceOutcome::Unsupported);
        }
        self.snapshots.lock().expect("lock").push(snapshot.clone());
        Ok(PresenceOutcome::Published)
    }
}

#[derive(Default)]
pub struct StaticHealth {
    pub database_down: bool,
    pub notify_configured: bool,
}

#[async_trait]
impl HealthCheckService for StaticHealth {
    async fn check_database(&self) -> anyhow::Result<bool> {
        if self.database_down {
            anyhow::bail!("database unreachable");
        }
        Ok(true)
    }

    async fn check_notify_target(&self) -> anyhow::Result<bool> {
        Ok(self.notify_configured)
    }
}

struct FakeFile {
    bytes: Vec<u8>,
    modified_at: Option<i64>,
}

/// Remote host backed by a map of path to content.
#[derive(Default)]
pub struct FakeRemote {
    files: Mutex<HashMap<String, FakeFile>>,
    failures: Mutex<HashMap<String, SourceError>>,
}

impl FakeRemote {
    pub fn put(&self, path: &str, text: &str) {
        self.put_with_mtime(path, text, None);
    }

    pub fn put_with_mtime(&self, path: &str, text: &str, modified_at: Option<i64>) {
        self.files.lock().expect("lock").insert(
            path.to_string(),
            FakeFile {
                bytes: text.as_bytes().to_vec(),
                modified_at,
            },
        );
    }

    pub fn append(&self, path: &str, text: &str) {
        let mut files = self.files.lock().expect("lock");
        let file = files.entry(path.to_string()).or_insert_with(|| FakeFile {
            bytes: Vec::new(),
            modified_at: None,
        });
        file.bytes.extend_from_slice(text.as_bytes());
    }

    pub fn fail(&self, path: &str, err: SourceError) {
        self.failures.lock().expect("lock").insert(path.to_string(), err);
    }

    fn check(&self, path: &str) -> Result<(), SourceError> {
        match self.failures.lock().expect("lock").get(path) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl RemoteSource for FakeRemote {
    /// Whole file, trailing partial line included, as the SFTP reader does.
    fn fetch(&self, _source: &ServerSource, path: &str) -> Result<RemoteText, SourceError> {
        self.check(path)?;
        let files = self.files.lock().expect("lock");
        let file = files
            .get(path)
            .ok_or_else(|| SourceError::NotFound(path.to_string()))?;
        let size = file.bytes.len() as u64;
        Ok(RemoteText {
            path: path.to_string(),
            text: String::from_utf8_lossy(&file.bytes).into_owned(),
            start_offset: 0,
            end_offset: size,
            file_size: size,
            encoding: "utf-8".to_string(),
        })
    }

    fn fetch_from(&self, _source: &ServerSource, path: &str, offset: u64) -> Result<RemoteText, SourceError> {
        self.check(path)?;
        let files = self.files.lock().expect("lock");
        let file = files
            .get(path)
            .ok_or_else(|| SourceError::NotFound(path.to_string()))?;
        let size = file.bytes.len() as u64;
        if offset >= size {
            return Ok(RemoteText::empty(path, offset, size));
        }
        let tail = &file.bytes[offset as usize..];
        let consumed = tail.iter().rposition(|b| *b == b'\n').map(|idx| idx + 1).unwrap_or(0);
        Ok(RemoteText {
            path: path.to_string(),
            text: String::from_utf8_lossy(&tail[..consumed]).into_owned(),
            start_offset: offset,
            end_offset: offset + consumed as u64,
            file_size: size,
            encoding: "utf-8".to_string(),
        })
    }

    fn list(&self, _source: &ServerSource, dir: &str, pattern: &str) -> Result<Vec<RemoteEntry>, SourceError> {
        self.check(dir)?;
        let suffix = pattern.trim_start_matches('*');
        let prefix = format!("{}/", dir);
        let files = self.files.lock().expect("lock");
        Ok(files
            .iter()
            .filter_map(|(path, file)| {
                let name = path.strip_prefix(&prefix)?;
                if name.contains('/') || !name.ends_with(suffix) {
                    return None;
                }
                Some(RemoteEntry {
                    name: name.to_string(),
                    path: path.clone(),
                    size: file.bytes.len() as u64,
                    modified_at: file.modified_at,
                })
            })
            .collect())
    }

    fn close(&self, _key: &ServerKey) {}

    fn close_all(&self) {}
}

pub fn sample_source(guild: u64, server: &str) -> ServerSource {
    ServerSource {
        guild_id: GuildId(guild),
        server_id: ServerId::new(server),
        name: format!("Server {}", server),
        host: "10.0.0.1".to_string(),
        port: 8822,
        username: "ops".to_string(),
        credential_ref: "secret".to_string(),
        live_log_template: DEFAULT_LIVE_LOG_TEMPLATE.to_string(),
        kill_log_dir_template: DEFAULT_KILL_LOG_DIR_TEMPLATE.to_string(),
        kill_log_pattern: DEFAULT_KILL_LOG_PATTERN.to_string(),
    }
}

/// Application state over fakes. Every guild used in tests routes to a
/// fallback channel so deliveries are observable.
pub struct Harness {
    pub state: AppState,
    pub remote: Arc<FakeRemote>,
    pub parser_states: Arc<InMemoryParserStates>,
    pub sessions: Arc<InMemorySessions>,
    pub kills: Arc<InMemoryKills>,
    pub sink: Arc<RecordingSink>,
    pub presence: Arc<RecordingPresence>,
    pub source: ServerSource,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_servers(vec![sample_source(1, "7020")])
    }

    pub fn with_servers(servers: Vec<ServerSource>) -> Self {
        let mut config_repo = StaticConfig::default();
        for source in &servers {
            config_repo = config_repo.with_server(source.clone());
        }
        config_repo = config_repo.with_channels(GuildChannels {
            guild_id: GuildId(1),
            fallback_channel: Some(ChannelId(100)),
            ..GuildChannels::default()
        });

        let remote = Arc::new(FakeRemote::default());
        let parser_states = Arc::new(InMemoryParserStates::default());
        let sessions = Arc::new(InMemorySessions::default());
        let kills = Arc::new(InMemoryKills::default());
        let sink = Arc::new(RecordingSink::default());
        let presence = Arc::new(RecordingPresence::default());

        let config = RuntimeConfig {
            worker_threads: 2,
            blocking_timeout_seconds: 5,
            reconcile_batch_size: 2,
            ..RuntimeConfig::default()
        };
        let state = AppState::new(
            config,
            Collaborators {
                remote: remote.clone(),
                parser_state_repo: parser_states.clone(),
                session_repo: sessions.clone(),
                kill_repo: kills.clone(),
                config_repo: Arc::new(config_repo),
                notification_sink: sink.clone(),
                presence_sink: presence.clone(),
                health: Arc::new(StaticHealth::default()),
            },
        )
        .expect("state");

        Self {
            state,
            remote,
            parser_states,
            sessions,
            kills,
            sink,
            presence,
            source: servers.into_iter().next().unwrap_or_else(|| sample_source(1, "7020")),
        }
    }

    pub fn live_log(&self) -> String {
        self.source.live_log_path()
    }

    pub fn kill_dir(&self) -> String {
        self.source.kill_log_dir()
    }
}

/// Live log line at `2024.01.15-12.<minute>.<second>:000`.
pub fn log_line(minute: u32, second: u32, body: &str) -> String {
    format!("[2024.01.15-12.{:02}.{:02}:000][  1]{}\n", minute, second, body)
}

pub fn queue_line(minute: u32, second: u32, id: &str, name: &str) -> String {
    log_line(
        minute,
        second,
        &format!(
            "LogNet: Join request: /Game/Maps/world_1/World_1?eosid=|{}?Name={}?login={}?platformid=PC:1",
            id, name, name
        ),
    )
}

pub fn connect_line(minute: u32, second: u32, id: &str) -> String {
    log_line(
        minute,
        second,
        &format!("LogOnline: Warning: Player |{} successfully registered!", id),
    )
}

pub fn disconnect_line(minute: u32, second: u32, id: &str) -> String {
    log_line(
        minute,
        second,
        &format!(
            "LogNet: UChannel::Close: Sending CloseBunch. ChIndex == 0. Name: [UChannel] ChIndex: 0, Closing: 0 [UNetConnection] RemoteAddr: 1.2.3.4:7777, UniqueId: EOS:|{}",
            id
        ),
    )
}

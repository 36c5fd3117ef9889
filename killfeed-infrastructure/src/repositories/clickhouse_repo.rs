use anyhow::Result;
use async_trait::async_trait;
use clickhouse::Client;
use tracing::{debug, warn};

use killfeed_domain::ports::{KillRepository, ParserStateRepository, PlayerSessionRepository};
use killfeed_domain::{
    current_millis, GuildId, KillRecord, ParserKind, ParserState, ParserStateKey, PlayerSession,
    PlayerStats, ServerId, SessionState,
};

use crate::repositories::clickhouse_rows::{KillRow, ParserStateRow, PlayerSessionRow, PlayerStatsRow};

/// Durable store. Replace-by-key tables use `ReplacingMergeTree`; until a
/// merge runs several versions of one key can be visible, which readers
/// resolve (`FINAL`) or heal (parser states).
#[derive(Clone)]
pub struct ClickhouseRepo {
    client: Client,
    database: String,
}

impl ClickhouseRepo {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let create_db = format!("CREATE DATABASE IF NOT EXISTS {}", self.database);
        self.client.query(&create_db).execute().await?;

        let create_parser_states = r#"
CREATE TABLE IF NOT EXISTS parser_states (
    guild_id UInt64,
    server_id String,
    kind LowCardinality(String),
    offset UInt64,
    file_name String,
    last_processed_at Int64,
    cold_start_required UInt8,
    updated_at DateTime64(3)
) ENGINE = ReplacingMergeTree(updated_at)
ORDER BY (guild_id, server_id, kind)
"#;
        self.client.query(create_parser_states).execute().await?;

        let create_sessions = r#"
CREATE TABLE IF NOT EXISTS player_sessions (
    guild_id UInt64,
    server_id String,
    player_id String,
    name String,
    platform LowCardinality(String),
    state LowCardinality(String),
    last_transition_at DateTime64(3),
    joined_at Int64,
    left_at Int64,
    written_at DateTime64(3)
) ENGINE = ReplacingMergeTree(written_at)
ORDER BY (guild_id, server_id, player_id)
"#;
        self.client.query(create_sessions).execute().await?;

        let create_kills = r#"
CREATE TABLE IF NOT EXISTS kill_records (
    guild_id UInt64,
    server_id String,
    event_time DateTime64(3),
    killer_id String,
    killer_name String,
    killer_platform LowCardinality(String),
    victim_id String,
    victim_name String,
    victim_platform LowCardinality(String),
    weapon String,
    distance Float64,
    is_suicide UInt8
) ENGINE = MergeTree
PARTITION BY toYYYYMM(event_time)
ORDER BY (guild_id, server_id, event_time)
"#;
        self.client.query(create_kills).execute().await?;

        let create_stats = r#"
CREATE TABLE IF NOT EXISTS player_stats (
    guild_id UInt64,
    server_id String,
    player_id String,
    name String,
    kills UInt32,
    deaths UInt32,
    suicides UInt32,
    current_streak UInt32,
    best_streak UInt32,
    longest_kill_distance Float64,
    last_kill_at Int64,
    last_death_at Int64,
    written_at DateTime64(3)
) ENGINE = ReplacingMergeTree(written_at)
ORDER BY (guild_id, server_id, player_id)
"#;
        self.client.query(create_stats).execute().await?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        let _: u8 = self.client.query("SELECT toUInt8(1)").fetch_one().await?;
        Ok(())
    }

    async fn present_sessions(&self, guild_id: GuildId, server_id: &ServerId) -> Result<Vec<PlayerSession>> {
        let rows = self
            .client
            .query("SELECT ?fields FROM player_sessions FINAL WHERE guild_id = ? AND server_id = ? AND state != ?")
            .bind(guild_id.0)
            .bind(server_id.as_str())
            .bind(SessionState::Offline.as_str())
            .fetch_all::<PlayerSessionRow>()
            .await?;
        Ok(rows.into_iter().map(PlayerSessionRow::into_session).collect())
    }

    async fn delete_server_rows(&self, table: &str, guild_id: GuildId, server_id: &ServerId) -> Result<()> {
        let statement = format!(
            "ALTER TABLE {} DELETE WHERE guild_id = ? AND server_id = ? SETTINGS mutations_sync = 1",
            table
        );
        self.client
            .query(&statement)
            .bind(guild_id.0)
            .bind(server_id.as_str())
            .execute()
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ParserStateRepository for ClickhouseRepo {
    async fn find_states(&self, key: &ParserStateKey) -> Result<Vec<ParserState>> {
        let rows = self
            .client
            .query("SELECT ?fields FROM parser_states WHERE guild_id = ? AND server_id = ? AND kind = ?")
            .bind(key.guild_id.0)
            .bind(key.server_id.as_str())
            .bind(key.kind.as_str())
            .fetch_all::<ParserStateRow>()
            .await?;
        Ok(rows.into_iter().filter_map(ParserStateRow::into_state).collect())
    }

    async fn upsert_state(&self, state: &ParserState) -> Result<()> {
        let mut insert = self.client.insert("parser_states")?;
        insert.write(&ParserStateRow::from_state(state)).await?;
        insert.end().await?;
        Ok(())
    }

    async fn delete_stale_states(&self, key: &ParserStateKey, keep_updated_at: i64) -> Result<u64> {
        let stale = self
            .find_states(key)
            .await?
            .into_iter()
            .filter(|state| state.updated_at != keep_updated_at)
            .count() as u64;
        if stale == 0 {
            return Ok(0);
        }
        self.client
            .query(
                "ALTER TABLE parser_states DELETE WHERE guild_id = ? AND server_id = ? AND kind = ? \
                 AND toUnixTimestamp64Milli(updated_at) != ? SETTINGS mutations_sync = 1",
            )
            .bind(key.guild_id.0)
            .bind(key.server_id.as_str())
            .bind(key.kind.as_str())
            .bind(keep_updated_at)
            .execute()
            .await?;
        debug!(key = %key, removed = stale, "deleted stale parser states");
        Ok(stale)
    }

    async fn find_duplicate_keys(&self) -> Result<Vec<ParserStateKey>> {
        let rows = self
            .client
            .query(
                "SELECT guild_id, server_id, kind FROM parser_states \
                 GROUP BY guild_id, server_id, kind HAVING count() > 1",
            )
            .fetch_all::<(u64, String, String)>()
            .await?;
        let mut keys = Vec::with_capacity(rows.len());
        for (guild_id, server_id, kind) in rows {
            match kind.parse::<ParserKind>() {
                Ok(kind) => keys.push(ParserStateKey::new(GuildId(guild_id), ServerId(server_id), kind)),
                Err(err) => warn!(guild = guild_id, server = %server_id, error = %err, "skipping parser state with unknown kind"),
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl PlayerSessionRepository for ClickhouseRepo {
    async fn list_sessions(&self, guild_id: GuildId, server_id: &ServerId) -> Result<Vec<PlayerSession>> {
        let rows = self
            .client
            .query("SELECT ?fields FROM player_sessions FINAL WHERE guild_id = ? AND server_id = ?")
            .bind(guild_id.0)
            .bind(server_id.as_str())
            .fetch_all::<PlayerSessionRow>()
            .await?;
        Ok(rows.into_iter().map(PlayerSessionRow::into_session).collect())
    }

    async fn upsert_sessions(&self, sessions: &[PlayerSession]) -> Result<()> {
        if sessions.is_empty() {
            return Ok(());
        }
        let written_at = current_millis();
        let mut insert = self.client.insert("player_sessions")?;
        for session in sessions {
            insert
                .write(&PlayerSessionRow::from_session(session, written_at))
                .await?;
        }
        insert.end().await?;
        Ok(())
    }

    async fn mark_all_offline(&self, guild_id: GuildId, server_id: &ServerId, at: i64) -> Result<u64> {
        let mut present = self.present_sessions(guild_id, server_id).await?;
        for session in &mut present {
            session.state = SessionState::Offline;
            session.last_transition_at = at;
            session.left_at = Some(at);
        }
        self.upsert_sessions(&present).await?;
        Ok(present.len() as u64)
    }

    async fn delete_sessions(&self, guild_id: GuildId, server_id: &ServerId) -> Result<()> {
        self.delete_server_rows("player_sessions", guild_id, server_id).await
    }
}

#[async_trait]
impl KillRepository for ClickhouseRepo {
    async fn clear_server(&self, guild_id: GuildId, server_id: &ServerId) -> Result<()> {
        self.delete_server_rows("kill_records", guild_id, server_id).await?;
        self.delete_server_rows("player_stats", guild_id, server_id).await
    }

    async fn insert_kills(&self, kills: &[KillRecord]) -> Result<()> {
        if kills.is_empty() {
            return Ok(());
        }
        let mut insert = self.client.insert("kill_records")?;
        for record in kills {
            insert.write(&KillRow::from_record(record)).await?;
        }
        insert.end().await?;
        Ok(())
    }

    async fn load_stats(&self, guild_id: GuildId, server_id: &ServerId) -> Result<Vec<PlayerStats>> {
        let rows = self
            .client
            .query("SELECT ?fields FROM player_stats FINAL WHERE guild_id = ? AND server_id = ?")
            .bind(guild_id.0)
            .bind(server_id.as_str())
            .fetch_all::<PlayerStatsRow>()
            .await?;
        Ok(rows.into_iter().map(PlayerStatsRow::into_stats).collect())
    }

    async fn upsert_stats(&self, stats: &[PlayerStats]) -> Result<()> {
        if stats.is_empty() {
            return Ok(());
        }
        let written_at = current_millis();
        let mut insert = self.client.insert("player_stats")?;
        for entry in stats {
            insert.write(&PlayerStatsRow::from_stats(entry, written_at)).await?;
        }
        insert.end().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        ClickhouseRepo::ping(self).await
    }
}

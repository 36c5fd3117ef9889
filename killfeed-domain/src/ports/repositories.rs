use async_trait::async_trait;

use crate::entities::{KillRecord, ParserState, ParserStateKey, PlayerSession, PlayerStats};
use crate::value_objects::{GuildId, ServerId};

#[async_trait]
pub trait ParserStateRepository: Send + Sync {
    /// Every stored record for the key, duplicates included.
    async fn find_states(&self, key: &ParserStateKey) -> anyhow::Result<Vec<ParserState>>;
    /// Replace-by-key upsert.
    async fn upsert_state(&self, state: &ParserState) -> anyhow::Result<()>;
    /// Deletes every record of the key except the one updated at `keep_updated_at`.
    async fn delete_stale_states(
        &self,
        key: &ParserStateKey,
        keep_updated_at: i64,
    ) -> anyhow::Result<u64>;
    async fn find_duplicate_keys(&self) -> anyhow::Result<Vec<ParserStateKey>>;
}

#[async_trait]
pub trait PlayerSessionRepository: Send + Sync {
    async fn list_sessions(
        &self,
        guild_id: GuildId,
        server_id: &ServerId,
    ) -> anyhow::Result<Vec<PlayerSession>>;
    async fn upsert_sessions(&self, sessions: &[PlayerSession]) -> anyhow::Result<()>;
    async fn mark_all_offline(
        &self,
        guild_id: GuildId,
        server_id: &ServerId,
        at: i64,
    ) -> anyhow::Result<u64>;
    async fn delete_sessions(&self, guild_id: GuildId, server_id: &ServerId) -> anyhow::Result<()>;
}

#[async_trait]
pub trait KillRepository: Send + Sync {
    /// Drops every kill record and aggregate of the server.
    async fn clear_server(&self, guild_id: GuildId, server_id: &ServerId) -> anyhow::Result<()>;
    async fn insert_kills(&self, kills: &[KillRecord]) -> anyhow::Result<()>;
    async fn load_stats(
        &self,
        guild_id: GuildId,
        server_id: &ServerId,
    ) -> anyhow::Result<Vec<PlayerStats>>;
    async fn upsert_stats(&self, stats: &[PlayerStats]) -> anyhow::Result<()>;
    async fn ping(&self) -> anyhow::Result<()>;
}

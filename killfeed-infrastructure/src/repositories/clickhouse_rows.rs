// Storage rows and their mapping onto domain entities

use clickhouse::Row;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use killfeed_domain::{
    GuildId, KillRecord, ParserKind, ParserState, ParserStateKey, PlayerId, PlayerSession,
    PlayerStats, Platform, ServerId, SessionState,
};

use crate::utils::{millis_or_none, millis_to_utc, optional_millis, utc_to_millis};

#[derive(Debug, Clone, Serialize, Deserialize, Row)]
pub struct ParserStateRow {
    pub guild_id: u64,
    pub server_id: String,
    pub kind: String,
    pub offset: u64,
    pub file_name: String,
    pub last_processed_at: i64,
    pub cold_start_required: u8,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    pub updated_at: OffsetDateTime,
}

impl ParserStateRow {
    pub fn from_state(state: &ParserState) -> Self {
        Self {
            guild_id: state.key.guild_id.0,
            server_id: state.key.server_id.0.clone(),
            kind: state.key.kind.as_str().to_string(),
            offset: state.offset,
            file_name: state.file_name.clone().unwrap_or_default(),
            last_processed_at: optional_millis(state.last_processed_at),
            cold_start_required: u8::from(state.cold_start_required),
            updated_at: millis_to_utc(state.updated_at),
        }
    }

    /// Rows with an unknown parser kind are skipped by the caller.
    pub fn into_state(self) -> Option<ParserState> {
        let kind: ParserKind = self.kind.parse().ok()?;
        Some(ParserState {
            key: ParserStateKey::new(GuildId(self.guild_id), ServerId(self.server_id), kind),
            offset: self.offset,
            file_name: Some(self.file_name).filter(|name| !name.is_empty()),
            last_processed_at: millis_or_none(self.last_processed_at),
            cold_start_required: self.cold_start_required != 0,
            updated_at: utc_to_millis(self.updated_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Row)]
pub struct PlayerSessionRow {
    pub guild_id: u64,
    pub server_id: String,
    pub player_id: String,
    pub name: String,
    pub platform: String,
    pub state: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    pub last_transition_at: OffsetDateTime,
    pub joined_at: i64,
    pub left_at: i64,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    pub written_at: OffsetDateTime,
}

impl PlayerSessionRow {
    pub fn from_session(session: &PlayerSession, written_at: i64) -> Self {
        Self {
            guild_id: session.guild_id.0,
            server_id: session.server_id.0.clone(),
            player_id: session.player_id.0.clone(),
            name: session.name.clone(),
            platform: session.platform.as_str().to_string(),
            state: session.state.as_str().to_string(),
            last_transition_at: millis_to_utc(session.last_transition_at),
            joined_at: optional_millis(session.joined_at),
            left_at: optional_millis(session.left_at),
            written_at: millis_to_utc(written_at),
        }
    }

    pub fn into_session(self) -> PlayerSession {
        PlayerSession {
            guild_id: GuildId(self.guild_id),
            server_id: ServerId(self.server_id),
            player_id: PlayerId(self.player_id),
            name: self.name,
            platform: Platform::from(self.platform.as_str()),
            state: SessionState::from(self.state.as_str()),
            last_transition_at: utc_to_millis(self.last_transition_at),
            joined_at: millis_or_none(self.joined_at),
            left_at: millis_or_none(self.left_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Row)]
pub struct KillRow {
    pub guild_id: u64,
    pub server_id: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    pub event_time: OffsetDateTime,
    pub killer_id: String,
    pub killer_name: String,
    pub killer_platform: String,
    pub victim_id: String,
    pub victim_name: String,
    pub victim_platform: String,
    pub weapon: String,
    pub distance: f64,
    pub is_suicide: u8,
}

impl KillRow {
    pub fn from_record(record: &KillRecord) -> Self {
        Self {
            guild_id: record.guild_id.0,
            server_id: record.server_id.0.clone(),
            event_time: millis_to_utc(record.timestamp),
            killer_id: record.killer_id.0.clone(),
            killer_name: record.killer_name.clone(),
            killer_platform: record.killer_platform.as_str().to_string(),
            victim_id: record.victim_id.0.clone(),
            victim_name: record.victim_name.clone(),
            victim_platform: record.victim_platform.as_str().to_string(),
            weapon: record.weapon.clone(),
            distance: record.distance,
            is_suicide: u8::from(record.is_suicide),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Row)]
pub struct PlayerStatsRow {
    pub guild_id: u64,
    pub server_id: String,
    pub player_id: String,
    pub name: String,
    pub kills: u32,
    pub deaths: u32,
    pub suicides: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub longest_kill_distance: f64,
    pub last_kill_at: i64,
    pub last_death_at: i64,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    pub written_at: OffsetDateTime,
}

impl PlayerStatsRow {
    pub fn from_stats(stats: &PlayerStats, written_at: i64) -> Self {
        Self {
            guild_id: stats.guild_id.0,
            server_id: stats.server_id.0.clone(),
            player_id: stats.player_id.0.clone(),
            name: stats.name.clone(),
            kills: stats.kills,
            deaths: stats.deaths,
            suicides: stats.suicides,
            current_streak: stats.current_streak,
            best_streak: stats.best_streak,
            longest_kill_distance: stats.longest_kill_distance,
            last_kill_at: optional_millis(stats.last_kill_at),
            last_death_at: optional_millis(stats.last_death_at),
            written_at: millis_to_utc(written_at),
        }
    }

    pub fn into_stats(self) -> PlayerStats {
        PlayerStats {
            guild_id: GuildId(self.guild_id),
            server_id: ServerId(self.server_id),
            player_id: PlayerId(self.player_id),
            name: self.name,
            kills: self.kills,
            deaths: self.deaths,
            suicides: self.suicides,
            current_streak: self.current_streak,
            best_streak: self.best_streak,
            longest_kill_distance: self.longest_kill_distance,
            last_kill_at: millis_or_none(self.last_kill_at),
            last_death_at: millis_or_none(self.last_death_at),
        }
    }
}

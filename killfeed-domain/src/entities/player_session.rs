// Player session entity

use serde::{Deserialize, Serialize};

use crate::value_objects::{GuildId, PlayerId, Platform, ServerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Queued,
    Online,
    Offline,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Queued => "queued",
            SessionState::Online => "online",
            SessionState::Offline => "offline",
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, SessionState::Queued | SessionState::Online)
    }
}

impl From<&str> for SessionState {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "queued" => SessionState::Queued,
            "online" => SessionState::Online,
            _ => SessionState::Offline,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSession {
    pub guild_id: GuildId,
    pub server_id: ServerId,
    pub player_id: PlayerId,
    pub name: String,
    pub platform: Platform,
    pub state: SessionState,
    pub last_transition_at: i64,
    pub joined_at: Option<i64>,
    pub left_at: Option<i64>,
}

impl PlayerSession {
    pub fn new(guild_id: GuildId, server_id: ServerId, player_id: PlayerId, at: i64) -> Self {
        Self {
            guild_id,
            server_id,
            player_id,
            name: UNKNOWN_PLAYER_NAME.to_string(),
            platform: Platform::Unknown,
            state: SessionState::Offline,
            last_transition_at: at,
            joined_at: None,
            left_at: None,
        }
    }
}

pub const UNKNOWN_PLAYER_NAME: &str = "Unknown";

/// Presence counters derived from the session table of one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PresenceCounts {
    pub online: u32,
    pub queued: u32,
}

impl PresenceCounts {
    pub fn from_sessions<'a>(sessions: impl IntoIterator<Item = &'a PlayerSession>) -> Self {
        let mut counts = Self::default();
        for session in sessions {
            match session.state {
                SessionState::Online => counts.online += 1,
                SessionState::Queued => counts.queued += 1,
                SessionState::Offline => {}
            }
        }
        counts
    }
}

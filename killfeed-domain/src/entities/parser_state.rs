// Durable bookmark of how much of a remote log has been consumed

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value_objects::{GuildId, ServerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    /// Live server log: connection lifecycle and world events.
    Presence,
    /// Newest kill-log CSV.
    Killfeed,
}

impl ParserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParserKind::Presence => "presence",
            ParserKind::Killfeed => "killfeed",
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParserKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "presence" | "log" => Ok(ParserKind::Presence),
            "killfeed" | "kills" => Ok(ParserKind::Killfeed),
            other => Err(anyhow::anyhow!("unknown parser kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParserStateKey {
    pub guild_id: GuildId,
    pub server_id: ServerId,
    pub kind: ParserKind,
}

impl ParserStateKey {
    pub fn new(guild_id: GuildId, server_id: ServerId, kind: ParserKind) -> Self {
        Self {
            guild_id,
            server_id,
            kind,
        }
    }
}

impl fmt::Display for ParserStateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.guild_id, self.server_id, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserState {
    pub key: ParserStateKey,
    /// Byte offset of the first unread byte (equals the consumed file size).
    pub offset: u64,
    /// File the offset refers to, when the parser follows rotating files.
    pub file_name: Option<String>,
    pub last_processed_at: Option<i64>,
    pub cold_start_required: bool,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColdReason {
    NoPriorState,
    NeverProcessed,
    ExplicitReset,
    Rotated { recorded: u64, current: u64 },
}

impl fmt::Display for ColdReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColdReason::NoPriorState => f.write_str("no prior state"),
            ColdReason::NeverProcessed => f.write_str("never processed"),
            ColdReason::ExplicitReset => f.write_str("explicit reset"),
            ColdReason::Rotated { recorded, current } => {
                write!(f, "log shrank from {} to {} bytes", recorded, current)
            }
        }
    }
}

impl ParserState {
    pub fn fresh(key: ParserStateKey, now: i64) -> Self {
        Self {
            key,
            offset: 0,
            file_name: None,
            last_processed_at: None,
            cold_start_required: true,
            updated_at: now,
        }
    }

    /// Decides whether the next pass must be a cold replay. `current_size` is the
    /// remote file size when it is already known.
    pub fn cold_reason(&self, current_size: Option<u64>) -> Option<ColdReason> {
        if self.cold_start_required {
            return Some(ColdReason::ExplicitReset);
        }
        if (self.offset == 0 && self.file_name.is_none()) || self.last_processed_at.is_none() {
            return Some(ColdReason::NeverProcessed);
        }
        match current_size {
            Some(current) if current < self.offset => Some(ColdReason::Rotated {
                recorded: self.offset,
                current,
            }),
            _ => None,
        }
    }

    pub fn advanced(&self, offset: u64, file_name: Option<String>, now: i64) -> Self {
        let same_file = file_name == self.file_name;
        let offset = if same_file && !self.cold_start_required {
            offset.max(self.offset)
        } else {
            offset
        };
        Self {
            key: self.key.clone(),
            offset,
            file_name,
            last_processed_at: Some(now),
            cold_start_required: false,
            updated_at: now,
        }
    }

    pub fn reset(&self, now: i64) -> Self {
        Self {
            key: self.key.clone(),
            offset: 0,
            file_name: None,
            last_processed_at: None,
            cold_start_required: true,
            updated_at: now,
        }
    }
}

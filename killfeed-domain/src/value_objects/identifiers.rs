// Identifier value objects

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GuildId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ServerId(pub String);

/// Stable per-player key taken from the game's online id, never the display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl ServerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PlayerId {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().trim_start_matches('|').to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of one server inside one guild. Servers are only unique per guild.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerKey {
    pub guild_id: GuildId,
    pub server_id: ServerId,
}

impl ServerKey {
    pub fn new(guild_id: GuildId, server_id: ServerId) -> Self {
        Self {
            guild_id,
            server_id,
        }
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.server_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_strips_eos_marker_and_case() {
        assert_eq!(PlayerId::new(" |ABCdef01 ").as_str(), "abcdef01");
    }

    #[test]
    fn server_key_display_joins_guild_and_server() {
        let key = ServerKey::new(GuildId(42), ServerId::new("7020"));
        assert_eq!(key.to_string(), "42/7020");
    }
}

// Guild notification channel bindings, owned by external configuration

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value_objects::{ChannelId, GuildId, ServerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Killfeed,
    Connections,
    Missions,
    Airdrops,
    Helicrashes,
    Traders,
    Vehicles,
}

impl EventCategory {
    pub const ALL: [EventCategory; 7] = [
        EventCategory::Killfeed,
        EventCategory::Connections,
        EventCategory::Missions,
        EventCategory::Airdrops,
        EventCategory::Helicrashes,
        EventCategory::Traders,
        EventCategory::Vehicles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Killfeed => "killfeed",
            EventCategory::Connections => "connections",
            EventCategory::Missions => "missions",
            EventCategory::Airdrops => "airdrops",
            EventCategory::Helicrashes => "helicrashes",
            EventCategory::Traders => "traders",
            EventCategory::Vehicles => "vehicles",
        }
    }

    /// Older configurations bound one channel per group instead of per category.
    pub fn legacy_key(&self) -> &'static str {
        match self {
            EventCategory::Killfeed => "killfeed",
            EventCategory::Connections => "connections",
            _ => "events",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingScope {
    ServerSpecific,
    GuildDefault,
    Legacy,
    GuildFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedChannel {
    pub channel_id: ChannelId,
    pub scope: BindingScope,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildChannels {
    pub guild_id: GuildId,
    #[serde(default)]
    pub server_bindings: HashMap<ServerId, HashMap<EventCategory, ChannelId>>,
    #[serde(default)]
    pub default_bindings: HashMap<EventCategory, ChannelId>,
    #[serde(default)]
    pub legacy_bindings: HashMap<String, ChannelId>,
    #[serde(default)]
    pub fallback_channel: Option<ChannelId>,
}

impl GuildChannels {
    /// Walks server-specific, guild-default, legacy and generic fallback in that order.
    pub fn resolve(&self, server_id: &ServerId, category: EventCategory) -> Option<ResolvedChannel> {
        if let Some(channel_id) = self
            .server_bindings
            .get(server_id)
            .and_then(|bindings| bindings.get(&category))
        {
            return Some(ResolvedChannel {
                channel_id: *channel_id,
                scope: BindingScope::ServerSpecific,
            });
        }
        if let Some(channel_id) = self.default_bindings.get(&category) {
            return Some(ResolvedChannel {
                channel_id: *channel_id,
                scope: BindingScope::GuildDefault,
            });
        }
        if let Some(channel_id) = self.legacy_bindings.get(category.legacy_key()) {
            return Some(ResolvedChannel {
                channel_id: *channel_id,
                scope: BindingScope::Legacy,
            });
        }
        self.fallback_channel.map(|channel_id| ResolvedChannel {
            channel_id,
            scope: BindingScope::GuildFallback,
        })
    }
}

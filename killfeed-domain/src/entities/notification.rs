// Outbound notification payloads

use serde::{Deserialize, Serialize};

use crate::entities::channel_binding::EventCategory;
use crate::entities::log_event::WorldEvent;
use crate::value_objects::{ChannelId, GuildId, PlayerId, Platform, ServerId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub guild_id: GuildId,
    pub server_id: ServerId,
    pub server_name: String,
    pub category: EventCategory,
    pub occurred_at: i64,
    pub payload: NotificationPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationPayload {
    PlayerJoined {
        player_id: PlayerId,
        name: String,
        platform: Platform,
    },
    PlayerLeft {
        player_id: PlayerId,
        name: String,
        platform: Platform,
    },
    World {
        event: WorldEvent,
    },
    Kill {
        killer_name: String,
        victim_name: String,
        weapon: String,
        distance: f64,
        is_suicide: bool,
        killer_streak: u32,
    },
}

/// What the sink receives once the router has picked a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub channel_id: ChannelId,
    pub notification: Notification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub guild_id: GuildId,
    pub server_id: ServerId,
    pub server_name: String,
    pub online: u32,
    pub queued: u32,
    pub observed_at: i64,
}

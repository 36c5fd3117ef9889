// Structured events produced by the classifier

use serde::{Deserialize, Serialize};

use crate::entities::channel_binding::EventCategory;
use crate::value_objects::{PlayerId, Platform};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: i64,
    pub kind: LogEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum LogEventKind {
    Connection(ConnectionEvent),
    World(WorldEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionEvent {
    Queued {
        player_id: PlayerId,
        name: String,
        platform: Platform,
    },
    Connected {
        player_id: PlayerId,
    },
    Disconnected {
        player_id: PlayerId,
    },
}

impl ConnectionEvent {
    pub fn player_id(&self) -> &PlayerId {
        match self {
            ConnectionEvent::Queued { player_id, .. }
            | ConnectionEvent::Connected { player_id }
            | ConnectionEvent::Disconnected { player_id } => player_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldEvent {
    MissionReady { mission_id: String, level: u8 },
    AirdropFlying,
    HelicrashReady,
    TraderArrived { trader_id: String },
    VehicleAdded { vehicle: String, total: u32 },
    VehicleRemoved { vehicle: String, total: u32 },
}

impl WorldEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            WorldEvent::MissionReady { .. } => EventCategory::Missions,
            WorldEvent::AirdropFlying => EventCategory::Airdrops,
            WorldEvent::HelicrashReady => EventCategory::Helicrashes,
            WorldEvent::TraderArrived { .. } => EventCategory::Traders,
            WorldEvent::VehicleAdded { .. } | WorldEvent::VehicleRemoved { .. } => {
                EventCategory::Vehicles
            }
        }
    }
}

impl LogEvent {
    pub fn connection(timestamp: i64, event: ConnectionEvent) -> Self {
        Self {
            timestamp,
            kind: LogEventKind::Connection(event),
        }
    }

    pub fn world(timestamp: i64, event: WorldEvent) -> Self {
        Self {
            timestamp,
            kind: LogEventKind::World(event),
        }
    }
}

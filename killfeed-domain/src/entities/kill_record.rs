// Kill records and the per-player aggregates they drive

use serde::{Deserialize, Serialize};

use crate::value_objects::{GuildId, PlayerId, Platform, ServerId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillRecord {
    pub guild_id: GuildId,
    pub server_id: ServerId,
    pub timestamp: i64,
    pub killer_id: PlayerId,
    pub killer_name: String,
    pub killer_platform: Platform,
    pub victim_id: PlayerId,
    pub victim_name: String,
    pub victim_platform: Platform,
    pub weapon: String,
    pub distance: f64,
    pub is_suicide: bool,
}

/// Identity of a row for duplicate suppression. Distance is compared in centimetres.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KillRowKey {
    pub timestamp: i64,
    pub killer_id: String,
    pub victim_id: String,
    pub weapon: String,
    pub distance_cm: i64,
}

impl KillRecord {
    pub fn row_key(&self) -> KillRowKey {
        KillRowKey {
            timestamp: self.timestamp,
            killer_id: self.killer_id.0.clone(),
            victim_id: self.victim_id.0.clone(),
            weapon: self.weapon.clone(),
            distance_cm: (self.distance * 100.0).round() as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub guild_id: GuildId,
    pub server_id: ServerId,
    pub player_id: PlayerId,
    pub name: String,
    pub kills: u32,
    pub deaths: u32,
    pub suicides: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub longest_kill_distance: f64,
    pub last_kill_at: Option<i64>,
    pub last_death_at: Option<i64>,
}

impl PlayerStats {
    pub fn new(guild_id: GuildId, server_id: ServerId, player_id: PlayerId, name: &str) -> Self {
        Self {
            guild_id,
            server_id,
            player_id,
            name: name.to_string(),
            kills: 0,
            deaths: 0,
            suicides: 0,
            current_streak: 0,
            best_streak: 0,
            longest_kill_distance: 0.0,
            last_kill_at: None,
            last_death_at: None,
        }
    }

    pub fn kd_ratio(&self) -> f64 {
        self.kills as f64 / self.deaths.max(1) as f64
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::{Delivery, GuildChannels, PresenceSnapshot, ServerSource};
use crate::value_objects::GuildId;

#[async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn load_servers(&self) -> anyhow::Result<Vec<ServerSource>>;
    async fn load_guild_channels(&self, guild_id: GuildId) -> anyhow::Result<Option<GuildChannels>>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Rate limiting, formatting and retry toward the delivery surface are the sink's job.
    async fn deliver(&self, delivery: &Delivery) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceOutcome {
    Published,
    Unsupported,
}

#[async_trait]
pub trait PresenceSink: Send + Sync {
    async fn publish_presence(&self, snapshot: &PresenceSnapshot) -> anyhow::Result<PresenceOutcome>;
}

#[async_trait]
pub trait HealthCheckService: Send + Sync {
    async fn check_database(&self) -> anyhow::Result<bool>;
    /// `Ok(false)` when no notification target is configured.
    async fn check_notify_target(&self) -> anyhow::Result<bool>;
}

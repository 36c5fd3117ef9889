use std::collections::HashMap;
use std::sync::Arc;

use killfeed_domain::ports::{ConfigRepository, NotificationSink};
use killfeed_domain::{Delivery, GuildChannels, GuildId, Notification};
use serde::Serialize;
use tracing::{debug, warn};

use crate::Metrics;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouteReport {
    pub delivered: usize,
    pub unresolved: usize,
    pub failed: usize,
}

/// Resolves a destination channel per notification through the guild's
/// fallback chain and hands the delivery to the sink.
#[derive(Clone)]
pub struct NotificationRouter {
    config_repo: Arc<dyn ConfigRepository>,
    sink: Arc<dyn NotificationSink>,
    metrics: Arc<Metrics>,
}

impl NotificationRouter {
    pub fn new(
        config_repo: Arc<dyn ConfigRepository>,
        sink: Arc<dyn NotificationSink>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config_repo,
            sink,
            metrics,
        }
    }

    /// Delivers in the given order. Guild bindings are read once per call.
    pub async fn route_all(&self, notifications: Vec<Notification>) -> RouteReport {
        let mut report = RouteReport::default();
        let mut bindings: HashMap<GuildId, Option<GuildChannels>> = HashMap::new();

        for notification in notifications {
            if !bindings.contains_key(&notification.guild_id) {
                let loaded = match self.config_repo.load_guild_channels(notification.guild_id).await {
                    Ok(channels) => channels,
                    Err(err) => {
                        warn!(guild = %notification.guild_id, error = %err, "failed to load channel bindings");
                        None
                    }
                };
                bindings.insert(notification.guild_id, loaded);
            }

            let resolved = bindings
                .get(&notification.guild_id)
                .and_then(|channels| channels.as_ref())
                .and_then(|channels| channels.resolve(&notification.server_id, notification.category));

            let Some(resolved) = resolved else {
                debug!(
                    guild = %notification.guild_id,
                    server = %notification.server_id,
                    category = %notification.category,
                    "no channel bound, dropping notification"
                );
                report.unresolved += 1;
                continue;
            };

            let delivery = Delivery {
                channel_id: resolved.channel_id,
                notification,
            };
            match self.sink.deliver(&delivery).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(
                        channel = %delivery.channel_id,
                        category = %delivery.notification.category,
                        error = %err,
                        "notification delivery failed"
                    );
                    report.failed += 1;
                }
            }
        }

        self.metrics
            .record_routing(report.delivered, report.unresolved, report.failed);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSink, StaticConfig};
    use killfeed_domain::{ChannelId, EventCategory, NotificationPayload, ServerId, WorldEvent};

    fn notification(guild: u64, category: EventCategory) -> Notification {
        Notification {
            guild_id: GuildId(guild),
            server_id: ServerId::new("7020"),
            server_name: "EU".to_string(),
            category,
            occurred_at: 1,
            payload: NotificationPayload::World {
                event: WorldEvent::AirdropFlying,
            },
        }
    }

    #[tokio::test]
    async fn resolves_through_fallback_and_counts_unresolved() {
        let config = StaticConfig::default().with_channels(GuildChannels {
            guild_id: GuildId(1),
            legacy_bindings: HashMap::from([("events".to_string(), ChannelId(30))]),
            ..GuildChannels::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let router = NotificationRouter::new(Arc::new(config), sink.clone(), Arc::new(Metrics::default()));

        let report = router
            .route_all(vec![
                notification(1, EventCategory::Airdrops),
                notification(1, EventCategory::Killfeed),
                notification(2, EventCategory::Airdrops),
            ])
            .await;

        assert_eq!(report, RouteReport { delivered: 1, unresolved: 2, failed: 0 });
        let delivered = sink.deliveries();
        assert_eq!(delivered[0].channel_id, ChannelId(30));
    }

    #[tokio::test]
    async fn sink_failures_are_counted_not_raised() {
        let config = StaticConfig::default().with_channels(GuildChannels {
            guild_id: GuildId(1),
            fallback_channel: Some(ChannelId(9)),
            ..GuildChannels::default()
        });
        let sink = Arc::new(RecordingSink::failing());
        let router = NotificationRouter::new(Arc::new(config), sink, Arc::new(Metrics::default()));
        let report = router.route_all(vec![notification(1, EventCategory::Traders)]).await;
        assert_eq!(report.failed, 1);
    }
}

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use killfeed_domain::ports::{NotificationSink, PresenceOutcome, PresenceSink};
use killfeed_domain::{ChannelId, Delivery, Notification, NotificationPayload, PresenceSnapshot, WorldEvent};

const MAX_ATTEMPTS: u32 = 3;
const CHANNEL_SPACING: Duration = Duration::from_millis(250);

#[derive(Serialize)]
struct DeliveryBody<'a> {
    channel_id: ChannelId,
    text: String,
    notification: &'a Notification,
}

/// Posts notifications and presence snapshots as JSON to webhook endpoints.
/// Without a notification url deliveries are written to the log instead.
pub struct WebhookSink {
    client: Client,
    notify_url: Option<String>,
    presence_url: Option<String>,
    last_post: Mutex<HashMap<ChannelId, Instant>>,
}

impl WebhookSink {
    pub fn new(notify_url: Option<String>, presence_url: Option<String>, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.max(3)))
            .build()?;
        Ok(Self {
            client,
            notify_url,
            presence_url,
            last_post: Mutex::new(HashMap::new()),
        })
    }

    pub fn notify_url(&self) -> Option<&str> {
        self.notify_url.as_deref()
    }

    pub async fn check_target(&self) -> Result<bool> {
        let Some(url) = &self.notify_url else {
            return Ok(false);
        };
        let response = self.client.head(url).send().await?;
        if response.status().is_server_error() {
            bail!("notify webhook responded {}", response.status());
        }
        Ok(true)
    }

    async fn wait_for_channel(&self, channel_id: ChannelId) {
        let mut last_post = self.last_post.lock().await;
        if let Some(previous) = last_post.get(&channel_id) {
            let ready_at = *previous + CHANNEL_SPACING;
            let wait = ready_at.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                sleep(wait).await;
            }
        }
        last_post.insert(channel_id, Instant::now());
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self.client.post(url).json(body).send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if !retryable || attempt >= MAX_ATTEMPTS {
                bail!("webhook responded {}", status);
            }
            let delay = retry_after(response.headers()).unwrap_or(Duration::from_millis(500 * u64::from(attempt)));
            debug!(status = %status, attempt, delay_ms = delay.as_millis() as u64, "webhook retry");
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, delivery: &Delivery) -> Result<()> {
        let text = render_text(&delivery.notification);
        let Some(url) = &self.notify_url else {
            info!(channel = %delivery.channel_id, guild = %delivery.notification.guild_id, "{}", text);
            return Ok(());
        };
        self.wait_for_channel(delivery.channel_id).await;
        let body = DeliveryBody {
            channel_id: delivery.channel_id,
            text,
            notification: &delivery.notification,
        };
        if let Err(err) = self.post_json(url, &body).await {
            warn!(channel = %delivery.channel_id, error = %err, "notification delivery failed");
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl PresenceSink for WebhookSink {
    async fn publish_presence(&self, snapshot: &PresenceSnapshot) -> Result<PresenceOutcome> {
        let Some(url) = &self.presence_url else {
            return Ok(PresenceOutcome::Unsupported);
        };
        self.post_json(url, snapshot).await?;
        Ok(PresenceOutcome::Published)
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds: f64 = value.trim().parse().ok()?;
    Some(Duration::from_millis((seconds.clamp(0.0, 60.0) * 1000.0) as u64))
}

pub fn render_text(notification: &Notification) -> String {
    let server = &notification.server_name;
    match &notification.payload {
        NotificationPayload::PlayerJoined { name, platform, .. } => {
            format!("[{}] {} joined ({})", server, name, platform.as_str())
        }
        NotificationPayload::PlayerLeft { name, platform, .. } => {
            format!("[{}] {} left ({})", server, name, platform.as_str())
        }
        NotificationPayload::Kill {
            killer_name,
            victim_name,
            weapon,
            distance,
            is_suicide,
            killer_streak,
        } => {
            if *is_suicide {
                format!("[{}] {} died ({})", server, victim_name, weapon)
            } else if *killer_streak > 1 {
                format!(
                    "[{}] {} killed {} with {} at {:.0}m, streak {}",
                    server, killer_name, victim_name, weapon, distance, killer_streak
                )
            } else {
                format!(
                    "[{}] {} killed {} with {} at {:.0}m",
                    server, killer_name, victim_name, weapon, distance
                )
            }
        }
        NotificationPayload::World { event } => format!("[{}] {}", server, describe_world(event)),
    }
}

fn describe_world(event: &WorldEvent) -> String {
    match event {
        WorldEvent::MissionReady { mission_id, level } => {
            format!("mission {} (level {}) is ready", mission_id, level)
        }
        WorldEvent::AirdropFlying => "an airdrop is flying in".to_string(),
        WorldEvent::HelicrashReady => "a helicopter crashed".to_string(),
        WorldEvent::TraderArrived { trader_id } => format!("trader {} has arrived", trader_id),
        WorldEvent::VehicleAdded { vehicle, total } => {
            format!("vehicle {} spawned, {} total", vehicle, total)
        }
        WorldEvent::VehicleRemoved { vehicle, total } => {
            format!("vehicle {} removed, {} total", vehicle, total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use killfeed_domain::{EventCategory, GuildId, ServerId};

    fn notification(payload: NotificationPayload) -> Notification {
        Notification {
            guild_id: GuildId(1),
            server_id: ServerId::new("7020"),
            server_name: "EU Main".to_string(),
            category: EventCategory::Killfeed,
            occurred_at: 0,
            payload,
        }
    }

    #[test]
    fn kill_text_mentions_streak_only_when_running() {
        let kill = |streak| {
            render_text(&notification(NotificationPayload::Kill {
                killer_name: "Alpha".to_string(),
                victim_name: "Bravo".to_string(),
                weapon: "AK".to_string(),
                distance: 84.6,
                is_suicide: false,
                killer_streak: streak,
            }))
        };
        assert_eq!(kill(1), "[EU Main] Alpha killed Bravo with AK at 85m");
        assert_eq!(kill(3), "[EU Main] Alpha killed Bravo with AK at 85m, streak 3");
    }

    #[test]
    fn world_events_are_described() {
        let text = render_text(&notification(NotificationPayload::World {
            event: WorldEvent::MissionReady {
                mission_id: "GA_Mis4_Bunker".to_string(),
                level: 4,
            },
        }));
        assert_eq!(text, "[EU Main] mission GA_Mis4_Bunker (level 4) is ready");
    }

    #[tokio::test]
    async fn presence_without_url_is_unsupported() {
        let sink = WebhookSink::new(None, None, 5).expect("sink");
        let snapshot = PresenceSnapshot {
            guild_id: GuildId(1),
            server_id: ServerId::new("7020"),
            server_name: "EU Main".to_string(),
            online: 3,
            queued: 1,
            observed_at: 0,
        };
        let outcome = sink.publish_presence(&snapshot).await.expect("publish");
        assert_eq!(outcome, PresenceOutcome::Unsupported);
        assert!(!sink.check_target().await.expect("check"));
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use killfeed_domain::ports::{HealthCheckService, KillRepository};

use crate::services::webhook_sink::WebhookSink;

pub struct DefaultHealthService {
    kill_repo: Arc<dyn KillRepository>,
    sink: Arc<WebhookSink>,
}

impl DefaultHealthService {
    pub fn new(kill_repo: Arc<dyn KillRepository>, sink: Arc<WebhookSink>) -> Self {
        Self { kill_repo, sink }
    }
}

#[async_trait]
impl HealthCheckService for DefaultHealthService {
    async fn check_database(&self) -> anyhow::Result<bool> {
        self.kill_repo.ping().await.map(|_| true)
    }

    async fn check_notify_target(&self) -> anyhow::Result<bool> {
        self.sink.check_target().await
    }
}

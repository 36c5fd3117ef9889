use std::sync::Arc;
use std::time::Duration;

use killfeed_domain::ports::{
    ConfigRepository, HealthCheckService, KillRepository, NotificationSink,
    ParserStateRepository, PlayerSessionRepository, PresenceSink, RemoteSource,
};
use killfeed_domain::services::Classifier;
use killfeed_domain::{GuildId, ParserStateKey, RuntimeConfig, ServerId, ServerSource};

use crate::dispatch::{KeyedLocks, WorkerPool};
use crate::ops::ReconcileRegistry;
use crate::parser_state_store::ParserStateStore;
use crate::router::NotificationRouter;
use crate::{AppError, Metrics};

/// External collaborators the core is wired against.
pub struct Collaborators {
    pub remote: Arc<dyn RemoteSource>,
    pub parser_state_repo: Arc<dyn ParserStateRepository>,
    pub session_repo: Arc<dyn PlayerSessionRepository>,
    pub kill_repo: Arc<dyn KillRepository>,
    pub config_repo: Arc<dyn ConfigRepository>,
    pub notification_sink: Arc<dyn NotificationSink>,
    pub presence_sink: Arc<dyn PresenceSink>,
    pub health: Arc<dyn HealthCheckService>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub remote: Arc<dyn RemoteSource>,
    pub parser_state_repo: Arc<dyn ParserStateRepository>,
    pub session_repo: Arc<dyn PlayerSessionRepository>,
    pub kill_repo: Arc<dyn KillRepository>,
    pub config_repo: Arc<dyn ConfigRepository>,
    pub notification_sink: Arc<dyn NotificationSink>,
    pub presence_sink: Arc<dyn PresenceSink>,
    pub health: Arc<dyn HealthCheckService>,
    pub classifier: Arc<Classifier>,
    pub pool: WorkerPool,
    pub locks: Arc<KeyedLocks<ParserStateKey>>,
    pub reconciles: Arc<ReconcileRegistry>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: RuntimeConfig, ports: Collaborators) -> anyhow::Result<Self> {
        let pool = WorkerPool::new(
            config.worker_threads,
            Duration::from_secs(config.blocking_timeout_seconds.max(1)),
        );
        Ok(Self {
            config,
            remote: ports.remote,
            parser_state_repo: ports.parser_state_repo,
            session_repo: ports.session_repo,
            kill_repo: ports.kill_repo,
            config_repo: ports.config_repo,
            notification_sink: ports.notification_sink,
            presence_sink: ports.presence_sink,
            health: ports.health,
            classifier: Arc::new(Classifier::new()?),
            pool,
            locks: Arc::new(KeyedLocks::new()),
            reconciles: Arc::new(ReconcileRegistry::default()),
            metrics: Arc::new(Metrics::default()),
        })
    }

    pub fn parser_states(&self) -> ParserStateStore {
        ParserStateStore::new(self.parser_state_repo.clone())
    }

    pub fn router(&self) -> NotificationRouter {
        NotificationRouter::new(
            self.config_repo.clone(),
            self.notification_sink.clone(),
            self.metrics.clone(),
        )
    }

    pub async fn find_server(&self, guild_id: GuildId, server_id: &ServerId) -> Result<ServerSource, AppError> {
        let servers = self.config_repo.load_servers().await?;
        servers
            .into_iter()
            .find(|source| source.guild_id == guild_id && &source.server_id == server_id)
            .ok_or_else(|| AppError::NotFound(format!("server {}/{}", guild_id, server_id)))
    }
}

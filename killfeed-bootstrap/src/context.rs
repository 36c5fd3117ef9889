use std::sync::Arc;

use anyhow::Result;
use clickhouse::Client;
use tracing::{info, warn};

use killfeed_application::commands::heal_parser_states;
use killfeed_application::{AppState, Collaborators};
use killfeed_infrastructure::{
    AppConfig, ClickhouseRepo, ConfigFileRepository, DefaultHealthService, SftpRemoteSource,
    WebhookSink,
};

pub struct AppContext {
    pub state: AppState,
}

impl AppContext {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let runtime_config = config.to_runtime_config();
        let db_config = config.to_db_config();

        let mut clickhouse = Client::default()
            .with_url(&db_config.clickhouse_url)
            .with_database(&db_config.clickhouse_database);
        if let Some(user) = &db_config.clickhouse_user {
            clickhouse = clickhouse.with_user(user);
        }
        if let Some(password) = &db_config.clickhouse_password {
            clickhouse = clickhouse.with_password(password);
        }

        let repo = Arc::new(ClickhouseRepo::new(
            clickhouse,
            db_config.clickhouse_database.clone(),
        ));
        repo.ensure_schema().await?;

        let sink = Arc::new(WebhookSink::new(
            runtime_config.notify_webhook_url.clone(),
            runtime_config.presence_webhook_url.clone(),
            runtime_config.request_timeout_seconds,
        )?);
        if sink.notify_url().is_none() {
            warn!("notify_webhook_url not set, notifications are only logged");
        }

        let state = AppState::new(
            runtime_config.clone(),
            Collaborators {
                remote: Arc::new(SftpRemoteSource::new(config.to_remote_config())?),
                parser_state_repo: repo.clone(),
                session_repo: repo.clone(),
                kill_repo: repo.clone(),
                config_repo: Arc::new(ConfigFileRepository::new(&runtime_config.servers_path)),
                notification_sink: sink.clone(),
                presence_sink: sink.clone(),
                health: Arc::new(DefaultHealthService::new(repo, sink)),
            },
        )?;

        match heal_parser_states(&state).await {
            Ok(report) if report.keys_healed > 0 => info!(
                keys = report.keys_healed,
                removed = report.records_removed,
                "healed duplicate parser states"
            ),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "parser state healing failed, newest record wins until next start"),
        }

        Ok(Self { state })
    }
}

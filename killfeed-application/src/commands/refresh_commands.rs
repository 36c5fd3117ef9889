use futures_util::future::join_all;
use killfeed_domain::{GuildId, ParserKind, ServerId, ServerSource, SourceError};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::ingest::{run_presence_pass, try_killfeed_pass, KillfeedPassReport, PresencePassReport};
use crate::{AppError, AppState};

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub guild_id: GuildId,
    pub server_id: ServerId,
    pub presence: Option<PresencePassReport>,
    pub killfeed: Option<KillfeedPassReport>,
    /// Kinds skipped because another run held their key.
    pub busy: Vec<ParserKind>,
    pub errors: Vec<String>,
}

impl RefreshReport {
    pub fn failed(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub servers: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Runs both parser kinds for one configured server.
pub async fn refresh_server(state: &AppState, guild_id: GuildId, server_id: &ServerId) -> Result<RefreshReport, AppError> {
    let source = state.find_server(guild_id, server_id).await?;
    source.validate()?;
    Ok(refresh_source(state, &source).await)
}

/// One parser kind failing does not stop the other. The killfeed pass is
/// skipped while its key is held, since a reconciliation keeps it for the
/// whole run and a tick must not stall behind it.
pub async fn refresh_source(state: &AppState, source: &ServerSource) -> RefreshReport {
    let mut report = RefreshReport {
        guild_id: source.guild_id,
        server_id: source.server_id.clone(),
        presence: None,
        killfeed: None,
        busy: Vec::new(),
        errors: Vec::new(),
    };

    match run_presence_pass(state, source).await {
        Ok(pass) => report.presence = Some(pass),
        Err(err) => {
            log_pass_failure(source, "presence", &err);
            report.errors.push(format!("presence: {}", err));
        }
    }
    match try_killfeed_pass(state, source).await {
        Ok(Some(pass)) => report.killfeed = Some(pass),
        Ok(None) => {
            debug!(server = %source.key(), "killfeed busy, skipping this tick");
            report.busy.push(ParserKind::Killfeed);
        }
        Err(err) => {
            log_pass_failure(source, "killfeed", &err);
            report.errors.push(format!("killfeed: {}", err));
        }
    }
    report
}

/// Scheduler tick over every configured server. Servers run concurrently;
/// a failing server never blocks the others.
pub async fn refresh_all(state: &AppState) -> Result<TickReport, AppError> {
    let servers = state.config_repo.load_servers().await?;
    let mut tick = TickReport {
        servers: servers.len(),
        ..TickReport::default()
    };

    let mut runnable = Vec::with_capacity(servers.len());
    for source in servers {
        match source.validate() {
            Ok(()) => runnable.push(source),
            Err(err) => {
                warn!(server = %source.key(), error = %err, "server skipped until its configuration changes");
                tick.skipped += 1;
            }
        }
    }

    let reports = join_all(runnable.iter().map(|source| refresh_source(state, source))).await;
    tick.failed = reports.iter().filter(|report| report.failed()).count();
    state.metrics.record_tick(tick.failed);
    if tick.failed > 0 {
        info!(servers = tick.servers, failed = tick.failed, "tick finished with failures");
    }
    Ok(tick)
}

fn log_pass_failure(source: &ServerSource, kind: &str, err: &AppError) {
    match err {
        AppError::Source(source_err) if source_err.is_terminal() => {
            error!(server = %source.key(), kind, error = %err, "terminal source error");
        }
        AppError::Source(SourceError::NotFound(path)) => {
            warn!(server = %source.key(), kind, path = %path, "remote log not found");
        }
        _ => warn!(server = %source.key(), kind, error = %err, "pass failed, retrying next tick"),
    }
}

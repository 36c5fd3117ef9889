use killfeed_domain::ports::{PresenceOutcome, RemoteText};
use killfeed_domain::services::{ApplyMode, ClassifierContext, PlayerSessionTable};
use killfeed_domain::{
    current_millis, ColdReason, EventCategory, LogEvent, LogEventKind, Notification,
    NotificationPayload, ParserKind, ParserStateKey, PresenceCounts, PresenceSnapshot,
    ServerSource,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::router::RouteReport;
use crate::{AppError, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassMode {
    Cold,
    Hot,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresencePassReport {
    pub key: ParserStateKey,
    pub mode: PassMode,
    pub cold_reason: Option<String>,
    pub bytes_read: u64,
    pub connection_events: usize,
    pub world_events: usize,
    pub routed: RouteReport,
    pub presence: PresenceCounts,
}

/// One pass over a server's live log.
///
/// Cold when the bookmark has never been processed, was reset or points past
/// the end of a shrunken file: the whole log is replayed silently to rebuild
/// the session table. Hot otherwise: only complete lines appended since the
/// bookmark are applied and every observable change is routed.
///
/// Before a cold replay only this server's stored sessions are forced
/// offline, not the whole guild's: a guild hosts several servers and their
/// live sessions are rebuilt by their own passes.
///
/// A failed read leaves the bookmark untouched so the next tick retries.
pub async fn run_presence_pass(state: &AppState, source: &ServerSource) -> Result<PresencePassReport, AppError> {
    let key = ParserStateKey::new(source.guild_id, source.server_id.clone(), ParserKind::Presence);
    let _guard = state.locks.lock(&key).await;

    let store = state.parser_states();
    let prior = store.get(&key).await?;
    let path = source.live_log_path();

    let (reason, remote) = match prior.cold_reason(None) {
        Some(reason) => (Some(reason), read_lines(state, source, &path, 0).await?),
        None => {
            let appended = read_lines(state, source, &path, prior.offset).await?;
            match prior.cold_reason(Some(appended.file_size)) {
                Some(reason) => (Some(reason), read_lines(state, source, &path, 0).await?),
                None => (None, appended),
            }
        }
    };

    let mut context = ClassifierContext::new();
    let events = state.classifier.classify_text(&remote.text, &mut context);
    state.metrics.record_events(events.len());
    let world_events = events
        .iter()
        .filter(|event| matches!(event.kind, LogEventKind::World(_)))
        .count();
    let connection_events = events.len() - world_events;

    let now = current_millis();
    let (mode, presence, notifications) = match reason {
        Some(reason) => {
            let presence = replay_cold(state, source, &events, now, reason).await?;
            (PassMode::Cold, presence, Vec::new())
        }
        None => {
            let (presence, notifications) = apply_hot(state, source, &events).await?;
            (PassMode::Hot, presence, notifications)
        }
    };

    // The bookmark moves before delivery: a crash between the two loses
    // notifications instead of repeating them.
    let base = if mode == PassMode::Cold { prior.reset(now) } else { prior };
    let next = base.advanced(remote.end_offset, None, now);
    store.put(&next).await?;

    let routed = if notifications.is_empty() {
        RouteReport::default()
    } else {
        state.router().route_all(notifications).await
    };

    publish_presence(state, source, presence, now).await;

    debug!(
        key = %key,
        mode = ?mode,
        offset = next.offset,
        connection_events,
        world_events,
        delivered = routed.delivered,
        "presence pass finished"
    );

    Ok(PresencePassReport {
        key,
        mode,
        cold_reason: reason.map(|reason| reason.to_string()),
        bytes_read: remote.end_offset.saturating_sub(remote.start_offset),
        connection_events,
        world_events,
        routed,
        presence,
    })
}

async fn replay_cold(
    state: &AppState,
    source: &ServerSource,
    events: &[LogEvent],
    now: i64,
    reason: ColdReason,
) -> Result<PresenceCounts, AppError> {
    info!(guild = %source.guild_id, server = %source.server_id, reason = %reason, "cold replay of live log");
    state.metrics.record_cold_replay();

    // Scoped to this server so a replay never touches sessions of the
    // guild's other servers.
    let forced = state
        .pool
        .run_async(
            "force sessions offline",
            state.session_repo.mark_all_offline(source.guild_id, &source.server_id, now),
        )
        .await??;

    let mut table = PlayerSessionTable::new(source.guild_id, source.server_id.clone());
    for event in events {
        if let LogEventKind::Connection(connection) = &event.kind {
            table.apply(connection, event.timestamp, ApplyMode::Cold);
        }
    }

    let present = table.present_sessions();
    if !present.is_empty() {
        state
            .pool
            .run_async("persist sessions", state.session_repo.upsert_sessions(&present))
            .await??;
    }

    debug!(
        server = %source.server_id,
        forced_offline = forced,
        present = present.len(),
        "cold replay rebuilt sessions"
    );
    Ok(table.counts())
}

async fn apply_hot(
    state: &AppState,
    source: &ServerSource,
    events: &[LogEvent],
) -> Result<(PresenceCounts, Vec<Notification>), AppError> {
    let sessions = state
        .session_repo
        .list_sessions(source.guild_id, &source.server_id)
        .await?;
    let mut table = PlayerSessionTable::from_sessions(source.guild_id, source.server_id.clone(), sessions);

    let mut notifications = Vec::new();
    for event in events {
        match &event.kind {
            LogEventKind::Connection(connection) => {
                let outcome = table.apply(connection, event.timestamp, ApplyMode::Hot);
                if let Some(payload) = outcome.notification {
                    notifications.push(notification(source, EventCategory::Connections, event.timestamp, payload));
                }
            }
            LogEventKind::World(world) => {
                notifications.push(notification(
                    source,
                    world.category(),
                    event.timestamp,
                    NotificationPayload::World {
                        event: world.clone(),
                    },
                ));
            }
        }
    }

    let dirty = table.take_dirty();
    if !dirty.is_empty() {
        state
            .pool
            .run_async("persist sessions", state.session_repo.upsert_sessions(&dirty))
            .await??;
    }
    Ok((table.counts(), notifications))
}

async fn publish_presence(state: &AppState, source: &ServerSource, counts: PresenceCounts, now: i64) {
    let snapshot = PresenceSnapshot {
        guild_id: source.guild_id,
        server_id: source.server_id.clone(),
        server_name: source.display_name().to_string(),
        online: counts.online,
        queued: counts.queued,
        observed_at: now,
    };
    match state.presence_sink.publish_presence(&snapshot).await {
        Ok(PresenceOutcome::Published) => {}
        Ok(PresenceOutcome::Unsupported) => {
            debug!(server = %source.server_id, "presence display not supported by sink");
        }
        Err(err) => {
            warn!(server = %source.server_id, error = %err, "failed to publish presence");
        }
    }
}

pub(crate) fn notification(
    source: &ServerSource,
    category: EventCategory,
    occurred_at: i64,
    payload: NotificationPayload,
) -> Notification {
    Notification {
        guild_id: source.guild_id,
        server_id: source.server_id.clone(),
        server_name: source.display_name().to_string(),
        category,
        occurred_at,
        payload,
    }
}

pub(crate) async fn read_lines(
    state: &AppState,
    source: &ServerSource,
    path: &str,
    offset: u64,
) -> Result<RemoteText, AppError> {
    let remote = state.remote.clone();
    let source = source.clone();
    let path = path.to_string();
    let text = state
        .pool
        .run_blocking("remote read", move || remote.fetch_from(&source, &path, offset))
        .await??;
    Ok(text)
}

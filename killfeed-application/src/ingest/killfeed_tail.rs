use killfeed_domain::services::{parse_kill_csv, KillLedger};
use killfeed_domain::{
    current_millis, EventCategory, KillRecord, NotificationPayload, ParserKind, ParserStateKey,
    ServerSource,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::ingest::archive::{list_archives, newest_archive};
use crate::ingest::replay::{notification, read_lines, PassMode};
use crate::router::RouteReport;
use crate::{AppError, AppState};

#[derive(Debug, Clone, Serialize)]
pub struct KillfeedPassReport {
    pub key: ParserStateKey,
    pub mode: PassMode,
    pub file: Option<String>,
    pub rows: usize,
    pub applied: usize,
    pub duplicates: usize,
    pub skipped: u64,
    pub routed: RouteReport,
}

impl KillfeedPassReport {
    fn idle(key: ParserStateKey, mode: PassMode, file: Option<String>) -> Self {
        Self {
            key,
            mode,
            file,
            rows: 0,
            applied: 0,
            duplicates: 0,
            skipped: 0,
            routed: RouteReport::default(),
        }
    }
}

/// Tails the newest kill-log CSV.
///
/// Without a usable bookmark the newest file is bookmarked at its end and
/// nothing is announced; history belongs to the reconciler. When the game
/// rolls over to a new file, the rest of the bookmarked file is read before
/// the new one.
pub async fn run_killfeed_pass(state: &AppState, source: &ServerSource) -> Result<KillfeedPassReport, AppError> {
    let key = killfeed_key(source);
    let _guard = state.locks.lock(&key).await;
    killfeed_pass(state, source, key).await
}

/// Like [`run_killfeed_pass`] but returns `None` instead of waiting when the
/// key is held, e.g. by a reconciliation that can run for minutes.
pub async fn try_killfeed_pass(
    state: &AppState,
    source: &ServerSource,
) -> Result<Option<KillfeedPassReport>, AppError> {
    let key = killfeed_key(source);
    let Some(_guard) = state.locks.try_lock(&key).await else {
        return Ok(None);
    };
    killfeed_pass(state, source, key).await.map(Some)
}

fn killfeed_key(source: &ServerSource) -> ParserStateKey {
    ParserStateKey::new(source.guild_id, source.server_id.clone(), ParserKind::Killfeed)
}

async fn killfeed_pass(
    state: &AppState,
    source: &ServerSource,
    key: ParserStateKey,
) -> Result<KillfeedPassReport, AppError> {
    let entries = list_archives(state, source).await?;
    let Some(newest) = newest_archive(&entries) else {
        debug!(key = %key, "no kill logs listed");
        return Ok(KillfeedPassReport::idle(key, PassMode::Hot, None));
    };

    let store = state.parser_states();
    let prior = store.get(&key).await?;
    let same_file = prior.file_name.as_deref() == Some(newest.name.as_str());
    let cold = prior.cold_reason(None).or_else(|| {
        if same_file {
            prior.cold_reason(Some(newest.size))
        } else {
            None
        }
    });

    let now = current_millis();
    if let Some(reason) = cold {
        info!(key = %key, file = %newest.name, reason = %reason, "bookmarking newest kill log");
        // End of the last complete row, so a row still being written is
        // picked up once finished.
        let head = read_lines(state, source, &newest.path, 0).await?;
        let bookmark = prior.reset(now).advanced(head.end_offset, Some(newest.name.clone()), now);
        store.put(&bookmark).await?;
        return Ok(KillfeedPassReport::idle(key, PassMode::Cold, Some(newest.name)));
    }

    let mut chunks = Vec::new();
    if same_file {
        chunks.push(read_lines(state, source, &newest.path, prior.offset).await?);
    } else {
        let previous = prior
            .file_name
            .as_ref()
            .and_then(|name| entries.iter().find(|entry| &entry.name == name));
        if let Some(previous) = previous {
            chunks.push(read_lines(state, source, &previous.path, prior.offset).await?);
        }
        chunks.push(read_lines(state, source, &newest.path, 0).await?);
    }
    let end_offset = chunks.last().map(|chunk| chunk.end_offset).unwrap_or(prior.offset);

    let mut records: Vec<KillRecord> = Vec::new();
    let mut skipped = 0;
    for chunk in &chunks {
        let parsed = parse_kill_csv(source.guild_id, &source.server_id, &chunk.text);
        skipped += parsed.skipped;
        records.extend(parsed.records);
    }
    records.sort_by_key(|record| record.timestamp);
    let rows = records.len();

    let mut ledger = if records.is_empty() {
        KillLedger::new(source.guild_id, source.server_id.clone())
    } else {
        let stats = state
            .kill_repo
            .load_stats(source.guild_id, &source.server_id)
            .await?;
        KillLedger::from_stats(source.guild_id, source.server_id.clone(), stats)
    };

    let mut applied = Vec::new();
    let mut notifications = Vec::new();
    for record in records {
        let Some(outcome) = ledger.apply(&record) else {
            continue;
        };
        notifications.push(notification(
            source,
            EventCategory::Killfeed,
            record.timestamp,
            NotificationPayload::Kill {
                killer_name: record.killer_name.clone(),
                victim_name: record.victim_name.clone(),
                weapon: record.weapon.clone(),
                distance: record.distance,
                is_suicide: record.is_suicide,
                killer_streak: outcome.killer_streak,
            },
        ));
        applied.push(record);
    }

    if !applied.is_empty() {
        let stats = ledger.take_dirty();
        state
            .pool
            .run_async("persist kills", async {
                state.kill_repo.insert_kills(&applied).await?;
                state.kill_repo.upsert_stats(&stats).await
            })
            .await??;
        state.metrics.record_kills(applied.len());
    }

    store
        .put(&prior.advanced(end_offset, Some(newest.name.clone()), now))
        .await?;

    let routed = if notifications.is_empty() {
        RouteReport::default()
    } else {
        state.router().route_all(notifications).await
    };

    Ok(KillfeedPassReport {
        key,
        mode: PassMode::Hot,
        file: Some(newest.name),
        rows,
        applied: applied.len(),
        duplicates: rows - applied.len(),
        skipped,
        routed,
    })
}

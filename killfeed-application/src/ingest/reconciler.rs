use killfeed_domain::ports::RemoteEntry;
use killfeed_domain::services::{parse_kill_csv, KillLedger};
use killfeed_domain::{
    current_millis, FileFailure, KillRecord, ParserKind, ParserStateKey, ReconcileOutcome,
    ReconcilePhase, ReconcileSummary, ServerSource, SourceError,
};
use tracing::{info, warn};

use crate::ingest::archive::{list_archives, newest_archive, order_archives};
use crate::ops::ReconcileHandle;
use crate::{AppError, AppState};

/// Rebuilds every kill record and aggregate of one server from all archived
/// kill logs.
///
/// Rows of all files are buffered and sorted by timestamp before any is
/// applied, so streaks and longest distance follow true chronology. Prior
/// data is cleared once at least one file was read, which makes a rerun
/// reproduce the same aggregates. Cancellation is checked between files and
/// between batches; whatever was applied by then stays.
pub async fn reconcile_server(
    state: &AppState,
    source: &ServerSource,
    handle: &ReconcileHandle,
) -> ReconcileSummary {
    let mut summary = ReconcileSummary {
        run_id: handle.run_id.clone(),
        guild_id: source.guild_id,
        server_id: source.server_id.clone(),
        outcome: ReconcileOutcome::Completed,
        files_discovered: 0,
        files_processed: 0,
        files_failed: Vec::new(),
        total_rows: 0,
        applied_rows: 0,
        duplicate_rows: 0,
        skipped_rows: 0,
    };

    match run(state, source, handle, &mut summary).await {
        Ok(()) => {}
        Err(err) => {
            warn!(guild = %source.guild_id, server = %source.server_id, error = %err, "reconciliation aborted");
            handle.update(|progress| {
                progress.phase = ReconcilePhase::Failed;
                progress.message = Some(err.to_string());
            });
            summary.outcome = if summary.files_processed == 0 {
                ReconcileOutcome::NoReadableFiles
            } else {
                ReconcileOutcome::Failed
            };
            state.metrics.record_reconcile(false);
            return summary;
        }
    }

    let phase = match summary.outcome {
        ReconcileOutcome::Completed => ReconcilePhase::Completed,
        ReconcileOutcome::Cancelled => ReconcilePhase::Cancelled,
        ReconcileOutcome::NoReadableFiles | ReconcileOutcome::Failed => ReconcilePhase::Failed,
    };
    handle.update(|progress| {
        progress.phase = phase;
        if summary.outcome == ReconcileOutcome::NoReadableFiles {
            progress.message = Some("no readable kill logs".to_string());
        }
    });
    state.metrics.record_reconcile(summary.succeeded());
    info!(
        guild = %source.guild_id,
        server = %source.server_id,
        outcome = ?summary.outcome,
        files = summary.files_processed,
        failed = summary.files_failed.len(),
        applied = summary.applied_rows,
        "reconciliation finished"
    );
    summary
}

async fn run(
    state: &AppState,
    source: &ServerSource,
    handle: &ReconcileHandle,
    summary: &mut ReconcileSummary,
) -> Result<(), AppError> {
    let key = ParserStateKey::new(source.guild_id, source.server_id.clone(), ParserKind::Killfeed);
    let _guard = state.locks.lock(&key).await;

    handle.update(|progress| progress.phase = ReconcilePhase::Discovering);
    let entries = order_archives(list_archives(state, source).await?);
    summary.files_discovered = entries.len() as u32;
    handle.update(|progress| {
        progress.files_discovered = summary.files_discovered;
        progress.phase = ReconcilePhase::Reading;
    });

    // Rows keep (file index, row index) order inside one timestamp.
    let mut buffered: Vec<KillRecord> = Vec::new();
    let newest = newest_archive(&entries);
    let mut newest_end: Option<u64> = None;
    for entry in &entries {
        if handle.is_cancelled() {
            summary.outcome = ReconcileOutcome::Cancelled;
            return Ok(());
        }
        let is_newest = newest.as_ref().is_some_and(|newest| newest.name == entry.name);
        match read_archive(state, source, entry, is_newest).await {
            Ok(read) => {
                summary.skipped_rows += read.skipped;
                summary.files_processed += 1;
                buffered.extend(read.records);
                if is_newest {
                    newest_end = Some(read.end_offset);
                }
            }
            Err(err) => {
                warn!(path = %entry.path, error = %err, "kill log unreadable, skipping");
                summary.files_failed.push(FileFailure {
                    path: entry.path.clone(),
                    error: err.to_string(),
                });
            }
        }
        handle.update(|progress| {
            progress.files_processed = summary.files_processed;
            progress.files_failed = summary.files_failed.len() as u32;
            progress.rows_total = buffered.len() as u64;
        });
    }

    if summary.files_processed == 0 {
        summary.outcome = ReconcileOutcome::NoReadableFiles;
        return Ok(());
    }

    let buffered = state
        .pool
        .run_blocking("sort kill rows", move || {
            buffered.sort_by_key(|record| record.timestamp);
            buffered
        })
        .await?;
    summary.total_rows = buffered.len() as u64;
    handle.update(|progress| {
        progress.phase = ReconcilePhase::Applying;
        progress.rows_total = summary.total_rows;
    });

    state
        .pool
        .run_async(
            "clear kill data",
            state.kill_repo.clear_server(source.guild_id, &source.server_id),
        )
        .await??;

    let mut ledger = KillLedger::new(source.guild_id, source.server_id.clone());
    let batch_size = state.config.reconcile_batch_size.max(1);
    for batch in buffered.chunks(batch_size) {
        if handle.is_cancelled() {
            summary.outcome = ReconcileOutcome::Cancelled;
            return Ok(());
        }

        let mut applied = Vec::with_capacity(batch.len());
        for record in batch {
            if ledger.apply(record).is_some() {
                applied.push(record.clone());
            } else {
                summary.duplicate_rows += 1;
            }
        }
        let stats = ledger.take_dirty();
        state
            .pool
            .run_async("apply kill batch", async {
                state.kill_repo.insert_kills(&applied).await?;
                state.kill_repo.upsert_stats(&stats).await
            })
            .await??;

        summary.applied_rows += applied.len() as u64;
        handle.update(|progress| progress.rows_applied = summary.applied_rows);
        tokio::task::yield_now().await;
    }
    state.metrics.record_kills(summary.applied_rows as usize);

    // Bookmark the live tail at the end of the newest archive so history is
    // not announced again as new kills.
    if let Some(newest) = newest {
        let offset = newest_end.unwrap_or(newest.size);
        let store = state.parser_states();
        let now = current_millis();
        let prior = store.get(&key).await?;
        store
            .put(&prior.reset(now).advanced(offset, Some(newest.name), now))
            .await?;
    }

    Ok(())
}

struct ArchiveRead {
    records: Vec<KillRecord>,
    skipped: u64,
    end_offset: u64,
}

/// Reads and parses one archive on the worker pool. The newest archive may
/// still be growing, so only its complete rows are taken and `end_offset`
/// stops at the last row boundary.
async fn read_archive(
    state: &AppState,
    source: &ServerSource,
    entry: &RemoteEntry,
    still_written: bool,
) -> Result<ArchiveRead, AppError> {
    let remote = state.remote.clone();
    let source = source.clone();
    let path = entry.path.clone();
    let read = state
        .pool
        .run_blocking("archive read", move || {
            let text = if still_written {
                remote.fetch_from(&source, &path, 0)?
            } else {
                remote.fetch(&source, &path)?
            };
            let parsed = parse_kill_csv(source.guild_id, &source.server_id, &text.text);
            Ok::<_, SourceError>(ArchiveRead {
                records: parsed.records,
                skipped: parsed.skipped,
                end_offset: text.end_offset,
            })
        })
        .await??;
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::killfeed_tail::run_killfeed_pass;
    use crate::testing::Harness;

    fn path(harness: &Harness, name: &str) -> String {
        format!("{}/{}", harness.kill_dir(), name)
    }

    fn handle(harness: &Harness) -> ReconcileHandle {
        ReconcileHandle::detached(&harness.source.key(), "run-test")
    }

    #[tokio::test]
    async fn applies_rows_in_timestamp_order_across_files() {
        let harness = Harness::new();
        // Lexically first file holds the later kill.
        harness.remote.put_with_mtime(&path(&harness, "a.csv"), "2024.01.15-10.00.00;Bar;B;Foo;A;SVD;10\n", Some(2));
        harness.remote.put_with_mtime(&path(&harness, "b.csv"), "2024.01.15-09.00.00;Foo;A;Bar;B;AK;50\n", Some(1));

        let summary = reconcile_server(&harness.state, &harness.source, &handle(&harness)).await;

        assert_eq!(summary.outcome, ReconcileOutcome::Completed);
        assert_eq!(summary.applied_rows, 2);
        let foo = harness.kills.stats_for(harness.source.guild_id, &harness.source.server_id, "a").expect("foo");
        let bar = harness.kills.stats_for(harness.source.guild_id, &harness.source.server_id, "b").expect("bar");
        // 09:00 applied before 10:00: Foo's streak was reset by the later death.
        assert_eq!((foo.kills, foo.deaths, foo.current_streak, foo.best_streak), (1, 1, 0, 1));
        assert_eq!(bar.current_streak, 1);
    }

    #[tokio::test]
    async fn embedded_file_timestamps_order_files() {
        let harness = Harness::new();
        harness.remote.put(&path(&harness, "2024.01.15-10.00.00.csv"), "2024.01.15-10.00.00;Bar;B;Foo;A;SVD;10\n");
        harness.remote.put(&path(&harness, "2024.01.15-09.00.00.csv"), "2024.01.15-09.00.00;Foo;A;Bar;B;AK;50\n");

        reconcile_server(&harness.state, &harness.source, &handle(&harness)).await;
        let kills = harness.kills.kills();
        assert_eq!(kills[0].killer_name, "Foo");
        assert_eq!(kills[1].killer_name, "Bar");
    }

    #[tokio::test]
    async fn rerun_produces_identical_aggregates() {
        let harness = Harness::new();
        harness.remote.put(
            &path(&harness, "2024.01.15-09.00.00.csv"),
            "2024.01.15-09.00.00;Foo;A;Bar;B;AK;50\n2024.01.15-09.05.00;Foo;A;Baz;C;AK;150\n2024.01.15-09.05.00;Foo;A;Baz;C;AK;150\n",
        );
        harness.remote.put(
            &path(&harness, "2024.01.15-10.00.00.csv"),
            "2024.01.15-10.00.00;Bar;B;Bar;B;suicide_by_relocation;0\n",
        );

        let first = reconcile_server(&harness.state, &harness.source, &handle(&harness)).await;
        let stats_first = harness.kills.all_stats();
        let second = reconcile_server(&harness.state, &harness.source, &handle(&harness)).await;
        let stats_second = harness.kills.all_stats();

        assert_eq!(first.duplicate_rows, 1);
        assert_eq!(first.applied_rows, second.applied_rows);
        assert_eq!(stats_first, stats_second);
        assert_eq!(harness.kills.kill_count(), 3);
    }

    #[tokio::test]
    async fn unreadable_files_are_recorded_not_fatal() {
        let harness = Harness::new();
        harness.remote.put(&path(&harness, "2024.01.15-09.00.00.csv"), "2024.01.15-09.00.00;Foo;A;Bar;B;AK;50\n");
        harness.remote.put(&path(&harness, "2024.01.15-10.00.00.csv"), "ignored\n");
        harness.remote.fail(
            &path(&harness, "2024.01.15-10.00.00.csv"),
            SourceError::Decode { path: "x".into(), tried: "utf-8".into() },
        );

        let summary = reconcile_server(&harness.state, &harness.source, &handle(&harness)).await;
        assert!(summary.succeeded());
        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.files_failed.len(), 1);
    }

    #[tokio::test]
    async fn zero_readable_files_is_a_distinct_failure() {
        let harness = Harness::new();
        harness.remote.put(&path(&harness, "2024.01.15-09.00.00.csv"), "x\n");
        harness.remote.fail(&path(&harness, "2024.01.15-09.00.00.csv"), SourceError::Timeout("read".into()));

        let run = handle(&harness);
        let summary = reconcile_server(&harness.state, &harness.source, &run).await;
        assert_eq!(summary.outcome, ReconcileOutcome::NoReadableFiles);
        assert!(!summary.succeeded());
        assert_eq!(run.snapshot().phase, ReconcilePhase::Failed);
    }

    #[tokio::test]
    async fn cancellation_stops_before_applying() {
        let harness = Harness::new();
        harness.remote.put(&path(&harness, "2024.01.15-09.00.00.csv"), "2024.01.15-09.00.00;Foo;A;Bar;B;AK;50\n");
        let run = handle(&harness);
        run.cancel();

        let summary = reconcile_server(&harness.state, &harness.source, &run).await;
        assert_eq!(summary.outcome, ReconcileOutcome::Cancelled);
        assert_eq!(harness.kills.kill_count(), 0);
        assert_eq!(run.snapshot().phase, ReconcilePhase::Cancelled);
    }

    #[tokio::test]
    async fn live_tail_resumes_after_newest_archive() {
        let harness = Harness::new();
        let newest = path(&harness, "2024.01.15-10.00.00.csv");
        harness.remote.put(&path(&harness, "2024.01.15-09.00.00.csv"), "2024.01.15-09.00.00;Foo;A;Bar;B;AK;50\n");
        harness.remote.put(&newest, "2024.01.15-10.00.00;Bar;B;Foo;A;SVD;10\n");
        reconcile_server(&harness.state, &harness.source, &handle(&harness)).await;

        let report = run_killfeed_pass(&harness.state, &harness.source).await.expect("tail");
        assert_eq!(report.mode, crate::ingest::PassMode::Hot);
        assert_eq!(report.rows, 0);

        harness.remote.append(&newest, "2024.01.15-10.05.00;Foo;A;Bar;B;AK;60\n");
        let report = run_killfeed_pass(&harness.state, &harness.source).await.expect("tail");
        assert_eq!(report.applied, 1);
        assert_eq!(harness.sink.deliveries().len(), 1);
        assert_eq!(harness.kills.kill_count(), 3);
    }

    #[tokio::test]
    async fn half_written_row_in_newest_archive_reaches_the_tail() {
        let harness = Harness::new();
        let older = path(&harness, "2024.01.15-09.00.00.csv");
        let newest = path(&harness, "2024.01.15-10.00.00.csv");
        // Closed archives need no trailing newline.
        harness.remote.put(&older, "2024.01.15-09.00.00;Foo;A;Bar;B;AK;50");
        harness.remote.put(
            &newest,
            "2024.01.15-10.00.00;Bar;B;Foo;A;SVD;10\n2024.01.15-10.05.00;Foo;A;Ba",
        );

        let summary = reconcile_server(&harness.state, &harness.source, &handle(&harness)).await;
        assert_eq!(summary.applied_rows, 2);
        assert_eq!(summary.skipped_rows, 0);

        harness.remote.append(&newest, "r;B;AK;60\n");
        let report = run_killfeed_pass(&harness.state, &harness.source).await.expect("tail");
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(harness.kills.kill_count(), 3);
    }
}

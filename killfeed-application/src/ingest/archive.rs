use killfeed_domain::ports::RemoteEntry;
use killfeed_domain::{parse_file_name_timestamp, ServerSource};

use crate::{AppError, AppState};

/// Lists the server's kill-log directory on the worker pool.
pub async fn list_archives(state: &AppState, source: &ServerSource) -> Result<Vec<RemoteEntry>, AppError> {
    let remote = state.remote.clone();
    let source = source.clone();
    let entries = state
        .pool
        .run_blocking("remote list", move || {
            remote.list(&source, &source.kill_log_dir(), &source.kill_log_pattern)
        })
        .await??;
    Ok(entries)
}

/// Decision timestamp of an archived kill log: the one embedded in the file
/// name, else the listing's modification time.
pub fn archive_timestamp(entry: &RemoteEntry) -> Option<i64> {
    parse_file_name_timestamp(&entry.name).or(entry.modified_at)
}

/// Oldest first. Files with no usable timestamp go last, by name.
pub fn order_archives(mut entries: Vec<RemoteEntry>) -> Vec<RemoteEntry> {
    entries.sort_by(|a, b| {
        let (ta, tb) = (archive_timestamp(a), archive_timestamp(b));
        match (ta, tb) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        }
    });
    entries
}

pub fn newest_archive(entries: &[RemoteEntry]) -> Option<RemoteEntry> {
    order_archives(entries.to_vec())
        .into_iter()
        .rev()
        .find(|entry| archive_timestamp(entry).is_some())
        .or_else(|| order_archives(entries.to_vec()).pop())
}

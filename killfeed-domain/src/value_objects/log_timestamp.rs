// Game log timestamps
//
// Live log lines start with `[2024.01.15-12.30.45:123]`, kill rows and archive
// file names use `2024.01.15-12.30.45`. Both are UTC.

use chrono::NaiveDateTime;

pub const LINE_PREFIX_WIDTH: usize = 25;

const LINE_FORMAT: &str = "%Y.%m.%d-%H.%M.%S:%3f";
const ROW_FORMAT: &str = "%Y.%m.%d-%H.%M.%S";
const ROW_WIDTH: usize = 19;

/// Parses the fixed-width prefix of a live-log line into epoch millis.
pub fn parse_line_prefix(line: &str) -> Option<i64> {
    let prefix = line.get(..LINE_PREFIX_WIDTH)?;
    let inner = prefix.strip_prefix('[')?.strip_suffix(']')?;
    NaiveDateTime::parse_from_str(inner, LINE_FORMAT)
        .ok()
        .map(|value| value.and_utc().timestamp_millis())
}

/// Parses a kill-row timestamp (`2024.01.15-12.30.45`) into epoch millis.
pub fn parse_row_timestamp(value: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(value.trim(), ROW_FORMAT)
        .ok()
        .map(|value| value.and_utc().timestamp_millis())
}

/// Extracts the timestamp embedded in an archive name like `2024.01.15-00.00.00.csv`.
pub fn parse_file_name_timestamp(file_name: &str) -> Option<i64> {
    let stem = file_name.rsplit('/').next().unwrap_or(file_name);
    let candidate = stem.get(..ROW_WIDTH)?;
    parse_row_timestamp(candidate)
}

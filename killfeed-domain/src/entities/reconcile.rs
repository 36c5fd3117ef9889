// Historical reconciliation progress and results

use serde::{Deserialize, Serialize};

use crate::value_objects::{GuildId, ServerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePhase {
    #[default]
    Pending,
    Discovering,
    Reading,
    Applying,
    Completed,
    Failed,
    Cancelled,
}

impl ReconcilePhase {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ReconcilePhase::Completed | ReconcilePhase::Failed | ReconcilePhase::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReconcileProgress {
    pub run_id: String,
    pub guild_id: GuildId,
    pub server_id: ServerId,
    pub phase: ReconcilePhase,
    pub files_discovered: u32,
    pub files_processed: u32,
    pub files_failed: u32,
    pub rows_total: u64,
    pub rows_applied: u64,
    pub started_at: i64,
    pub updated_at: i64,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Completed,
    NoReadableFiles,
    Failed,
    Cancelled,
}

/// Structured summary reported instead of a bare error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub run_id: String,
    pub guild_id: GuildId,
    pub server_id: ServerId,
    pub outcome: ReconcileOutcome,
    pub files_discovered: u32,
    pub files_processed: u32,
    pub files_failed: Vec<FileFailure>,
    pub total_rows: u64,
    pub applied_rows: u64,
    pub duplicate_rows: u64,
    pub skipped_rows: u64,
}

impl ReconcileSummary {
    pub fn succeeded(&self) -> bool {
        self.outcome == ReconcileOutcome::Completed && self.files_processed > 0
    }
}

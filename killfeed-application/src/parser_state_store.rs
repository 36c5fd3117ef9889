use std::sync::Arc;

use killfeed_domain::ports::ParserStateRepository;
use killfeed_domain::{current_millis, ParserState, ParserStateKey};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealReport {
    pub keys_healed: usize,
    pub records_removed: u64,
}

/// Durable parser bookmarks, one per (guild, server, kind).
///
/// Callers must hold the key's lock from [`crate::dispatch::KeyedLocks`]
/// around a get/put cycle.
#[derive(Clone)]
pub struct ParserStateStore {
    repo: Arc<dyn ParserStateRepository>,
}

impl ParserStateStore {
    pub fn new(repo: Arc<dyn ParserStateRepository>) -> Self {
        Self { repo }
    }

    /// Returns the stored state, or a fresh cold state when none exists.
    /// Duplicate records resolve to the most recently updated one.
    pub async fn get(&self, key: &ParserStateKey) -> anyhow::Result<ParserState> {
        let states = self.repo.find_states(key).await?;
        if states.len() > 1 {
            warn!(key = %key, records = states.len(), "duplicate parser state records, using newest");
        }
        Ok(newest(states).unwrap_or_else(|| ParserState::fresh(key.clone(), current_millis())))
    }

    pub async fn put(&self, state: &ParserState) -> anyhow::Result<()> {
        self.repo.upsert_state(state).await
    }

    pub async fn reset(&self, key: &ParserStateKey) -> anyhow::Result<ParserState> {
        let current = self.get(key).await?;
        let reset = current.reset(current_millis().max(current.updated_at + 1));
        self.put(&reset).await?;
        info!(key = %key, "parser state reset");
        Ok(reset)
    }

    /// One-time migration: keeps the newest record per duplicated key and
    /// deletes the rest.
    pub async fn heal_duplicates(&self) -> anyhow::Result<HealReport> {
        let mut report = HealReport::default();
        for key in self.repo.find_duplicate_keys().await? {
            let states = self.repo.find_states(&key).await?;
            let Some(keep) = newest(states) else {
                continue;
            };
            let removed = self.repo.delete_stale_states(&key, keep.updated_at).await?;
            // Rewrite the survivor so the key ends up with exactly one record
            // even when several shared the newest timestamp.
            self.repo.upsert_state(&keep).await?;
            report.keys_healed += 1;
            report.records_removed += removed;
        }
        if report.keys_healed > 0 {
            info!(
                keys = report.keys_healed,
                removed = report.records_removed,
                "healed duplicate parser state records"
            );
        }
        Ok(report)
    }
}

fn newest(states: Vec<ParserState>) -> Option<ParserState> {
    states
        .into_iter()
        .max_by_key(|state| (state.updated_at, state.last_processed_at, state.offset))
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use killfeed_domain::{current_millis, ReconcilePhase, ReconcileProgress, ReconcileSummary, ServerKey};
use serde::Serialize;
use tokio::sync::{watch, RwLock};

use crate::AppError;

struct RunSlot {
    progress: watch::Sender<ReconcileProgress>,
    cancel: Arc<AtomicBool>,
    summary: Option<ReconcileSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileStatus {
    pub progress: ReconcileProgress,
    pub summary: Option<ReconcileSummary>,
}

/// Handle the running reconciler reports through.
#[derive(Clone)]
pub struct ReconcileHandle {
    pub run_id: String,
    progress: watch::Sender<ReconcileProgress>,
    cancel: Arc<AtomicBool>,
}

impl ReconcileHandle {
    /// A handle that no registry tracks, for inline runs.
    pub fn detached(key: &ServerKey, run_id: &str) -> Self {
        let (progress, _rx) = watch::channel(initial_progress(key, run_id));
        Self {
            run_id: run_id.to_string(),
            progress,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn update(&self, apply: impl FnOnce(&mut ReconcileProgress)) {
        self.progress.send_modify(|progress| {
            apply(progress);
            progress.updated_at = current_millis();
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReconcileProgress {
        self.progress.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReconcileProgress> {
        self.progress.subscribe()
    }
}

/// At most one reconciliation per server at a time, with progress, result
/// and cancellation visible to other callers.
#[derive(Default)]
pub struct ReconcileRegistry {
    runs: RwLock<HashMap<ServerKey, RunSlot>>,
}

impl ReconcileRegistry {
    pub async fn begin(&self, key: &ServerKey, run_id: &str) -> Result<ReconcileHandle, AppError> {
        let mut runs = self.runs.write().await;
        if let Some(slot) = runs.get(key) {
            if !slot.progress.borrow().phase.is_finished() {
                return Err(AppError::Conflict(format!(
                    "reconciliation already running for {}",
                    key
                )));
            }
        }

        let (progress, _rx) = watch::channel(initial_progress(key, run_id));
        let cancel = Arc::new(AtomicBool::new(false));
        runs.insert(
            key.clone(),
            RunSlot {
                progress: progress.clone(),
                cancel: cancel.clone(),
                summary: None,
            },
        );
        Ok(ReconcileHandle {
            run_id: run_id.to_string(),
            progress,
            cancel,
        })
    }

    pub async fn finish(&self, key: &ServerKey, summary: ReconcileSummary) {
        let mut runs = self.runs.write().await;
        if let Some(slot) = runs.get_mut(key) {
            if slot.progress.borrow().run_id == summary.run_id {
                slot.summary = Some(summary);
            }
        }
    }

    pub async fn status(&self, key: &ServerKey) -> Option<ReconcileStatus> {
        let runs = self.runs.read().await;
        runs.get(key).map(|slot| ReconcileStatus {
            progress: slot.progress.borrow().clone(),
            summary: slot.summary.clone(),
        })
    }

    pub async fn subscribe(&self, key: &ServerKey) -> Option<watch::Receiver<ReconcileProgress>> {
        let runs = self.runs.read().await;
        runs.get(key).map(|slot| slot.progress.subscribe())
    }

    /// Requests cooperative cancellation. Returns false when nothing is running.
    pub async fn cancel(&self, key: &ServerKey) -> bool {
        let runs = self.runs.read().await;
        match runs.get(key) {
            Some(slot) if !slot.progress.borrow().phase.is_finished() => {
                slot.cancel.store(true, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    pub async fn running(&self) -> Vec<ReconcileProgress> {
        let runs = self.runs.read().await;
        runs.values()
            .map(|slot| slot.progress.borrow().clone())
            .filter(|progress| !progress.phase.is_finished())
            .collect()
    }
}

fn initial_progress(key: &ServerKey, run_id: &str) -> ReconcileProgress {
    let now = current_millis();
    ReconcileProgress {
        run_id: run_id.to_string(),
        guild_id: key.guild_id,
        server_id: key.server_id.clone(),
        phase: ReconcilePhase::Pending,
        started_at: now,
        updated_at: now,
        ..ReconcileProgress::default()
    }
}

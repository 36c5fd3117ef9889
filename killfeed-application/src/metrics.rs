use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    ticks: AtomicU64,
    tick_failures: AtomicU64,
    cold_replays: AtomicU64,
    events_classified: AtomicU64,
    notifications_delivered: AtomicU64,
    notifications_unresolved: AtomicU64,
    notification_failures: AtomicU64,
    kills_ingested: AtomicU64,
    reconcile_runs: AtomicU64,
    reconcile_failures: AtomicU64,
}

impl Metrics {
    pub fn record_tick(&self, failures: usize) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.tick_failures
            .fetch_add(failures as u64, Ordering::Relaxed);
    }

    pub fn record_cold_replay(&self) {
        self.cold_replays.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events(&self, count: usize) {
        self.events_classified
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_routing(&self, delivered: usize, unresolved: usize, failed: usize) {
        self.notifications_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.notifications_unresolved
            .fetch_add(unresolved as u64, Ordering::Relaxed);
        self.notification_failures
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn record_kills(&self, count: usize) {
        self.kills_ingested.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_reconcile(&self, succeeded: bool) {
        self.reconcile_runs.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.reconcile_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn notifications_delivered(&self) -> u64 {
        self.notifications_delivered.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let counters = [
            ("killfeed_ticks_total", &self.ticks),
            ("killfeed_tick_failures_total", &self.tick_failures),
            ("killfeed_cold_replays_total", &self.cold_replays),
            ("killfeed_events_classified_total", &self.events_classified),
            ("killfeed_notifications_delivered_total", &self.notifications_delivered),
            ("killfeed_notifications_unresolved_total", &self.notifications_unresolved),
            ("killfeed_notification_failures_total", &self.notification_failures),
            ("killfeed_kills_ingested_total", &self.kills_ingested),
            ("killfeed_reconcile_runs_total", &self.reconcile_runs),
            ("killfeed_reconcile_failures_total", &self.reconcile_failures),
        ];

        let mut out = String::new();
        for (name, counter) in counters {
            out.push_str(&format!(
                "# TYPE {} counter\n{} {}\n",
                name,
                name,
                counter.load(Ordering::Relaxed)
            ));
        }
        out
    }
}

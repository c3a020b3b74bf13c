use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryStatsSnapshot {
    pub enqueued: u64,
    pub delivered: u64,
    pub failed: u64,
    /// Records delivered on the shutdown path instead of by the worker.
    pub drained_on_shutdown: u64,
}

impl DeliveryStatsSnapshot {
    /// Records for which a delivery attempt has finished.
    pub fn attempted(&self) -> u64 {
        self.delivered + self.failed
    }

    pub fn in_flight(&self) -> u64 {
        self.enqueued.saturating_sub(self.attempted())
    }
}

/// Lock-free delivery counters.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    drained_on_shutdown: AtomicU64,
}

impl DeliveryStats {
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drained_on_shutdown(&self, count: u64) {
        self.drained_on_shutdown.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            drained_on_shutdown: self.drained_on_shutdown.load(Ordering::Relaxed),
        }
    }
}

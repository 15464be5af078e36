use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Per-engine recomputation counters. Shared with background tasks, which
/// bump `computed` themselves; everything else is counted on the publish
/// context.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    scheduled: AtomicU64,
    cancelled: AtomicU64,
    computed: AtomicU64,
    published: AtomicU64,
    /// Completions whose generation was superseded before they arrived.
    discarded_stale: AtomicU64,
    skipped_empty: AtomicU64,
    rejected_config: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineMetricsSnapshot {
    pub scheduled: u64,
    pub cancelled: u64,
    pub computed: u64,
    pub published: u64,
    pub discarded_stale: u64,
    pub skipped_empty: u64,
    pub rejected_config: u64,
}

impl EngineMetrics {
    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            scheduled: self.scheduled.load(Relaxed),
            cancelled: self.cancelled.load(Relaxed),
            computed: self.computed.load(Relaxed),
            published: self.published.load(Relaxed),
            discarded_stale: self.discarded_stale.load(Relaxed),
            skipped_empty: self.skipped_empty.load(Relaxed),
            rejected_config: self.rejected_config.load(Relaxed),
        }
    }

    pub(crate) fn incr_scheduled(&self) {
        self.scheduled.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_cancelled(&self) {
        self.cancelled.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_computed(&self) {
        self.computed.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_published(&self) {
        self.published.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_discarded_stale(&self) {
        self.discarded_stale.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_skipped_empty(&self) {
        self.skipped_empty.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_rejected_config(&self) {
        self.rejected_config.fetch_add(1, Relaxed);
    }
}

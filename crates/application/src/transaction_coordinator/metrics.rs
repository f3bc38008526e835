use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time copy of coordinator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Transactions started.
    pub attempted: u64,
    /// Transactions committed.
    pub succeeded: u64,
    /// Transactions rolled back.
    pub failed: u64,
    /// Extra attempts made by retry loops.
    pub retried: u64,
    /// Cached reads served from the cache.
    pub cache_hits: u64,
    /// Cached reads that fell through to the store.
    pub cache_misses: u64,
    /// Invalidation entries that failed after commit.
    pub flush_failures: u64,
    /// Audit records that could not be delivered.
    pub audit_failures: u64,
    /// Cumulative time spent inside transactions.
    pub total_duration: Duration,
}

#[derive(Debug, Default)]
pub(super) struct CoordinatorMetrics {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    flush_failures: AtomicU64,
    audit_failures: AtomicU64,
    duration_micros: AtomicU64,
}

impl CoordinatorMetrics {
    pub(super) fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_success(&self, elapsed: Duration) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.add_duration(elapsed);
    }

    pub(super) fn record_failure(&self, elapsed: Duration) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.add_duration(elapsed);
    }

    pub(super) fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_flush_failures(&self, count: usize) {
        self.flush_failures
            .fetch_add(u64::try_from(count).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub(super) fn record_audit_failure(&self) {
        self.audit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            audit_failures: self.audit_failures.load(Ordering::Relaxed),
            total_duration: Duration::from_micros(self.duration_micros.load(Ordering::Relaxed)),
        }
    }

    fn add_duration(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.duration_micros.fetch_add(micros, Ordering::Relaxed);
    }
}

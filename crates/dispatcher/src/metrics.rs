//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single sink, shared by every route that targets it
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Records appended successfully
    written: AtomicU64,
    /// Appends or filters that returned an error or panicked
    failed: AtomicU64,
    /// Records rejected by a route filter
    filtered: AtomicU64,
    /// Records routed to a sink name that is not registered
    unresolved: AtomicU64,
    /// Records routed to a sink that was not started
    dropped: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    pub fn unresolved(&self) -> u64 {
        self.unresolved.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the previous failure count
    pub(crate) fn inc_failed(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn inc_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the previous unresolved count
    pub(crate) fn inc_unresolved(&self) -> u64 {
        self.unresolved.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            written: self.written(),
            failed: self.failed(),
            filtered: self.filtered(),
            unresolved: self.unresolved(),
            dropped: self.dropped(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub written: u64,
    pub failed: u64,
    pub filtered: u64,
    pub unresolved: u64,
    pub dropped: u64,
}

impl MetricsSnapshot {
    /// Records that reached the route, whatever happened next
    pub fn total(&self) -> u64 {
        self.written + self.failed + self.filtered + self.unresolved + self.dropped
    }
}

//! Per-cache counters.
//!
//! Counters are relaxed atomics bumped inline by
//! [`MemoCache`](crate::memo::MemoCache); [`snapshot`] copies them out for
//! tests, benches and exporters. They are observational only and never feed
//! back into caching decisions.

pub mod snapshot;

use std::sync::atomic::{AtomicU64, Ordering};

pub use snapshot::MemoMetricsSnapshot;

#[derive(Debug, Default)]
pub(crate) struct MemoCounters {
    calls: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    computes: AtomicU64,
    body_errors: AtomicU64,
    passthroughs: AtomicU64,
    evicted_entries: AtomicU64,
    purged_entries: AtomicU64,
    cleared_entries: AtomicU64,
}

#[inline]
fn bump(counter: &AtomicU64, by: usize) {
    counter.fetch_add(by as u64, Ordering::Relaxed);
}

impl MemoCounters {
    pub(crate) fn record_call(&self) {
        bump(&self.calls, 1);
    }

    pub(crate) fn record_hit(&self) {
        bump(&self.hits, 1);
    }

    pub(crate) fn record_miss(&self, expired: bool) {
        bump(&self.misses, 1);
        if expired {
            bump(&self.expired, 1);
        }
    }

    pub(crate) fn record_compute(&self, ok: bool) {
        if ok {
            bump(&self.computes, 1);
        } else {
            bump(&self.body_errors, 1);
        }
    }

    pub(crate) fn record_passthrough(&self) {
        bump(&self.passthroughs, 1);
    }

    pub(crate) fn record_evicted(&self, n: usize) {
        bump(&self.evicted_entries, n);
    }

    pub(crate) fn record_purged(&self, n: usize) {
        bump(&self.purged_entries, n);
    }

    pub(crate) fn record_cleared(&self, n: usize) {
        bump(&self.cleared_entries, n);
    }

    pub(crate) fn snapshot(&self, entry_count: usize) -> MemoMetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MemoMetricsSnapshot {
            calls: load(&self.calls),
            hits: load(&self.hits),
            misses: load(&self.misses),
            expired: load(&self.expired),
            computes: load(&self.computes),
            body_errors: load(&self.body_errors),
            passthroughs: load(&self.passthroughs),
            evicted_entries: load(&self.evicted_entries),
            purged_entries: load(&self.purged_entries),
            cleared_entries: load(&self.cleared_entries),
            entry_count,
        }
    }
}

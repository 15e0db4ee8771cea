//! Storage strategies for memoized results.
//!
//! A strategy owns the stored entries of a cache and answers lookups for its
//! shape (no key, one key, many keys). Expiration and the get-or-compute
//! decision live in [`MemoCache`](crate::memo::MemoCache); strategies only
//! record *when* each entry was stored.
//!
//! ## Strategy Comparison
//!
//! | Strategy     | Entries | Key used | Partial invalidation | Capacity eviction |
//! |--------------|---------|----------|----------------------|-------------------|
//! | `ThunkStore` | 0..=1   | no       | no-op                | no                |
//! | `SingleCell` | 0..=1   | yes      | no-op                | no                |
//! | `TableStore` | 0..     | yes      | yes                  | yes               |

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::key::CacheKey;
use crate::pattern::KeyPattern;

/// Snapshot of store-level metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    pub inserts: u64,
    pub updates: u64,
    pub removes: u64,
    pub evictions: u64,
    pub purged: u64,
}

/// Relaxed atomic counters behind [`StoreMetrics`].
#[derive(Debug, Default)]
pub(crate) struct StoreCounters {
    inserts: AtomicU64,
    updates: AtomicU64,
    removes: AtomicU64,
    evictions: AtomicU64,
    purged: AtomicU64,
}

impl StoreCounters {
    pub(crate) fn snapshot(&self) -> StoreMetrics {
        StoreMetrics {
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_put(&self, replaced: bool) {
        if replaced {
            self.updates.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inserts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn add_removes(&self, n: usize) {
        self.removes.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_evictions(&self, n: usize) {
        self.evictions.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_purged(&self, n: usize) {
        self.purged.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// A stored result together with its insertion time.
#[derive(Debug)]
pub struct Stamped<V> {
    pub value: Arc<V>,
    pub stored_at: Instant,
}

impl<V> Clone for Stamped<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            stored_at: self.stored_at,
        }
    }
}

/// Operations every storage shape supports.
///
/// All methods take `&self`; implementations synchronize internally so that
/// concurrent callers never corrupt the stored entries.
pub trait StorageStrategy<V>: Send + Sync {
    /// Returns the entry stored under `key`, if any. Expiry is not checked.
    fn get(&self, key: &CacheKey) -> Option<Stamped<V>>;

    /// Stores `value` under `key`, stamped with `now`.
    fn put(&self, key: CacheKey, value: Arc<V>, now: Instant);

    /// Number of stored entries, expired or not.
    fn count(&self) -> usize;

    /// Number of stored entries whose key matches `pattern`.
    fn count_matching(&self, pattern: &KeyPattern) -> usize;

    /// Removes every entry.
    fn clear(&self);

    /// Removes the entry stored under `key`. Returns `true` if one existed.
    fn remove(&self, key: &CacheKey) -> bool;

    /// Removes every entry whose key matches `pattern`.
    fn clear_matching(&self, pattern: &KeyPattern) -> usize;

    /// Snapshot of `(key, stored_at)` for every entry.
    fn stamps(&self) -> Vec<(CacheKey, Instant)>;

    /// Removes the entries matching `scope` whose timestamp satisfies
    /// `expired`. Returns how many were removed.
    fn purge(&self, scope: &KeyPattern, expired: &dyn Fn(Instant) -> bool) -> usize;

    /// Snapshot the store's metrics.
    fn metrics(&self) -> StoreMetrics;
}

//! Keyed table storage.
//!
//! ## Architecture
//!
//! ```text
//!   TableStore
//!   └── RwLock<TableInner>
//!       ├── entries: FxHashMap<CacheKey, Stamped<V>>   (value + stored_at)
//!       └── ages:    LazyMinHeap<CacheKey, Instant>    (oldest-first index)
//! ```
//!
//! Both structures change under the same write lock, so the age index never
//! disagrees with the entries. Capacity eviction, partial invalidation and
//! purges run inline under that lock; lookups take the read lock.
//!
//! A table may be shared by several caches (see
//! [`StorageSource`](crate::store::source::StorageSource)); each caller then
//! passes its own [`CapacityPolicy`] to [`TableStore::put_bounded`].
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! use memokit::args;
//! use memokit::key::CacheKey;
//! use memokit::policy::capacity::CapacityPolicy;
//! use memokit::store::table::TableStore;
//! use memokit::store::traits::StorageStrategy;
//!
//! let table: TableStore<u64> = TableStore::new();
//! let policy = CapacityPolicy::try_new(2, 0.5).unwrap();
//! let now = Instant::now();
//! for n in 0..3 {
//!     table.put_bounded(CacheKey::from_components(args![n]), Arc::new(n as u64), now, Some(&policy));
//! }
//! assert_eq!(table.count(), 2);
//! assert!(table.get(&CacheKey::from_components(args![0])).is_none());
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::ds::LazyMinHeap;
use crate::error::ConfigError;
use crate::key::{CacheKey, EqualityTest};
use crate::pattern::KeyPattern;
use crate::policy::capacity::CapacityPolicy;
use crate::store::traits::{Stamped, StorageStrategy, StoreCounters, StoreMetrics};

/// Stale heap entries tolerated per live key before the age index is rebuilt.
const AGE_REBUILD_FACTOR: usize = 4;

struct TableInner<V> {
    entries: FxHashMap<CacheKey, Stamped<V>>,
    ages: LazyMinHeap<CacheKey, Instant>,
}

impl<V> TableInner<V> {
    fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            ages: LazyMinHeap::new(),
        }
    }

    fn remove_key(&mut self, key: &CacheKey) -> bool {
        self.ages.remove(key);
        self.entries.remove(key).is_some()
    }

    /// Removes up to `n` entries with the smallest `stored_at`.
    fn evict_oldest(&mut self, n: usize) -> usize {
        let mut evicted = 0;
        while evicted < n {
            let Some((key, _)) = self.ages.pop_best() else {
                break;
            };
            if self.entries.remove(&key).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    /// Two passes: collect the doomed keys, then remove them.
    fn remove_where(&mut self, doomed: impl Fn(&CacheKey, &Stamped<V>) -> bool) -> usize {
        let keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|&(key, entry)| doomed(key, entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.remove_key(key);
        }
        self.ages.maybe_rebuild(AGE_REBUILD_FACTOR);
        keys.len()
    }
}

/// Thread-safe map from [`CacheKey`] to stamped results.
pub struct TableStore<V> {
    inner: RwLock<TableInner<V>>,
    test: EqualityTest,
    metrics: StoreCounters,
}

impl<V> TableStore<V> {
    /// Creates an empty table using structural equality.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TableInner::new()),
            test: EqualityTest::Structural,
            metrics: StoreCounters::default(),
        }
    }

    /// Creates an empty table keyed under `test`.
    ///
    /// # Panics
    ///
    /// Panics on a custom test. See [`try_with_test`](Self::try_with_test).
    pub fn with_test(test: EqualityTest) -> Self {
        match Self::try_with_test(test) {
            Ok(table) => table,
            Err(e) => panic!("{}", e),
        }
    }

    /// Creates an empty table keyed under `test`, rejecting tests that
    /// cannot be expressed through hashing.
    pub fn try_with_test(test: EqualityTest) -> Result<Self, ConfigError> {
        if !test.is_hashable() {
            return Err(ConfigError::CustomEqualityOnTable);
        }
        Ok(Self {
            inner: RwLock::new(TableInner::new()),
            test,
            metrics: StoreCounters::default(),
        })
    }

    /// The equality test keys stored here were derived with.
    pub fn test(&self) -> &EqualityTest {
        &self.test
    }

    /// Snapshot of all stored keys.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.inner.read().entries.keys().cloned().collect()
    }

    /// Stores `value`, first evicting the oldest entries if `capacity` says
    /// the table is full. Returns the number of evicted entries.
    pub fn put_bounded(
        &self,
        key: CacheKey,
        value: Arc<V>,
        now: Instant,
        capacity: Option<&CapacityPolicy>,
    ) -> usize {
        let mut inner = self.inner.write();
        let evicted = match capacity {
            Some(policy) if policy.must_evict(inner.entries.len()) => {
                let evicted = inner.evict_oldest(policy.number_to_remove());
                tracing::debug!(
                    evicted,
                    capacity = policy.capacity(),
                    "evicted oldest table entries"
                );
                evicted
            },
            _ => 0,
        };
        inner.ages.update(key.clone(), now);
        let previous = inner.entries.insert(
            key,
            Stamped {
                value,
                stored_at: now,
            },
        );
        inner.ages.maybe_rebuild(AGE_REBUILD_FACTOR);
        debug_assert_eq!(inner.ages.len(), inner.entries.len());
        debug_assert!(inner.ages.heap_len() <= inner.entries.len() * AGE_REBUILD_FACTOR);
        drop(inner);

        self.metrics.add_evictions(evicted);
        self.metrics.record_put(previous.is_some());
        evicted
    }
}

impl<V> Default for TableStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for TableStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("TableStore")
            .field("len", &inner.entries.len())
            .field("age_index", &inner.ages.heap_len())
            .field("test", &self.test)
            .finish()
    }
}

impl<V> StorageStrategy<V> for TableStore<V>
where
    V: Send + Sync,
{
    fn get(&self, key: &CacheKey) -> Option<Stamped<V>> {
        self.inner.read().entries.get(key).cloned()
    }

    fn put(&self, key: CacheKey, value: Arc<V>, now: Instant) {
        self.put_bounded(key, value, now, None);
    }

    fn count(&self) -> usize {
        self.inner.read().entries.len()
    }

    fn count_matching(&self, pattern: &KeyPattern) -> usize {
        if pattern.is_empty() {
            return self.count();
        }
        self.inner
            .read()
            .entries
            .keys()
            .filter(|key| pattern.matches(key))
            .count()
    }

    fn clear(&self) {
        let mut inner = self.inner.write();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.ages.clear();
        drop(inner);
        self.metrics.add_removes(removed);
    }

    fn remove(&self, key: &CacheKey) -> bool {
        let removed = self.inner.write().remove_key(key);
        if removed {
            self.metrics.add_removes(1);
        }
        removed
    }

    fn clear_matching(&self, pattern: &KeyPattern) -> usize {
        let removed = self
            .inner
            .write()
            .remove_where(|key, _| pattern.matches(key));
        self.metrics.add_removes(removed);
        removed
    }

    fn stamps(&self) -> Vec<(CacheKey, Instant)> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.stored_at))
            .collect()
    }

    fn purge(&self, scope: &KeyPattern, expired: &dyn Fn(Instant) -> bool) -> usize {
        let purged = self.inner.write().remove_where(|key, entry| {
            expired(entry.stored_at) && scope.matches(key)
        });
        self.metrics.add_purged(purged);
        purged
    }

    fn metrics(&self) -> StoreMetrics {
        self.metrics.snapshot()
    }
}

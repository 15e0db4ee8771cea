//! Single-cell storage: remembers only the most recent call.
//!
//! A lookup hits only when its key equals the stored key under the cell's
//! [`EqualityTest`]. Storing a different key replaces the cell; no history is
//! kept, so alternating between two keys always misses.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::key::{CacheKey, EqualityTest};
use crate::pattern::KeyPattern;
use crate::store::traits::{Stamped, StorageStrategy, StoreCounters, StoreMetrics};

struct Cell<V> {
    key: CacheKey,
    entry: Stamped<V>,
}

/// One `(key, value, stored_at)` triple guarded by a lock.
pub struct SingleCellStore<V> {
    cell: RwLock<Option<Cell<V>>>,
    test: EqualityTest,
    metrics: StoreCounters,
}

impl<V> SingleCellStore<V> {
    pub fn new(test: EqualityTest) -> Self {
        Self {
            cell: RwLock::new(None),
            test,
            metrics: StoreCounters::default(),
        }
    }

    pub fn test(&self) -> &EqualityTest {
        &self.test
    }

    /// Returns the key currently held, if any.
    pub fn stored_key(&self) -> Option<CacheKey> {
        self.cell.read().as_ref().map(|cell| cell.key.clone())
    }
}

impl<V> fmt::Debug for SingleCellStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleCellStore")
            .field("key", &self.stored_key())
            .field("test", &self.test)
            .finish()
    }
}

impl<V> StorageStrategy<V> for SingleCellStore<V>
where
    V: Send + Sync,
{
    fn get(&self, key: &CacheKey) -> Option<Stamped<V>> {
        let cell = self.cell.read();
        cell.as_ref()
            .filter(|cell| self.test.keys_equal(key, &cell.key))
            .map(|cell| cell.entry.clone())
    }

    fn put(&self, key: CacheKey, value: Arc<V>, now: Instant) {
        let mut cell = self.cell.write();
        let replaced = cell
            .as_ref()
            .is_some_and(|current| self.test.keys_equal(&key, &current.key));
        *cell = Some(Cell {
            key,
            entry: Stamped {
                value,
                stored_at: now,
            },
        });
        self.metrics.record_put(replaced);
    }

    fn count(&self) -> usize {
        usize::from(self.cell.read().is_some())
    }

    // Caches over a single cell are never shared, so they only pass the
    // empty pattern here; other patterns matter to direct store users.
    fn count_matching(&self, pattern: &KeyPattern) -> usize {
        let cell = self.cell.read();
        cell.as_ref()
            .filter(|cell| pattern.matches(&cell.key))
            .map_or(0, |_| 1)
    }

    fn clear(&self) {
        self.cell.write().take();
    }

    fn remove(&self, key: &CacheKey) -> bool {
        let mut cell = self.cell.write();
        let hit = cell
            .as_ref()
            .is_some_and(|current| self.test.keys_equal(key, &current.key));
        if hit {
            *cell = None;
            self.metrics.add_removes(1);
        }
        hit
    }

    fn clear_matching(&self, _pattern: &KeyPattern) -> usize {
        0
    }

    fn stamps(&self) -> Vec<(CacheKey, Instant)> {
        self.cell
            .read()
            .as_ref()
            .map(|cell| (cell.key.clone(), cell.entry.stored_at))
            .into_iter()
            .collect()
    }

    fn purge(&self, scope: &KeyPattern, expired: &dyn Fn(Instant) -> bool) -> usize {
        let mut cell = self.cell.write();
        let stale = cell.as_ref().is_some_and(|current| {
            scope.matches(&current.key) && expired(current.entry.stored_at)
        });
        if stale {
            *cell = None;
            self.metrics.add_purged(1);
        }
        usize::from(stale)
    }

    fn metrics(&self) -> StoreMetrics {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;

    fn key(n: i64) -> CacheKey {
        CacheKey::from_components(args![n])
    }

    #[test]
    fn hits_only_the_latest_key() {
        let store = SingleCellStore::new(EqualityTest::Structural);
        let now = Instant::now();
        store.put(key(1), Arc::new("one"), now);
        assert_eq!(store.get(&key(1)).map(|e| *e.value), Some("one"));

        store.put(key(2), Arc::new("two"), now);
        assert!(store.get(&key(1)).is_none());
        assert_eq!(store.get(&key(2)).map(|e| *e.value), Some("two"));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn custom_test_decides_hits() {
        let parity = EqualityTest::custom(|a, b| {
            let first = |k: &CacheKey| k.components()[0].as_int().map(|n| n % 2);
            first(a) == first(b)
        });
        let store = SingleCellStore::new(parity);
        store.put(key(2), Arc::new(20), Instant::now());
        assert_eq!(store.get(&key(4)).map(|e| *e.value), Some(20));
        assert!(store.get(&key(3)).is_none());
    }

    #[test]
    fn remove_requires_matching_key() {
        let store = SingleCellStore::new(EqualityTest::Structural);
        store.put(key(1), Arc::new(1), Instant::now());
        assert!(!store.remove(&key(2)));
        assert_eq!(store.count(), 1);
        assert!(store.remove(&key(1)));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn clear_matching_is_unsupported_no_op() {
        let store = SingleCellStore::new(EqualityTest::Structural);
        store.put(key(1), Arc::new(1), Instant::now());
        assert_eq!(store.clear_matching(&KeyPattern::new()), 0);
        assert_eq!(store.count(), 1);
        assert_eq!(store.count_matching(&KeyPattern::new().exact(1)), 1);
        assert_eq!(store.count_matching(&KeyPattern::new().exact(2)), 0);
    }

    #[test]
    fn purge_honors_predicate() {
        let store = SingleCellStore::new(EqualityTest::Structural);
        let now = Instant::now();
        store.put(key(1), Arc::new(1), now);
        assert_eq!(store.purge(&KeyPattern::new(), &|_| false), 0);
        assert_eq!(store.purge(&KeyPattern::new(), &|at| at == now), 1);
        assert!(store.stamps().is_empty());
    }
}

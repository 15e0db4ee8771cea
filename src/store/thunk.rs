//! Storage for zero-argument bodies: at most one result, no key.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::key::CacheKey;
use crate::pattern::KeyPattern;
use crate::store::traits::{Stamped, StorageStrategy, StoreCounters, StoreMetrics};

/// Holds the single result of a thunk.
pub struct ThunkStore<V> {
    slot: RwLock<Option<Stamped<V>>>,
    metrics: StoreCounters,
}

impl<V> ThunkStore<V> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
            metrics: StoreCounters::default(),
        }
    }
}

impl<V> Default for ThunkStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for ThunkStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThunkStore")
            .field("filled", &self.slot.read().is_some())
            .finish()
    }
}

impl<V> StorageStrategy<V> for ThunkStore<V>
where
    V: Send + Sync,
{
    fn get(&self, _key: &CacheKey) -> Option<Stamped<V>> {
        self.slot.read().clone()
    }

    fn put(&self, _key: CacheKey, value: Arc<V>, now: Instant) {
        let previous = self.slot.write().replace(Stamped {
            value,
            stored_at: now,
        });
        self.metrics.record_put(previous.is_some());
    }

    fn count(&self) -> usize {
        usize::from(self.slot.read().is_some())
    }

    fn count_matching(&self, pattern: &KeyPattern) -> usize {
        if pattern.is_empty() { self.count() } else { 0 }
    }

    fn clear(&self) {
        self.slot.write().take();
    }

    fn remove(&self, _key: &CacheKey) -> bool {
        let removed = self.slot.write().take().is_some();
        if removed {
            self.metrics.add_removes(1);
        }
        removed
    }

    fn clear_matching(&self, _pattern: &KeyPattern) -> usize {
        0
    }

    fn stamps(&self) -> Vec<(CacheKey, Instant)> {
        self.slot
            .read()
            .as_ref()
            .map(|entry| (CacheKey::from_components(Vec::new()), entry.stored_at))
            .into_iter()
            .collect()
    }

    fn purge(&self, _scope: &KeyPattern, expired: &dyn Fn(Instant) -> bool) -> usize {
        let mut slot = self.slot.write();
        match slot.as_ref() {
            Some(entry) if expired(entry.stored_at) => {
                *slot = None;
                self.metrics.add_purged(1);
                1
            },
            _ => 0,
        }
    }

    fn metrics(&self) -> StoreMetrics {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn no_key() -> CacheKey {
        CacheKey::from_components(Vec::new())
    }

    #[test]
    fn stores_one_value_and_ignores_key() {
        let store = ThunkStore::new();
        let now = Instant::now();
        assert!(store.get(&no_key()).is_none());
        assert_eq!(store.count(), 0);

        store.put(no_key(), Arc::new(7), now);
        let other = CacheKey::from_components(vec![crate::value::Value::Int(1)]);
        assert_eq!(store.get(&other).map(|e| *e.value), Some(7));
        assert_eq!(store.count(), 1);

        store.put(no_key(), Arc::new(8), now);
        assert_eq!(store.count(), 1);
        assert_eq!(store.get(&no_key()).map(|e| *e.value), Some(8));
        assert_eq!(store.metrics().inserts, 1);
        assert_eq!(store.metrics().updates, 1);
    }

    #[test]
    fn partial_invalidation_is_a_no_op() {
        let store = ThunkStore::new();
        store.put(no_key(), Arc::new("x"), Instant::now());
        assert_eq!(store.clear_matching(&KeyPattern::new()), 0);
        assert_eq!(store.count(), 1);
        store.clear();
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn purge_removes_only_expired() {
        let store = ThunkStore::new();
        let stored = Instant::now();
        store.put(no_key(), Arc::new(1u8), stored);

        let cutoff = stored + Duration::from_secs(1);
        assert_eq!(store.purge(&KeyPattern::new(), &|at| at >= cutoff), 0);
        assert_eq!(store.count(), 1);
        assert_eq!(store.purge(&KeyPattern::new(), &|at| at <= cutoff), 1);
        assert_eq!(store.count(), 0);
        assert_eq!(store.stamps().len(), 0);
    }
}

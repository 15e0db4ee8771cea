//! The memoizing cache.
//!
//! [`MemoCache`] ties a body to a storage strategy, an expiration policy and
//! an optional capacity policy, and implements the get-or-compute decision:
//!
//! ```text
//!   call(args)
//!     │
//!     ├─ storage unresolved? ──────────────▶ run body, return (uncached)
//!     │
//!     ├─ key = compute_cache_key(args)
//!     ├─ entry = storage.get(key)
//!     │
//!     ├─ entry present and not expired ───▶ return entry.value
//!     │
//!     └─ run body
//!          ├─ Err(e) ─────────────────────▶ return Err(e)   (nothing stored)
//!          └─ Ok(v)  ─▶ evict if full ─▶ put(key, v, now) ─▶ return v
//! ```
//!
//! ## Concurrency
//!
//! The body runs outside every storage lock and calls are not coalesced: two
//! threads missing the same key at once both run the body and the later
//! `put` wins. Storage itself is always internally consistent.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use memokit::args;
//! use memokit::builder::MemoBuilder;
//!
//! let runs = Arc::new(AtomicUsize::new(0));
//! let counter = runs.clone();
//! let double = MemoBuilder::new("math::double").build(move |args| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     Ok::<_, std::convert::Infallible>(args[0].as_int().unwrap_or(0) * 2)
//! });
//!
//! assert_eq!(*double.call(&args![3]).unwrap(), 6);
//! assert_eq!(*double.call(&args![3]).unwrap(), 6);
//! assert_eq!(runs.load(Ordering::SeqCst), 1);
//! assert_eq!(double.entry_count(), 1);
//! ```

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::expiry::Expiration;
use crate::key::{CacheId, CacheKey, EqualityTest, compute_cache_key};
use crate::metrics::{MemoCounters, MemoMetricsSnapshot};
use crate::pattern::KeyPattern;
use crate::policy::capacity::CapacityPolicy;
use crate::store::{Bound, Storage, StorageKind};
use crate::traits::CacheAdmin;
use crate::value::Value;

/// The wrapped computation.
pub type Body<V, E> = Arc<dyn Fn(&[Value]) -> Result<V, E> + Send + Sync>;

/// A memoized computation with its storage and policies.
///
/// Built with [`MemoBuilder`](crate::builder::MemoBuilder).
pub struct MemoCache<V, E = Infallible> {
    id: CacheId,
    storage: Storage<V>,
    expiration: Expiration,
    body: Body<V, E>,
    shared: bool,
    capacity: Option<CapacityPolicy>,
    metrics: MemoCounters,
}

impl<V, E> MemoCache<V, E>
where
    V: Send + Sync + 'static,
    E: 'static,
{
    pub(crate) fn from_parts(
        id: CacheId,
        storage: Storage<V>,
        expiration: Expiration,
        body: Body<V, E>,
        shared: bool,
        capacity: Option<CapacityPolicy>,
    ) -> Self {
        Self {
            id,
            storage,
            expiration,
            body,
            shared,
            capacity,
            metrics: MemoCounters::default(),
        }
    }

    /// Returns the cached result for `args`, computing and storing it on a
    /// miss or after expiry.
    ///
    /// An `Err` from the body is returned as-is and nothing is stored.
    pub fn call(&self, args: &[Value]) -> Result<Arc<V>, E> {
        self.metrics.record_call();
        let Some(bound) = self.storage.bind() else {
            tracing::warn!(cache = %self.id, "backing table unavailable, running uncached");
            self.metrics.record_passthrough();
            return self.run_body(args);
        };

        let key = self.key_with(args, bound.test());
        let expired = match bound.strategy().get(&key) {
            Some(entry) if !self.expiration.is_expired(Some(entry.stored_at)) => {
                self.metrics.record_hit();
                return Ok(entry.value);
            },
            Some(_) => true,
            None => false,
        };
        self.metrics.record_miss(expired);

        let value = self.run_body(args)?;
        self.store(&bound, key, Arc::clone(&value));
        Ok(value)
    }

    /// Calls a zero-argument cache.
    pub fn call0(&self) -> Result<Arc<V>, E> {
        self.call(&[])
    }

    /// Returns the stored, unexpired result for `args` without running the
    /// body.
    pub fn peek(&self, args: &[Value]) -> Option<Arc<V>> {
        let bound = self.storage.bind()?;
        let key = self.key_with(args, bound.test());
        bound
            .strategy()
            .get(&key)
            .filter(|entry| !self.expiration.is_expired(Some(entry.stored_at)))
            .map(|entry| entry.value)
    }

    /// Stores `value` for `args` as if the body had just produced it.
    /// Returns `false` if the backing table is unavailable.
    pub fn prime(&self, args: &[Value], value: V) -> bool {
        let Some(bound) = self.storage.bind() else {
            return false;
        };
        let key = self.key_with(args, bound.test());
        self.store(&bound, key, Arc::new(value));
        true
    }

    /// Key `args` are stored under, or `None` while the backing table is
    /// unresolved.
    pub fn cache_key(&self, args: &[Value]) -> Option<CacheKey> {
        let bound = self.storage.bind()?;
        Some(self.key_with(args, bound.test()))
    }

    pub fn id(&self) -> &CacheId {
        &self.id
    }

    pub fn kind(&self) -> StorageKind {
        self.storage.kind()
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn capacity(&self) -> Option<&CapacityPolicy> {
        self.capacity.as_ref()
    }

    pub fn time_to_live(&self) -> Option<Duration> {
        self.expiration.time_to_live()
    }

    /// Changes the TTL. Stored entries are judged by the new value on their
    /// next lookup or purge.
    pub fn set_time_to_live(&self, ttl: Option<Duration>) {
        self.expiration.set_time_to_live(ttl);
    }

    /// Removes this cache's entries.
    pub fn clear(&self) -> usize {
        let Some(bound) = self.storage.bind() else {
            return 0;
        };
        let removed = if self.shared {
            bound.strategy().clear_matching(&self.own_scope())
        } else {
            let count = bound.strategy().count();
            bound.strategy().clear();
            count
        };
        tracing::debug!(cache = %self.id, removed, "cleared cache");
        self.metrics.record_cleared(removed);
        removed
    }

    /// Removes the entry stored for exactly `args`.
    pub fn clear_args(&self, args: &[Value]) -> bool {
        let Some(bound) = self.storage.bind() else {
            return false;
        };
        let key = self.key_with(args, bound.test());
        let removed = bound.strategy().remove(&key);
        if removed {
            self.metrics.record_cleared(1);
        }
        removed
    }

    /// Removes the entries whose arguments match `pattern`.
    ///
    /// The pattern describes arguments only; shared caches add their
    /// identity prefix themselves. Thunk and single-cell storage have
    /// nothing to select from and ignore the call.
    pub fn clear_matching(&self, pattern: &KeyPattern) -> usize {
        let Some(bound) = self.storage.bind() else {
            return 0;
        };
        let mut pattern = pattern.derived(bound.test());
        if self.shared {
            pattern = pattern.prefixed(self.id.as_symbol());
        }
        let removed = bound.strategy().clear_matching(&pattern);
        if removed > 0 {
            tracing::debug!(cache = %self.id, removed, "cleared matching entries");
        }
        self.metrics.record_cleared(removed);
        removed
    }

    /// Removes the entries that are expired under the current TTL.
    pub fn purge(&self) -> usize {
        let Some(ttl) = self.expiration.time_to_live() else {
            return 0;
        };
        let Some(bound) = self.storage.bind() else {
            return 0;
        };
        let now = self.expiration.now();
        let expiration = &self.expiration;
        let purged = bound
            .strategy()
            .purge(&self.own_scope(), &|stored_at: Instant| {
                expiration.is_expired_at(stored_at, ttl, now)
            });
        if purged > 0 {
            tracing::debug!(cache = %self.id, purged, "purged expired entries");
        }
        self.metrics.record_purged(purged);
        purged
    }

    /// Number of stored entries, expired ones included.
    pub fn entry_count(&self) -> usize {
        match self.storage.bind() {
            Some(bound) if self.shared => bound.strategy().count_matching(&self.own_scope()),
            Some(bound) => bound.strategy().count(),
            None => 0,
        }
    }

    pub fn metrics(&self) -> MemoMetricsSnapshot {
        self.metrics.snapshot(self.entry_count())
    }

    fn run_body(&self, args: &[Value]) -> Result<Arc<V>, E> {
        let result = (self.body)(args);
        self.metrics.record_compute(result.is_ok());
        result.map(Arc::new)
    }

    fn key_with(&self, args: &[Value], test: &EqualityTest) -> CacheKey {
        match self.storage.kind() {
            StorageKind::Thunk => CacheKey::from_components(Vec::new()),
            _ => compute_cache_key(args, self.shared.then_some(&self.id), test),
        }
    }

    /// Pattern selecting the entries that belong to this cache.
    fn own_scope(&self) -> KeyPattern {
        if self.shared {
            KeyPattern::new().exact(self.id.as_symbol())
        } else {
            KeyPattern::new()
        }
    }

    fn store(&self, bound: &Bound<'_, V>, key: CacheKey, value: Arc<V>) {
        let now = self.expiration.now();
        match bound {
            Bound::Table(table) => {
                let evicted = table.put_bounded(key, value, now, self.capacity.as_ref());
                self.metrics.record_evicted(evicted);
            },
            Bound::Local(strategy, _) => strategy.put(key, value, now),
        }
    }
}

impl<V, E> CacheAdmin for MemoCache<V, E>
where
    V: Send + Sync + 'static,
    E: 'static,
{
    fn id(&self) -> &CacheId {
        MemoCache::id(self)
    }

    fn kind(&self) -> StorageKind {
        MemoCache::kind(self)
    }

    fn is_shared(&self) -> bool {
        self.shared
    }

    fn time_to_live(&self) -> Option<Duration> {
        MemoCache::time_to_live(self)
    }

    fn clear(&self) -> usize {
        MemoCache::clear(self)
    }

    fn clear_args(&self, args: &[Value]) -> bool {
        MemoCache::clear_args(self, args)
    }

    fn clear_matching(&self, pattern: &KeyPattern) -> usize {
        MemoCache::clear_matching(self, pattern)
    }

    fn purge(&self) -> usize {
        MemoCache::purge(self)
    }

    fn entry_count(&self) -> usize {
        MemoCache::entry_count(self)
    }

    fn metrics(&self) -> MemoMetricsSnapshot {
        MemoCache::metrics(self)
    }
}

impl<V, E> fmt::Debug for MemoCache<V, E>
where
    V: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("id", &self.id)
            .field("storage", &self.storage.describe())
            .field("expiration", &self.expiration)
            .field("shared", &self.shared)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

//! Construction of memoizing caches.
//!
//! [`MemoConfig`] holds the plain settings and knows which combinations are
//! valid; [`MemoBuilder`] is the fluent front end that also carries the parts
//! that cannot live in a plain struct (identity, clock, backing table).
//!
//! | Setting          | Default        | Valid for             |
//! |------------------|----------------|-----------------------|
//! | `time_to_live`   | none (forever) | all storage kinds     |
//! | `capacity`       | none           | table (else ignored)  |
//! | `reduce_ratio`   | 0.2            | table with capacity   |
//! | `equality`       | structural     | custom: single-cell   |
//! | `shared`         | false          | table                 |
//! | `backing`        | own table      | table                 |
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use memokit::args;
//! use memokit::builder::MemoBuilder;
//!
//! let square = MemoBuilder::new("math::square")
//!     .time_to_live(Duration::from_secs(60))
//!     .capacity(1_000)
//!     .build(|args| Ok::<_, String>(args[0].as_int().unwrap_or(0).pow(2)));
//!
//! assert_eq!(*square.call(&args![12]).unwrap(), 144);
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::expiry::{Clock, Expiration, SystemClock};
use crate::key::{CacheId, EqualityTest};
use crate::memo::{Body, MemoCache};
use crate::policy::capacity::{CapacityPolicy, DEFAULT_REDUCE_RATIO};
use crate::registry::Registry;
use crate::store::source::TableBinding;
use crate::store::{SingleCellStore, Storage, StorageKind, StorageSource, TableStore, ThunkStore};
use crate::value::Value;

/// Plain cache settings.
#[derive(Debug, Clone)]
pub struct MemoConfig {
    pub storage: StorageKind,
    pub time_to_live: Option<Duration>,
    pub capacity: Option<usize>,
    pub reduce_ratio: f64,
    pub equality: EqualityTest,
    /// Prefix keys with the cache identity so several caches can share one
    /// table.
    pub shared: bool,
    /// The table comes from a [`StorageSource`] instead of being allocated.
    pub backed: bool,
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            storage: StorageKind::Table,
            time_to_live: None,
            capacity: None,
            reduce_ratio: DEFAULT_REDUCE_RATIO,
            equality: EqualityTest::Structural,
            shared: false,
            backed: false,
        }
    }
}

impl MemoConfig {
    /// Checks the settings against each other.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let is_table = self.storage == StorageKind::Table;
        if self.capacity == Some(0) {
            return Err(ConfigError::ZeroCapacity);
        }
        if !self.reduce_ratio.is_finite() || self.reduce_ratio <= 0.0 || self.reduce_ratio > 1.0 {
            return Err(ConfigError::ReduceRatio(self.reduce_ratio));
        }
        if self.shared && !is_table {
            return Err(ConfigError::SharedWithoutTable);
        }
        if self.backed && !is_table {
            return Err(ConfigError::BackingWithoutTable);
        }
        if is_table && !self.equality.is_hashable() {
            return Err(ConfigError::CustomEqualityOnTable);
        }
        Ok(())
    }

    /// The capacity policy, if a capacity is set.
    pub fn capacity_policy(&self) -> Result<Option<CapacityPolicy>, ConfigError> {
        self.capacity
            .map(|capacity| CapacityPolicy::try_new(capacity, self.reduce_ratio))
            .transpose()
    }
}

/// Fluent builder for [`MemoCache`].
///
/// The value type `V` is usually inferred from the body passed to
/// [`build`](Self::build).
pub struct MemoBuilder<V> {
    id: CacheId,
    config: MemoConfig,
    clock: Arc<dyn Clock>,
    backing: Option<StorageSource<V>>,
}

impl<V> MemoBuilder<V>
where
    V: Send + Sync + 'static,
{
    /// Starts a builder for the cache identified by `id`
    /// (`"namespace::name"` or a bare `"name"`).
    pub fn new(id: impl Into<CacheId>) -> Self {
        Self {
            id: id.into(),
            config: MemoConfig::default(),
            clock: Arc::new(SystemClock),
            backing: None,
        }
    }

    /// Replaces all plain settings at once.
    pub fn config(mut self, config: MemoConfig) -> Self {
        self.config = config;
        self
    }

    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.config.time_to_live = Some(ttl);
        self
    }

    /// Bounds the table to `capacity` entries.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = Some(capacity);
        self
    }

    /// Fraction of the capacity evicted at once when the table is full.
    pub fn reduce_ratio(mut self, ratio: f64) -> Self {
        self.config.reduce_ratio = ratio;
        self
    }

    pub fn equality(mut self, test: EqualityTest) -> Self {
        self.config.equality = test;
        self
    }

    pub fn shared(mut self, shared: bool) -> Self {
        self.config.shared = shared;
        self
    }

    /// Keeps only the most recent call's result.
    pub fn single_cell(mut self) -> Self {
        self.config.storage = StorageKind::SingleCell;
        self
    }

    /// Uses a table owned elsewhere.
    pub fn backing(mut self, source: StorageSource<V>) -> Self {
        self.config.backed = true;
        self.backing = Some(source);
        self
    }

    /// Time source for expiration; [`SystemClock`] by default.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds a cache around `body`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid. For a non-panicking
    /// alternative, use [`try_build`](Self::try_build).
    pub fn build<E, F>(self, body: F) -> MemoCache<V, E>
    where
        E: 'static,
        F: Fn(&[Value]) -> Result<V, E> + Send + Sync + 'static,
    {
        match self.try_build(body) {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }

    /// Builds a cache around `body`, returning an error on invalid settings
    /// instead of panicking.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the identity is empty or the settings are
    /// inconsistent (see [`MemoConfig::validate`]).
    pub fn try_build<E, F>(self, body: F) -> Result<MemoCache<V, E>, ConfigError>
    where
        E: 'static,
        F: Fn(&[Value]) -> Result<V, E> + Send + Sync + 'static,
    {
        self.assemble(Arc::new(body))
    }

    /// Builds a cache around a zero-argument body.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn build_thunk<E, F>(self, body: F) -> MemoCache<V, E>
    where
        E: 'static,
        F: Fn() -> Result<V, E> + Send + Sync + 'static,
    {
        match self.try_build_thunk(body) {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }

    /// Non-panicking variant of [`build_thunk`](Self::build_thunk).
    pub fn try_build_thunk<E, F>(mut self, body: F) -> Result<MemoCache<V, E>, ConfigError>
    where
        E: 'static,
        F: Fn() -> Result<V, E> + Send + Sync + 'static,
    {
        self.config.storage = StorageKind::Thunk;
        self.assemble(Arc::new(move |_: &[Value]| body()))
    }

    /// Builds the cache and registers it in `registry`.
    ///
    /// # Errors
    ///
    /// Same as [`try_build`](Self::try_build).
    pub fn try_build_in<E, F>(
        self,
        registry: &Registry,
        body: F,
    ) -> Result<Arc<MemoCache<V, E>>, ConfigError>
    where
        E: 'static,
        F: Fn(&[Value]) -> Result<V, E> + Send + Sync + 'static,
    {
        let cache = Arc::new(self.try_build(body)?);
        registry.register(cache.clone());
        Ok(cache)
    }

    /// Builds the cache and registers it in `registry`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn build_in<E, F>(self, registry: &Registry, body: F) -> Arc<MemoCache<V, E>>
    where
        E: 'static,
        F: Fn(&[Value]) -> Result<V, E> + Send + Sync + 'static,
    {
        match self.try_build_in(registry, body) {
            Ok(cache) => cache,
            Err(e) => panic!("{}", e),
        }
    }

    fn assemble<E: 'static>(self, body: Body<V, E>) -> Result<MemoCache<V, E>, ConfigError> {
        if self.id.name().is_empty() {
            return Err(ConfigError::EmptyIdentity);
        }
        let config = MemoConfig {
            backed: self.backing.is_some(),
            ..self.config
        };
        config.validate()?;
        let capacity = match config.storage {
            StorageKind::Table => config.capacity_policy()?,
            kind => {
                if let Some(capacity) = config.capacity {
                    tracing::debug!(
                        cache = %self.id,
                        ?kind,
                        capacity,
                        "capacity has no effect without table storage"
                    );
                }
                None
            },
        };

        let storage = match config.storage {
            StorageKind::Thunk => Storage::Thunk(ThunkStore::new()),
            StorageKind::SingleCell => {
                Storage::SingleCell(SingleCellStore::new(config.equality))
            },
            StorageKind::Table => match self.backing {
                Some(source) => Storage::Table(TableBinding::expecting(source, config.equality)),
                None => Storage::Table(TableBinding::owned(TableStore::try_with_test(
                    config.equality,
                )?)),
            },
        };

        let expiration = Expiration::new(config.time_to_live, self.clock);
        Ok(MemoCache::from_parts(
            self.id,
            storage,
            expiration,
            body,
            config.shared,
            capacity,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::args;
    use crate::expiry::ManualClock;

    fn one(_: &[Value]) -> Result<u8, Infallible> {
        Ok(1)
    }

    #[test]
    fn defaults_build_an_unbounded_table() {
        let cache = MemoBuilder::new("b::plain").build(one);
        assert_eq!(cache.kind(), StorageKind::Table);
        assert!(cache.capacity().is_none());
        assert!(cache.time_to_live().is_none());
        assert!(!cache.is_shared());
        assert_eq!(cache.id().namespace(), Some("b"));
        assert_eq!(cache.id().name(), "plain");
    }

    #[test]
    fn capacity_and_ratio_are_applied() {
        let cache = MemoBuilder::new("b::bounded")
            .capacity(10)
            .reduce_ratio(0.5)
            .build(one);
        let policy = cache.capacity().unwrap();
        assert_eq!(policy.capacity(), 10);
        assert_eq!(policy.number_to_remove(), 5);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let cases: Vec<(MemoBuilder<u8>, ConfigError)> = vec![
            (MemoBuilder::new("b::x").capacity(0), ConfigError::ZeroCapacity),
            (
                MemoBuilder::new("b::x").capacity(5).reduce_ratio(0.0),
                ConfigError::ReduceRatio(0.0),
            ),
            (
                MemoBuilder::new("b::x").reduce_ratio(1.5),
                ConfigError::ReduceRatio(1.5),
            ),
            (
                MemoBuilder::new("b::x").single_cell().shared(true),
                ConfigError::SharedWithoutTable,
            ),
            (
                MemoBuilder::new("b::x").equality(EqualityTest::custom(|a, b| a == b)),
                ConfigError::CustomEqualityOnTable,
            ),
            (
                MemoBuilder::new("b::x")
                    .single_cell()
                    .backing(StorageSource::direct(Arc::new(TableStore::new()))),
                ConfigError::BackingWithoutTable,
            ),
            (MemoBuilder::new(""), ConfigError::EmptyIdentity),
        ];

        for (builder, expected) in cases {
            assert_eq!(builder.try_build(one).unwrap_err(), expected);
        }
    }

    #[test]
    fn thunk_rejects_table_only_settings() {
        let err = MemoBuilder::<u8>::new("b::thunk")
            .shared(true)
            .try_build_thunk(|| Ok::<_, Infallible>(1))
            .unwrap_err();
        assert_eq!(err, ConfigError::SharedWithoutTable);
    }

    #[test]
    fn capacity_is_ignored_without_table_storage() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let cell = MemoBuilder::new("b::cell")
            .single_cell()
            .capacity(3)
            .try_build(move |args: &[Value]| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(args.len())
            })
            .unwrap();
        assert_eq!(cell.kind(), StorageKind::SingleCell);
        assert!(cell.capacity().is_none());
        cell.call(&args![1]).unwrap();
        cell.call(&args![1]).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(cell.entry_count(), 1);

        let thunk = MemoBuilder::new("b::thunk")
            .capacity(3)
            .try_build_thunk(|| Ok::<_, Infallible>(7u8))
            .unwrap();
        assert!(thunk.capacity().is_none());
        assert_eq!(*thunk.call0().unwrap(), 7);
        assert_eq!(thunk.entry_count(), 1);
    }

    #[test]
    fn custom_equality_on_single_cell() {
        let cache = MemoBuilder::new("b::ci")
            .single_cell()
            .equality(EqualityTest::custom(|a, b| {
                a.components().len() == b.components().len()
            }))
            .build(|args: &[Value]| Ok::<_, Infallible>(args.len()));

        cache.call(&args![1]).unwrap();
        assert!(cache.peek(&args![2]).is_some());
        assert!(cache.peek(&args![1, 2]).is_none());
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn build_panics_on_invalid_config() {
        let _ = MemoBuilder::new("b::bad").capacity(0).build(one);
    }

    #[test]
    fn clock_drives_expiration() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemoBuilder::new("b::ttl")
            .time_to_live(Duration::from_secs(1))
            .clock(clock.clone())
            .build(one);
        cache.call(&[]).unwrap();
        assert!(cache.peek(&[]).is_some());
        clock.advance(Duration::from_secs(1));
        assert!(cache.peek(&[]).is_none());
    }

    #[test]
    fn build_in_registers() {
        let registry = Registry::new();
        let cache = MemoBuilder::new("b::registered").build_in(&registry, one);
        cache.call(&args![1]).unwrap();
        assert_eq!(registry.cached_entry_count("b::registered"), 1);
    }

    #[test]
    fn config_round_trip() {
        let config = MemoConfig {
            capacity: Some(4),
            ..MemoConfig::default()
        };
        assert!(config.validate().is_ok());
        let cache = MemoBuilder::new("b::cfg").config(config).build(one);
        assert_eq!(cache.capacity().map(CapacityPolicy::capacity), Some(4));
    }
}

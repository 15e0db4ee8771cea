//! Externally owned table storage.
//!
//! A cache normally allocates its own table. It can instead be pointed at a
//! table owned elsewhere, which is how several caches share one table:
//!
//! | Source     | Resolves to                                        |
//! |------------|----------------------------------------------------|
//! | `Direct`   | the given table                                    |
//! | `Provider` | whatever the function returns when first called    |
//! | `Named`    | the table registered under a name in a directory   |
//!
//! Resolution happens on first use. A source that resolves to nothing leaves
//! the cache uncached for that call and is retried on the next one; the first
//! successful resolution is kept for the cache's lifetime.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::key::EqualityTest;
use crate::store::table::TableStore;

/// Function yielding a table on demand.
pub type TableProvider<V> = Arc<dyn Fn() -> Option<Arc<TableStore<V>>> + Send + Sync>;

/// Where a table-backed cache finds its table.
pub enum StorageSource<V> {
    Direct(Arc<TableStore<V>>),
    Provider(TableProvider<V>),
    Named {
        name: String,
        directory: TableDirectory,
    },
}

impl<V> StorageSource<V>
where
    V: Send + Sync + 'static,
{
    pub fn direct(table: Arc<TableStore<V>>) -> Self {
        StorageSource::Direct(table)
    }

    pub fn provider<F>(provider: F) -> Self
    where
        F: Fn() -> Option<Arc<TableStore<V>>> + Send + Sync + 'static,
    {
        StorageSource::Provider(Arc::new(provider))
    }

    pub fn named(name: impl Into<String>, directory: &TableDirectory) -> Self {
        StorageSource::Named {
            name: name.into(),
            directory: directory.clone(),
        }
    }

    /// Looks the table up. `None` means caching is unavailable right now.
    pub fn resolve(&self) -> Option<Arc<TableStore<V>>> {
        match self {
            StorageSource::Direct(table) => Some(Arc::clone(table)),
            StorageSource::Provider(provider) => provider(),
            StorageSource::Named { name, directory } => directory.get(name),
        }
    }
}

impl<V> fmt::Debug for StorageSource<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageSource::Direct(_) => f.write_str("Direct(..)"),
            StorageSource::Provider(_) => f.write_str("Provider(..)"),
            StorageSource::Named { name, .. } => write!(f, "Named({name:?})"),
        }
    }
}

/// Name → table lookup shared between a registry and the caches that refer
/// to tables by name.
///
/// Tables of different value types live side by side; a lookup with the
/// wrong value type resolves to nothing.
#[derive(Clone, Default)]
pub struct TableDirectory {
    tables: Arc<RwLock<FxHashMap<String, Arc<dyn Any + Send + Sync>>>>,
}

impl TableDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `table` under `name`, replacing any previous table.
    pub fn insert<V>(&self, name: impl Into<String>, table: Arc<TableStore<V>>)
    where
        V: Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(table = %name, "registered named table");
        self.tables.write().insert(name, table);
    }

    /// Looks up the table published under `name`.
    pub fn get<V>(&self, name: &str) -> Option<Arc<TableStore<V>>>
    where
        V: Send + Sync + 'static,
    {
        let entry = self.tables.read().get(name).cloned()?;
        match entry.downcast::<TableStore<V>>() {
            Ok(table) => Some(table),
            Err(_) => {
                tracing::warn!(table = %name, "named table holds a different value type");
                None
            },
        }
    }

    /// Withdraws the table published under `name`.
    pub fn remove(&self, name: &str) -> bool {
        self.tables.write().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for TableDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDirectory")
            .field("names", &self.names())
            .finish()
    }
}

/// A [`StorageSource`] plus the table it resolved to, once it has.
pub(crate) struct TableBinding<V> {
    source: StorageSource<V>,
    resolved: OnceLock<Arc<TableStore<V>>>,
    /// Equality the cache was configured with; the table's own test wins.
    expected: Option<EqualityTest>,
}

impl<V> TableBinding<V>
where
    V: Send + Sync + 'static,
{
    pub(crate) fn new(source: StorageSource<V>) -> Self {
        Self {
            source,
            resolved: OnceLock::new(),
            expected: None,
        }
    }

    /// Binding that warns if the resolved table keys under a different test
    /// than `expected`.
    pub(crate) fn expecting(source: StorageSource<V>, expected: EqualityTest) -> Self {
        Self {
            expected: Some(expected),
            ..Self::new(source)
        }
    }

    /// Binding to a freshly allocated table, resolved up front.
    pub(crate) fn owned(table: TableStore<V>) -> Self {
        let table = Arc::new(table);
        let resolved = OnceLock::new();
        let _ = resolved.set(Arc::clone(&table));
        Self {
            source: StorageSource::Direct(table),
            resolved,
            expected: None,
        }
    }

    pub(crate) fn table(&self) -> Option<Arc<TableStore<V>>> {
        if let Some(table) = self.resolved.get() {
            return Some(Arc::clone(table));
        }
        let table = self.source.resolve()?;
        if let Some(expected) = &self.expected {
            if !same_test(expected, table.test()) {
                tracing::warn!(
                    source = ?self.source,
                    configured = ?expected,
                    table = ?table.test(),
                    "equality setting ignored, keys follow the backing table's test"
                );
            }
        }
        Some(Arc::clone(self.resolved.get_or_init(|| table)))
    }

    pub(crate) fn source(&self) -> &StorageSource<V> {
        &self.source
    }
}

fn same_test(a: &EqualityTest, b: &EqualityTest) -> bool {
    matches!(
        (a, b),
        (EqualityTest::Structural, EqualityTest::Structural)
            | (EqualityTest::Relaxed, EqualityTest::Relaxed)
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn direct_source_resolves_immediately() {
        let table = Arc::new(TableStore::<u32>::new());
        let source = StorageSource::direct(table.clone());
        let resolved = source.resolve().unwrap();
        assert!(Arc::ptr_eq(&resolved, &table));
    }

    #[test]
    fn named_source_follows_directory() {
        let directory = TableDirectory::new();
        let source = StorageSource::<u32>::named("shared", &directory);
        assert!(source.resolve().is_none());

        let table = Arc::new(TableStore::<u32>::new());
        directory.insert("shared", table.clone());
        assert!(Arc::ptr_eq(&source.resolve().unwrap(), &table));
        assert_eq!(directory.names(), vec!["shared".to_string()]);
    }

    #[test]
    fn wrong_value_type_resolves_to_nothing() {
        let directory = TableDirectory::new();
        directory.insert("t", Arc::new(TableStore::<String>::new()));
        assert!(directory.get::<u64>("t").is_none());
        assert!(directory.get::<String>("t").is_some());
    }

    #[test]
    fn binding_retries_until_resolved_then_sticks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slot: Arc<RwLock<Option<Arc<TableStore<u8>>>>> = Arc::new(RwLock::new(None));

        let binding = {
            let calls = calls.clone();
            let slot = slot.clone();
            TableBinding::new(StorageSource::provider(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                slot.read().clone()
            }))
        };

        assert!(binding.table().is_none());
        assert!(binding.table().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let table = Arc::new(TableStore::new());
        *slot.write() = Some(table.clone());
        assert!(Arc::ptr_eq(&binding.table().unwrap(), &table));

        *slot.write() = None;
        assert!(Arc::ptr_eq(&binding.table().unwrap(), &table));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn mismatched_equality_still_binds_to_the_table() {
        let table = Arc::new(TableStore::<u8>::with_test(EqualityTest::Relaxed));
        let binding =
            TableBinding::expecting(StorageSource::direct(table.clone()), EqualityTest::Structural);
        let resolved = binding.table().unwrap();
        assert!(Arc::ptr_eq(&resolved, &table));
        assert!(matches!(resolved.test(), EqualityTest::Relaxed));

        assert!(same_test(&EqualityTest::Relaxed, &EqualityTest::Relaxed));
        assert!(!same_test(&EqualityTest::Structural, &EqualityTest::Relaxed));
        assert!(!same_test(&EqualityTest::custom(|_, _| true), &EqualityTest::custom(|_, _| true)));
    }

    #[test]
    fn owned_binding_is_resolved_up_front() {
        let binding = TableBinding::owned(TableStore::<u8>::new());
        assert!(binding.table().is_some());
        assert!(matches!(binding.source(), StorageSource::Direct(_)));
    }
}

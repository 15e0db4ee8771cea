//! Storage strategies and their closed set of shapes.

pub mod single_cell;
pub mod source;
pub mod table;
pub mod thunk;
pub mod traits;

use std::sync::Arc;

pub use single_cell::SingleCellStore;
pub use source::{StorageSource, TableDirectory, TableProvider};
pub use table::TableStore;
pub use thunk::ThunkStore;
pub use traits::{Stamped, StorageStrategy, StoreMetrics};

use crate::key::EqualityTest;
use crate::store::source::TableBinding;

/// Storage shape of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Zero-argument body, one stored result.
    Thunk,
    /// One stored `(key, value)` pair.
    SingleCell,
    /// Many `key → value` entries.
    Table,
}

/// The storage a cache owns or refers to.
pub(crate) enum Storage<V> {
    Thunk(ThunkStore<V>),
    SingleCell(SingleCellStore<V>),
    Table(TableBinding<V>),
}

/// Storage ready for one operation. Tables are resolved at this point.
pub(crate) enum Bound<'a, V> {
    Local(&'a dyn StorageStrategy<V>, &'a EqualityTest),
    Table(Arc<TableStore<V>>),
}

static THUNK_TEST: EqualityTest = EqualityTest::Structural;

impl<V> Storage<V>
where
    V: Send + Sync + 'static,
{
    pub(crate) fn kind(&self) -> StorageKind {
        match self {
            Storage::Thunk(_) => StorageKind::Thunk,
            Storage::SingleCell(_) => StorageKind::SingleCell,
            Storage::Table(_) => StorageKind::Table,
        }
    }

    /// Resolves the storage. `None` only for a table source that yields
    /// nothing.
    pub(crate) fn bind(&self) -> Option<Bound<'_, V>> {
        match self {
            Storage::Thunk(store) => Some(Bound::Local(store, &THUNK_TEST)),
            Storage::SingleCell(store) => Some(Bound::Local(store, store.test())),
            Storage::Table(binding) => binding.table().map(Bound::Table),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Storage::Thunk(store) => format!("{store:?}"),
            Storage::SingleCell(store) => format!("{store:?}"),
            Storage::Table(binding) => format!("Table({:?})", binding.source()),
        }
    }
}

impl<V> Bound<'_, V>
where
    V: Send + Sync + 'static,
{
    pub(crate) fn strategy(&self) -> &dyn StorageStrategy<V> {
        match self {
            Bound::Local(store, _) => *store,
            Bound::Table(table) => table.as_ref(),
        }
    }

    /// Equality test keys for this storage are derived with.
    pub(crate) fn test(&self) -> &EqualityTest {
        match self {
            Bound::Local(_, test) => test,
            Bound::Table(table) => table.test(),
        }
    }
}

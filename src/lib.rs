//! memokit: memoizing function caches with TTL expiration, capacity eviction
//! and partial-key invalidation.
//!
//! A [`MemoCache`](memo::MemoCache) wraps a computation and remembers its
//! results keyed by the (normalized) arguments. Storage comes in three shapes
//! (thunk, single cell, table), tables can be bounded and shared between
//! caches, and a [`Registry`](registry::Registry) administers caches by name.
//!
//! ```text
//!   MemoBuilder ──build──▶ MemoCache ──▶ Storage ──▶ ThunkStore
//!                              │                   ├▶ SingleCellStore
//!                              │                   └▶ TableStore ◀── StorageSource
//!                              │                         └─ LazyMinHeap (age index)
//!                              └── Expiration ──▶ Clock
//!
//!   Registry ──▶ Arc<dyn CacheAdmin>   (clear / purge / count by name)
//! ```

pub mod builder;
pub mod ds;
pub mod error;
pub mod expiry;
pub mod key;
pub mod memo;
pub mod metrics;
pub mod pattern;
pub mod policy;
pub mod prelude;
pub mod registry;
pub mod store;
pub mod traits;
pub mod value;

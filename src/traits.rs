//! Type-erased administration of caches.
//!
//! [`MemoCache<V, E>`](crate::memo::MemoCache) is generic over its result and
//! error types. A [`Registry`](crate::registry::Registry) holds caches of many
//! different types at once, so it talks to them through [`CacheAdmin`], which
//! exposes only the operations that do not mention `V` or `E`.
//!
//! ```text
//!   Registry ──▶ Arc<dyn CacheAdmin> ──▶ MemoCache<u64, Infallible>
//!                Arc<dyn CacheAdmin> ──▶ MemoCache<String, io::Error>
//!                Arc<dyn CacheAdmin> ──▶ MemoCache<(i32, i32), MyError>
//! ```
//!
//! | Method           | No-op when                                      |
//! |------------------|-------------------------------------------------|
//! | `clear`          | backing table unresolved                        |
//! | `clear_args`     | backing table unresolved, key not stored        |
//! | `clear_matching` | thunk / single-cell storage, table unresolved   |
//! | `purge`          | no TTL, backing table unresolved                |

use std::time::Duration;

use crate::key::CacheId;
use crate::metrics::MemoMetricsSnapshot;
use crate::pattern::KeyPattern;
use crate::store::StorageKind;
use crate::value::Value;

/// Administrative surface shared by every cache.
pub trait CacheAdmin: Send + Sync {
    /// Identity the cache is registered under.
    fn id(&self) -> &CacheId;

    /// Storage shape of the cache.
    fn kind(&self) -> StorageKind;

    /// Whether keys carry the identity prefix.
    fn is_shared(&self) -> bool;

    fn time_to_live(&self) -> Option<Duration>;

    /// Removes every entry of this cache. For shared caches only entries
    /// carrying this cache's identity are removed.
    fn clear(&self) -> usize;

    /// Removes the entry for exactly these arguments.
    fn clear_args(&self, args: &[Value]) -> bool;

    /// Removes the entries whose arguments match `pattern`.
    fn clear_matching(&self, pattern: &KeyPattern) -> usize;

    /// Removes the expired entries, judged by the current TTL.
    fn purge(&self) -> usize;

    /// Number of stored entries, expired ones included.
    fn entry_count(&self) -> usize;

    fn metrics(&self) -> MemoMetricsSnapshot;
}

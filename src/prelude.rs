pub use crate::args;
pub use crate::builder::{MemoBuilder, MemoConfig};
pub use crate::error::ConfigError;
pub use crate::expiry::{Clock, ManualClock, SystemClock};
pub use crate::key::{CacheId, CacheKey, EqualityTest};
pub use crate::memo::MemoCache;
pub use crate::metrics::MemoMetricsSnapshot;
pub use crate::pattern::{KeyPattern, PatternPart, WILDCARD};
pub use crate::policy::CapacityPolicy;
pub use crate::registry::Registry;
pub use crate::store::{StorageKind, StorageSource, TableDirectory, TableStore};
pub use crate::traits::CacheAdmin;
pub use crate::value::Value;

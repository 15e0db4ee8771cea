//! Error types for memokit.
//!
//! Only construction can fail: once a [`MemoCache`](crate::memo::MemoCache)
//! exists, administrative problems (unknown names, unresolved storage) degrade
//! to no-ops or uncached calls, and a body's own error type is handed back to
//! the caller unchanged.
//!
//! ## Example Usage
//!
//! ```
//! use memokit::builder::MemoBuilder;
//! use memokit::error::ConfigError;
//!
//! let err = MemoBuilder::new("demo::f")
//!     .capacity(0)
//!     .try_build(|_| Ok::<_, ()>(1))
//!     .unwrap_err();
//! assert_eq!(err, ConfigError::ZeroCapacity);
//! assert!(err.to_string().contains("capacity"));
//! ```

use thiserror::Error;

/// Invalid cache configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,

    #[error("reduce_ratio must be finite and in (0.0, 1.0], got {0}")]
    ReduceRatio(f64),

    #[error("shared caches require table storage")]
    SharedWithoutTable,

    #[error("custom equality tests are only supported by single-cell storage")]
    CustomEqualityOnTable,

    #[error("external backing storage requires table storage")]
    BackingWithoutTable,

    #[error("cache identity must not be empty")]
    EmptyIdentity,
}

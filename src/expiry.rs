//! Time-to-live expiration.
//!
//! An entry stored at `t` under a TTL of `d` is expired from `t + d` onward
//! (the boundary instant itself counts as expired). Without a TTL nothing
//! expires.
//!
//! Time is read through the [`Clock`] trait so tests can drive expiry with a
//! [`ManualClock`] instead of sleeping.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use memokit::expiry::{Clock, Expiration, ManualClock};
//!
//! let clock = Arc::new(ManualClock::new());
//! let expiration = Expiration::new(Some(Duration::from_secs(10)), clock.clone());
//!
//! let stored_at = clock.now();
//! clock.advance(Duration::from_secs(9));
//! assert!(!expiration.is_expired(Some(stored_at)));
//! clock.advance(Duration::from_secs(1));
//! assert!(expiration.is_expired(Some(stored_at)));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Monotonically non-decreasing time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::AcqRel);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_nanos(self.offset_nanos.load(Ordering::Acquire))
    }
}

/// Expiration policy of one cache: its current TTL and clock.
pub struct Expiration {
    ttl: RwLock<Option<Duration>>,
    clock: Arc<dyn Clock>,
}

impl Expiration {
    pub fn new(ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: RwLock::new(ttl),
            clock,
        }
    }

    /// Reads the clock.
    #[inline]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn time_to_live(&self) -> Option<Duration> {
        *self.ttl.read()
    }

    /// Replaces the TTL. Existing entries are judged by the new value from
    /// now on.
    pub fn set_time_to_live(&self, ttl: Option<Duration>) {
        *self.ttl.write() = ttl;
    }

    /// Decides whether an entry stored at `stored_at` is stale.
    ///
    /// A missing timestamp counts as expired unless the cache has no TTL.
    pub fn is_expired(&self, stored_at: Option<Instant>) -> bool {
        let Some(ttl) = self.time_to_live() else {
            return false;
        };
        match stored_at {
            None => true,
            Some(stored_at) => self.is_expired_at(stored_at, ttl, self.now()),
        }
    }

    /// Pure form of the expiry check, for scans that read the clock once.
    #[inline]
    pub fn is_expired_at(&self, stored_at: Instant, ttl: Duration, now: Instant) -> bool {
        match stored_at.checked_add(ttl) {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

impl fmt::Debug for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expiration")
            .field("ttl", &self.time_to_live())
            .finish_non_exhaustive()
    }
}

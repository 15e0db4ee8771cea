//! Capacity-triggered eviction for table storage.
//!
//! When a table already holds `capacity` entries, the next insert first
//! removes the oldest `ceil(capacity * reduce_ratio)` entries (smallest
//! `stored_at`). Removing a fraction at once amortizes the eviction cost over
//! many inserts.
//!
//! ```text
//!   capacity = 10, reduce_ratio = 0.2
//!
//!   count = 10 ──put(k11)──▶ evict 2 oldest ──▶ count = 8 ──▶ insert ──▶ 9
//! ```
//!
//! ## Example Usage
//!
//! ```
//! use memokit::policy::capacity::CapacityPolicy;
//!
//! let policy = CapacityPolicy::try_new(10, 0.2).unwrap();
//! assert!(!policy.must_evict(9));
//! assert!(policy.must_evict(10));
//! assert_eq!(policy.number_to_remove(), 2);
//! ```

use crate::error::ConfigError;

/// Default fraction of the capacity evicted at once.
pub const DEFAULT_REDUCE_RATIO: f64 = 0.2;

/// Entry-count bound and eviction batch size of a table-backed cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityPolicy {
    capacity: usize,
    reduce_ratio: f64,
}

impl CapacityPolicy {
    /// Creates a policy with the default reduce ratio.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. See [`try_new`](Self::try_new).
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity, DEFAULT_REDUCE_RATIO) {
            Ok(policy) => policy,
            Err(e) => panic!("{}", e),
        }
    }

    /// Creates a policy, rejecting a zero capacity and ratios outside
    /// `(0.0, 1.0]`.
    pub fn try_new(capacity: usize, reduce_ratio: f64) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !reduce_ratio.is_finite() || reduce_ratio <= 0.0 || reduce_ratio > 1.0 {
            return Err(ConfigError::ReduceRatio(reduce_ratio));
        }
        Ok(Self {
            capacity,
            reduce_ratio,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reduce_ratio(&self) -> f64 {
        self.reduce_ratio
    }

    /// Returns `true` if an insert into a table of `count` entries must
    /// evict first.
    #[inline]
    pub fn must_evict(&self, count: usize) -> bool {
        count >= self.capacity
    }

    /// Size of one eviction batch: `ceil(capacity * reduce_ratio)`.
    pub fn number_to_remove(&self) -> usize {
        let n = (self.capacity as f64 * self.reduce_ratio).ceil() as usize;
        n.clamp(1, self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_rounds_up() {
        assert_eq!(CapacityPolicy::try_new(10, 0.2).unwrap().number_to_remove(), 2);
        assert_eq!(CapacityPolicy::try_new(10, 0.25).unwrap().number_to_remove(), 3);
        assert_eq!(CapacityPolicy::try_new(3, 0.1).unwrap().number_to_remove(), 1);
        assert_eq!(CapacityPolicy::try_new(7, 1.0).unwrap().number_to_remove(), 7);
    }

    #[test]
    fn default_ratio_is_one_fifth() {
        let policy = CapacityPolicy::new(100);
        assert_eq!(policy.reduce_ratio(), DEFAULT_REDUCE_RATIO);
        assert_eq!(policy.number_to_remove(), 20);
    }

    #[test]
    fn eviction_triggers_at_capacity() {
        let policy = CapacityPolicy::new(4);
        assert!(!policy.must_evict(3));
        assert!(policy.must_evict(4));
        assert!(policy.must_evict(5));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert_eq!(CapacityPolicy::try_new(0, 0.2), Err(ConfigError::ZeroCapacity));
        assert!(matches!(
            CapacityPolicy::try_new(10, 0.0),
            Err(ConfigError::ReduceRatio(_))
        ));
        assert!(matches!(
            CapacityPolicy::try_new(10, 1.5),
            Err(ConfigError::ReduceRatio(_))
        ));
        assert!(matches!(
            CapacityPolicy::try_new(10, f64::NAN),
            Err(ConfigError::ReduceRatio(_))
        ));
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn new_panics_on_zero_capacity() {
        let _ = CapacityPolicy::new(0);
    }
}

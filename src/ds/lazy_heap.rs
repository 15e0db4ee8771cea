//! Lazy min-heap with stale entry skipping.
//!
//! Tables use it as their age index: every stored key is scored with its
//! `stored_at`, and capacity eviction pops the smallest scores first.
//!
//! Re-stamping a key pushes a fresh heap entry instead of fixing the old one
//! in place; the authoritative score lives in a side map and
//! [`pop_best`](LazyMinHeap::pop_best) discards heap entries that no longer
//! agree with it.
//!
//! ```text
//!   scores: { k1: t3, k2: t1 }          heap: (t1,k2) (t2,k1)* (t3,k1)
//!                                                      * stale, skipped
//!   pop_best() → (k2, t1)
//!   pop_best() → skips (t2,k1), returns (k1, t3)
//! ```
//!
//! Equal scores pop in insertion order (sequence numbers break ties), so
//! eviction among entries stored at the same instant is deterministic.
//!
//! ## Operations
//!
//! | Operation       | Complexity         |
//! |-----------------|--------------------|
//! | `update`        | O(log n)           |
//! | `remove`        | O(1)               |
//! | `pop_best`      | amortized O(log n) |
//! | `rebuild`       | O(n log n)         |
//!
//! `LazyMinHeap` is not thread-safe; the table keeps it under its own lock.
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone)]
struct HeapEntry<K, S> {
    score: S,
    seq: u64,
    key: K,
}

impl<K, S: Ord> PartialEq for HeapEntry<K, S> {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.seq == other.seq
    }
}

impl<K, S: Ord> Eq for HeapEntry<K, S> {}

impl<K, S: Ord> PartialOrd for HeapEntry<K, S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K, S: Ord> Ord for HeapEntry<K, S> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-heap with cheap re-scoring via lazy deletion.
///
/// # Example
///
/// ```
/// use memokit::ds::LazyMinHeap;
///
/// let mut ages: LazyMinHeap<&str, u32> = LazyMinHeap::new();
/// ages.update("a", 5);
/// ages.update("b", 2);
/// ages.update("a", 1);
///
/// assert_eq!(ages.pop_best(), Some(("a", 1)));
/// assert_eq!(ages.pop_best(), Some(("b", 2)));
/// assert_eq!(ages.pop_best(), None);
/// ```
#[derive(Debug)]
pub struct LazyMinHeap<K, S> {
    scores: FxHashMap<K, S>,
    heap: BinaryHeap<Reverse<HeapEntry<K, S>>>,
    seq: u64,
}

impl<K, S> LazyMinHeap<K, S>
where
    K: Eq + Hash + Clone,
    S: Ord + Clone,
{
    pub fn new() -> Self {
        Self {
            scores: FxHashMap::default(),
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Underlying heap length, stale entries included.
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    /// Sets `key`'s score, returning the previous one.
    pub fn update(&mut self, key: K, score: S) -> Option<S> {
        let previous = self.scores.insert(key.clone(), score.clone());
        self.push_entry(key, score);
        previous
    }

    /// Forgets `key`. Its heap entries become stale.
    pub fn remove(&mut self, key: &K) -> Option<S> {
        self.scores.remove(key)
    }

    /// Pops the live key with the smallest score.
    pub fn pop_best(&mut self) -> Option<(K, S)> {
        loop {
            let Reverse(entry) = self.heap.pop()?;
            match self.scores.get(&entry.key) {
                Some(score) if *score == entry.score => {
                    self.scores.remove(&entry.key);
                    return Some((entry.key, entry.score));
                },
                _ => continue,
            }
        }
    }

    /// Drops every key and heap entry.
    pub fn clear(&mut self) {
        self.scores.clear();
        self.heap.clear();
    }

    /// Rebuilds the heap from the live scores, dropping stale entries.
    ///
    /// Live keys are re-pushed in ascending `(score, seq)` order of their
    /// current heap entries, so tie order survives the rebuild.
    pub fn rebuild(&mut self) {
        let mut live: Vec<HeapEntry<K, S>> = std::mem::take(&mut self.heap)
            .into_iter()
            .map(|Reverse(entry)| entry)
            .filter(|entry| self.scores.get(&entry.key) == Some(&entry.score))
            .collect();
        live.sort();
        let mut seen = FxHashSet::default();
        live.retain(|entry| seen.insert(entry.key.clone()));
        self.heap = live.into_iter().map(Reverse).collect();
    }

    /// Rebuilds when the heap holds more than `factor` entries per live key.
    pub fn maybe_rebuild(&mut self, factor: usize) {
        let factor = factor.max(1);
        if self.heap.len() > self.scores.len().saturating_mul(factor) {
            self.rebuild();
        }
    }

    fn push_entry(&mut self, key: K, score: S) {
        let entry = HeapEntry {
            score,
            seq: self.seq,
            key,
        };
        self.seq = self.seq.wrapping_add(1);
        self.heap.push(Reverse(entry));
    }
}

impl<K, S> Default for LazyMinHeap<K, S>
where
    K: Eq + Hash + Clone,
    S: Ord + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_heap_skips_stale_entries() {
        let mut heap = LazyMinHeap::new();
        heap.update("a", 5);
        heap.update("a", 2);
        heap.update("b", 3);

        assert_eq!(heap.pop_best(), Some(("a", 2)));
        assert_eq!(heap.pop_best(), Some(("b", 3)));
        assert_eq!(heap.pop_best(), None);
    }

    #[test]
    fn lazy_heap_restamp_moves_key_back() {
        let mut heap = LazyMinHeap::new();
        heap.update("a", 1);
        heap.update("b", 2);
        heap.update("a", 3);
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.pop_best(), Some(("b", 2)));
        assert_eq!(heap.pop_best(), Some(("a", 3)));
    }

    #[test]
    fn lazy_heap_tie_breaks_by_insertion() {
        let mut heap = LazyMinHeap::new();
        heap.update("c", 1);
        heap.update("a", 1);
        heap.update("b", 1);
        assert_eq!(heap.pop_best(), Some(("c", 1)));
        assert_eq!(heap.pop_best(), Some(("a", 1)));
        assert_eq!(heap.pop_best(), Some(("b", 1)));
    }

    #[test]
    fn lazy_heap_removed_keys_are_never_popped() {
        let mut heap = LazyMinHeap::new();
        heap.update("a", 2);
        heap.update("b", 1);
        assert_eq!(heap.remove(&"b"), Some(1));
        assert_eq!(heap.pop_best(), Some(("a", 2)));
        assert_eq!(heap.pop_best(), None);
    }

    #[test]
    fn lazy_heap_rebuild_keeps_tie_order() {
        let mut heap = LazyMinHeap::new();
        heap.update("x", 1);
        heap.update("y", 1);
        heap.update("z", 9);
        heap.update("z", 1);
        heap.remove(&"y");
        assert!(heap.heap_len() > heap.len());

        heap.maybe_rebuild(1);
        assert_eq!(heap.heap_len(), heap.len());
        assert_eq!(heap.pop_best(), Some(("x", 1)));
        assert_eq!(heap.pop_best(), Some(("z", 1)));
    }

    #[test]
    fn lazy_heap_clear_empties_everything() {
        let mut heap = LazyMinHeap::new();
        heap.update(1, 1);
        heap.update(2, 2);
        heap.clear();
        assert!(heap.is_empty());
        assert_eq!(heap.heap_len(), 0);
        assert_eq!(heap.pop_best(), None);
    }
}

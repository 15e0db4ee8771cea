/// Point-in-time view of one cache's counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoMetricsSnapshot {
    pub calls: u64,
    pub hits: u64,
    pub misses: u64,
    /// Misses caused by an expired entry rather than a missing one.
    pub expired: u64,
    pub computes: u64,
    pub body_errors: u64,
    /// Calls that ran uncached because the backing table did not resolve.
    pub passthroughs: u64,
    pub evicted_entries: u64,
    pub purged_entries: u64,
    pub cleared_entries: u64,

    // gauge captured at snapshot time
    pub entry_count: usize,
}

impl MemoMetricsSnapshot {
    /// Fraction of cached lookups that hit, or `0.0` before any lookup.
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

//! Cache statistics for monitoring

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by the coordinator
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Reads answered from the cache
    pub hits: AtomicU64,
    /// Reads that had to go to the backing store
    pub misses: AtomicU64,
    /// Entries evicted on capacity overflow
    pub evictions: AtomicU64,
    /// Dirty entries successfully written back to the store
    pub writebacks: AtomicU64,
    /// Dirty entries whose write-back failed
    pub flush_failures: AtomicU64,
}

impl CacheStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_writeback(&self) {
        self.writebacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.writebacks.store(0, Ordering::Relaxed);
        self.flush_failures.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of the cache, for metrics and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub writebacks: u64,
    pub flush_failures: u64,
    /// Entries currently cached
    pub entries: usize,
    /// Entries currently dirty
    pub dirty: usize,
    pub capacity: usize,
    pub hit_ratio: f64,
}

impl StatsSnapshot {
    pub(crate) fn capture(stats: &CacheStats, entries: usize, dirty: usize, capacity: usize) -> Self {
        Self {
            hits: stats.hits.load(Ordering::Relaxed),
            misses: stats.misses.load(Ordering::Relaxed),
            evictions: stats.evictions.load(Ordering::Relaxed),
            writebacks: stats.writebacks.load(Ordering::Relaxed),
            flush_failures: stats.flush_failures.load(Ordering::Relaxed),
            entries,
            dirty,
            capacity,
            hit_ratio: stats.hit_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ratio() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_ratio(), 0.0);

        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert!((stats.hit_ratio() - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_reset() {
        let stats = CacheStats::default();
        stats.record_eviction();
        stats.record_writeback();
        stats.record_flush_failure();

        let snap = StatsSnapshot::capture(&stats, 3, 1, 8);
        assert_eq!(snap.evictions, 1);
        assert_eq!(snap.writebacks, 1);
        assert_eq!(snap.flush_failures, 1);
        assert_eq!(snap.entries, 3);

        stats.reset();
        let snap = StatsSnapshot::capture(&stats, 0, 0, 8);
        assert_eq!(snap.evictions, 0);
        assert_eq!(snap.flush_failures, 0);
    }
}

use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time copy of the cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Back references answered from a cache block.
    pub hits: u64,
    /// Back references that had to read the store.
    pub misses: u64,
    /// Pointers left to the scan running the other way.
    pub direction_skips: u64,
    /// Sides or relationships whose node lies outside the owned window.
    pub window_skips: u64,
    /// Cache blocks replaced while still populated.
    pub overwrites: u64,
    /// Synthetic comparisons re-run against the store.
    pub stale_retries: u64,
}

impl AddAssign for CacheStats {
    fn add_assign(&mut self, other: CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.direction_skips += other.direction_skips;
        self.window_skips += other.window_skips;
        self.overwrites += other.overwrites;
        self.stale_retries += other.stale_retries;
    }
}

/// Thread-safe cache counters shared by all workers of a check.
///
/// Workers count locally and merge with [`CacheCounters::add`]; the values
/// are diagnostics only and never influence what gets reported.
#[derive(Default, Debug)]
pub struct CacheCounters {
    /// Cache hits.
    pub hits: AtomicU64,
    /// Cache misses.
    pub misses: AtomicU64,
    /// Direction skips.
    pub direction_skips: AtomicU64,
    /// Window skips.
    pub window_skips: AtomicU64,
    /// Overwritten blocks.
    pub overwrites: AtomicU64,
    /// Stale synthetic records re-checked against the store.
    pub stale_retries: AtomicU64,
}

impl CacheCounters {
    /// Merges a worker's local counts.
    pub fn add(&self, stats: CacheStats) {
        self.hits.fetch_add(stats.hits, Ordering::Relaxed);
        self.misses.fetch_add(stats.misses, Ordering::Relaxed);
        self.direction_skips
            .fetch_add(stats.direction_skips, Ordering::Relaxed);
        self.window_skips
            .fetch_add(stats.window_skips, Ordering::Relaxed);
        self.overwrites.fetch_add(stats.overwrites, Ordering::Relaxed);
        self.stale_retries
            .fetch_add(stats.stale_retries, Ordering::Relaxed);
    }

    /// Reads every counter.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            direction_skips: self.direction_skips.load(Ordering::Relaxed),
            window_skips: self.window_skips.load(Ordering::Relaxed),
            overwrites: self.overwrites.load(Ordering::Relaxed),
            stale_retries: self.stale_retries.load(Ordering::Relaxed),
        }
    }
}

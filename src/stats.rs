//! Pool operation counters.
//!
//! All counters are relaxed atomics on the side of the hot paths; a
//! snapshot taken while other threads are operating is a consistent-enough
//! approximation, not a linearizable view.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Internal counter block owned by every pool.
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    allocations: AtomicU64,
    releases: AtomicU64,
    exhausted: AtomicU64,
    failed_constructions: AtomicU64,
    live: AtomicUsize,
    peak_live: AtomicUsize,
}

impl StatCounters {
    pub(crate) fn record_allocation(&self) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        let live = self.live.fetch_add(1, Ordering::Relaxed) + 1;

        let mut peak = self.peak_live.load(Ordering::Relaxed);
        while live > peak {
            match self.peak_live.compare_exchange_weak(
                peak,
                live,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
    }

    pub(crate) fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_construction(&self) {
        self.failed_constructions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> FreeListStats {
        FreeListStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            failed_constructions: self.failed_constructions.load(Ordering::Relaxed),
            live: self.live.load(Ordering::Relaxed),
            peak_live: self.peak_live.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FreeListStats {
    /// Successful allocations over the pool's lifetime.
    pub allocations: u64,
    /// Slots returned to the free list.
    pub releases: u64,
    /// Allocation attempts that found the pool empty.
    pub exhausted: u64,
    /// Constructions that failed and handed their slot back.
    pub failed_constructions: u64,
    /// Currently live payloads.
    pub live: usize,
    /// Highest simultaneous live count observed.
    pub peak_live: usize,
}

impl FreeListStats {
    /// Fraction of allocation attempts that produced a handle.
    pub fn success_rate(&self) -> f64 {
        let attempts = self.allocations + self.exhausted + self.failed_constructions;
        if attempts == 0 {
            1.0
        } else {
            self.allocations as f64 / attempts as f64
        }
    }
}

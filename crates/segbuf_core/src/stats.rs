//! Pool statistics.
//!
//! Counters are updated with relaxed atomics and are advisory: they never
//! take part in pool decisions.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how a [`SegmentPool`](crate::SegmentPool) served
/// takes and recycles.
#[derive(Debug, Default)]
pub struct PoolStats {
    // Take counters
    takes: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    contended_takes: AtomicU64,

    // Recycle counters
    recycles: AtomicU64,
    rejected_shared: AtomicU64,
    rejected_full: AtomicU64,
    contended_recycles: AtomicU64,
}

impl PoolStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_take(&self) {
        self.takes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_contended_take(&self) {
        self.contended_takes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recycle(&self) {
        self.recycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_shared(&self) {
        self.rejected_shared.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_full(&self) {
        self.rejected_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_contended_recycle(&self) {
        self.contended_recycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            takes: self.takes.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            contended_takes: self.contended_takes.load(Ordering::Relaxed),
            recycles: self.recycles.load(Ordering::Relaxed),
            rejected_shared: self.rejected_shared.load(Ordering::Relaxed),
            rejected_full: self.rejected_full.load(Ordering::Relaxed),
            contended_recycles: self.contended_recycles.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStatsSnapshot {
    /// Calls to `take`.
    pub takes: u64,
    /// Takes served with a pooled segment.
    pub hits: u64,
    /// Takes that found their bucket empty.
    pub misses: u64,
    /// Takes that lost a race and allocated instead.
    pub contended_takes: u64,
    /// Segments accepted into a bucket.
    pub recycles: u64,
    /// Shared segments turned away.
    pub rejected_shared: u64,
    /// Segments dropped because their bucket was full.
    pub rejected_full: u64,
    /// Recycles that lost a race and dropped the segment.
    pub contended_recycles: u64,
}

impl PoolStatsSnapshot {
    /// Fraction of takes served from the pool (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        if self.takes == 0 {
            0.0
        } else {
            self.hits as f64 / self.takes as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = PoolStats::new();
        assert_eq!(stats.snapshot(), PoolStatsSnapshot::default());
    }

    #[test]
    fn hit_rate() {
        let snapshot = PoolStatsSnapshot {
            takes: 4,
            hits: 3,
            ..PoolStatsSnapshot::default()
        };
        assert!((snapshot.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(PoolStatsSnapshot::default().hit_rate(), 0.0);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(PoolStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_take();
                        stats.record_recycle();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.takes, 800);
        assert_eq!(snapshot.recycles, 800);
    }
}

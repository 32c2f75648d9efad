//! Segment pool configuration.

use crate::pool::MAX_SIZE;
use std::num::NonZeroUsize;
use std::thread;

/// Configuration for building a [`SegmentPool`](crate::SegmentPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Hardware parallelism the bucket count is derived from.
    pub parallelism: usize,

    /// Pooled bytes above which a bucket stops accepting segments.
    pub max_bucket_bytes: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            parallelism: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            max_bucket_bytes: MAX_SIZE, // 64 KiB
        }
    }
}

impl PoolConfig {
    /// Creates a configuration from the queried hardware parallelism.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the parallelism used to size the bucket array.
    ///
    /// Zero is treated as one.
    #[must_use]
    pub const fn parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = if parallelism == 0 { 1 } else { parallelism };
        self
    }

    /// Sets the per-bucket byte cap.
    #[must_use]
    pub const fn max_bucket_bytes(mut self, bytes: usize) -> Self {
        self.max_bucket_bytes = bytes;
        self
    }

    /// Number of buckets: the parallelism rounded up to a power of two.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.parallelism.max(1).next_power_of_two()
    }
}

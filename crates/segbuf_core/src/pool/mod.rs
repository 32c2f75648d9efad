//! A sharded, non-blocking pool of recyclable segments.
//!
//! Each bucket holds the head of a singly-linked stack of free segments in a
//! single atomic slot. Both operations touch one bucket with a constant
//! number of atomic steps and never wait:
//!
//! - `take` swaps the head for a lock marker, pops one segment and stores
//!   the rest back. Finding the marker already there means another
//!   operation is mid-flight, and the take allocates a fresh segment.
//! - `recycle` reads the head and pushes with one compare-and-swap. If the
//!   bucket is locked, full, or changed under it, the segment is dropped.
//!
//! Free nodes record the pooled bytes of the node and everything below it,
//! so the head alone tells how full a bucket is.

mod shard;

pub use shard::{FixedSelector, ShardSelector, ThreadIdSelector};

use crate::config::PoolConfig;
use crate::error::{SegmentError, SegmentResult};
use crate::segment::{Segment, SegmentData, SIZE};
use crate::stats::PoolStats;
use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// Default cap on pooled bytes per bucket.
pub const MAX_SIZE: usize = 64 * 1024;

static GLOBAL_POOL: OnceLock<SegmentPool> = OnceLock::new();

/// Contents of a bucket slot.
enum FreeSlot {
    /// A take is popping from this bucket.
    Locked,
    /// Top of the bucket's free stack.
    Free(FreeSegment),
}

/// A pooled array and the rest of its bucket's stack.
struct FreeSegment {
    data: SegmentData,
    next: Option<Arc<FreeSlot>>,
    /// Pooled bytes in this node and every node below it.
    cumulative_bytes: usize,
}

type Bucket = ArcSwapOption<FreeSlot>;

/// A process-wide cache of segments, sharded to spread contention.
pub struct SegmentPool {
    buckets: Box<[Bucket]>,
    locked: Arc<FreeSlot>,
    config: PoolConfig,
    selector: Box<dyn ShardSelector>,
    stats: PoolStats,
}

impl SegmentPool {
    /// Creates a pool that shards by the calling thread's id.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self::with_selector(config, ThreadIdSelector)
    }

    /// Creates a pool that shards with `selector`.
    #[must_use]
    pub fn with_selector(config: PoolConfig, selector: impl ShardSelector + 'static) -> Self {
        let bucket_count = config.bucket_count();
        let buckets = (0..bucket_count).map(|_| Bucket::empty()).collect();
        debug!(
            bucket_count,
            max_bucket_bytes = config.max_bucket_bytes,
            "segment pool created"
        );

        Self {
            buckets,
            locked: Arc::new(FreeSlot::Locked),
            config,
            selector: Box::new(selector),
            stats: PoolStats::new(),
        }
    }

    /// Returns the process-wide pool, creating it with
    /// [`PoolConfig::default`] on first use.
    pub fn global() -> &'static SegmentPool {
        GLOBAL_POOL.get_or_init(|| SegmentPool::new(PoolConfig::default()))
    }

    /// Installs the process-wide pool with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::GlobalPoolInitialized`] if the global pool
    /// already exists.
    pub fn init_global(config: PoolConfig) -> SegmentResult<&'static SegmentPool> {
        let mut installed = false;
        let pool = GLOBAL_POOL.get_or_init(|| {
            installed = true;
            SegmentPool::new(config)
        });

        if installed {
            debug!(bucket_count = pool.bucket_count(), "global segment pool installed");
            Ok(pool)
        } else {
            Err(SegmentError::GlobalPoolInitialized)
        }
    }

    /// Returns a pooled segment, or a fresh one if the caller's bucket is
    /// empty or busy.
    ///
    /// A pooled segment keeps its old array contents; both cursors are zero.
    pub fn take(&self) -> Segment {
        self.stats.record_take();
        let bucket = self.bucket();

        let head = bucket.swap(Some(Arc::clone(&self.locked)));
        let next = match head.as_deref() {
            None => {
                bucket.store(None);
                self.stats.record_miss();
                return Segment::new();
            }
            // Someone else holds the bucket; they restore it.
            Some(FreeSlot::Locked) => {
                self.stats.record_contended_take();
                trace!("segment bucket locked, allocating");
                return Segment::new();
            }
            Some(FreeSlot::Free(free)) => free.next.clone(),
        };
        bucket.store(next);

        // A concurrent recycle may still hold the node it read as head.
        match head.map(Arc::try_unwrap) {
            Some(Ok(FreeSlot::Free(free))) => {
                self.stats.record_hit();
                Segment::recycled(free.data)
            }
            _ => {
                self.stats.record_contended_take();
                trace!("pooled segment still referenced, allocating");
                Segment::new()
            }
        }
    }

    /// Returns `segment` to the caller's bucket.
    ///
    /// Shared segments are ignored. The segment is also dropped when the
    /// bucket is full, locked by a take, or changed by a concurrent
    /// operation; none of these are errors.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::StillLinked`] if the segment is still linked
    /// into a chain.
    pub fn recycle(&self, segment: Segment) -> SegmentResult<()> {
        if segment.is_linked() {
            return Err(SegmentError::StillLinked);
        }
        if segment.is_shared() {
            self.stats.record_rejected_shared();
            return Ok(());
        }

        let bucket = self.bucket();
        let head = bucket.load_full();
        self.push_free(bucket, head, segment);
        Ok(())
    }

    /// Pushes `segment` onto `bucket` if its head is still `head`.
    fn push_free(&self, bucket: &Bucket, head: Option<Arc<FreeSlot>>, segment: Segment) {
        let pooled = match head.as_deref() {
            None => 0,
            Some(FreeSlot::Free(free)) => free.cumulative_bytes,
            Some(FreeSlot::Locked) => {
                self.stats.record_contended_recycle();
                trace!("segment bucket locked, dropping segment");
                return;
            }
        };
        if pooled >= self.config.max_bucket_bytes {
            self.stats.record_rejected_full();
            trace!(pooled, "segment bucket full, dropping segment");
            return;
        }

        let node = Arc::new(FreeSlot::Free(FreeSegment {
            data: segment.into_data(),
            next: head.clone(),
            cumulative_bytes: pooled + SIZE,
        }));
        let previous = bucket.compare_and_swap(&head, Some(node));
        if same_slot(&previous, &head) {
            self.stats.record_recycle();
        } else {
            self.stats.record_contended_recycle();
            trace!("segment bucket changed, dropping segment");
        }
    }

    /// Approximate bytes pooled in the caller's bucket.
    ///
    /// Not synchronised with concurrent takes or recycles.
    pub fn byte_count(&self) -> usize {
        pooled_bytes(self.bucket())
    }

    /// Approximate bytes pooled in bucket `index`; zero if out of range.
    pub fn bucket_byte_count(&self, index: usize) -> usize {
        self.buckets.get(index).map_or(0, pooled_bytes)
    }

    /// Approximate bytes pooled across all buckets.
    pub fn total_byte_count(&self) -> usize {
        self.buckets.iter().map(pooled_bytes).sum()
    }

    /// Number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// The configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Take and recycle counters.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    fn bucket(&self) -> &Bucket {
        let index = self.selector.select() & (self.buckets.len() - 1);
        &self.buckets[index]
    }
}

impl fmt::Debug for SegmentPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentPool")
            .field("bucket_count", &self.buckets.len())
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

fn pooled_bytes(bucket: &Bucket) -> usize {
    match bucket.load().as_deref() {
        Some(FreeSlot::Free(free)) => free.cumulative_bytes,
        _ => 0,
    }
}

fn same_slot(a: &Option<Arc<FreeSlot>>, b: &Option<Arc<FreeSlot>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

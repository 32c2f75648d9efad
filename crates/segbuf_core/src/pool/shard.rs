//! Bucket selection for the segment pool.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

thread_local! {
    static THREAD_HASH: usize = {
        let mut hasher = DefaultHasher::new();
        thread::current().id().hash(&mut hasher);
        hasher.finish() as usize
    };
}

/// Picks the bucket a pool operation uses.
///
/// The pool masks the returned value with `bucket_count - 1`, so any
/// well-spread integer works. Selection only biases locality: every bucket
/// is safe to use from every thread.
pub trait ShardSelector: Send + Sync {
    /// Returns a value identifying the caller's shard.
    fn select(&self) -> usize;
}

/// Selects by a hash of the calling thread's id.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadIdSelector;

impl ShardSelector for ThreadIdSelector {
    #[inline]
    fn select(&self) -> usize {
        THREAD_HASH.with(|hash| *hash)
    }
}

/// Always selects the same shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSelector(pub usize);

impl ShardSelector for FixedSelector {
    #[inline]
    fn select(&self) -> usize {
        self.0
    }
}

impl<F> ShardSelector for F
where
    F: Fn() -> usize + Send + Sync,
{
    fn select(&self) -> usize {
        self()
    }
}

//! # Segbuf Core
//!
//! Segment storage for byte-buffer I/O.
//!
//! This crate provides:
//! - [`Segment`]: a window of unread bytes over a fixed 8 KiB array, with
//!   zero-copy sharing and byte transfer between segments
//! - [`SegmentChain`]: the circular chain a buffer links its segments into,
//!   with split and compaction
//! - [`SegmentPool`]: a sharded, non-blocking cache of drained segments
//!
//! ## Ownership rules
//!
//! - Only a segment whose `owner` flag is set may append to its array
//! - Arrays referenced by more than one segment are shared, never shifted
//!   and never pooled
//! - A segment must be unlinked from its chain before it is recycled
//!
//! ## Example
//!
//! ```rust
//! use segbuf_core::{PoolConfig, SegmentChain, SegmentPool};
//!
//! let pool = SegmentPool::new(PoolConfig::default());
//! let mut chain = SegmentChain::new();
//!
//! let mut segment = pool.take();
//! segment.write(b"hello world").unwrap();
//! let id = chain.push_back(segment).unwrap();
//!
//! let prefix = chain.split(id, 5, &pool).unwrap();
//! assert_eq!(chain.get(prefix).unwrap().to_vec(), b"hello");
//! assert_eq!(chain.to_vec(), b"hello world");
//!
//! chain.recycle_all(&pool).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod pool;
mod segment;
mod stats;

pub use config::PoolConfig;
pub use error::{ErrorKind, SegmentError, SegmentResult};
pub use pool::{FixedSelector, SegmentPool, ShardSelector, ThreadIdSelector, MAX_SIZE};
pub use segment::{Iter, Popped, Segment, SegmentChain, SegmentId, SHARE_MINIMUM, SIZE};
pub use stats::{PoolStats, PoolStatsSnapshot};

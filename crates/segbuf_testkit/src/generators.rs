//! Property-based test generators using proptest.
//!
//! Provides strategies for generating payloads and operations that stay
//! within segment bounds.

use proptest::prelude::*;
use segbuf_core::SIZE;

/// Strategy for a payload that fits in one segment, of `1..=max_len` bytes.
pub fn payload_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    let max_len = max_len.clamp(1, SIZE);
    prop::collection::vec(any::<u8>(), 1..=max_len)
}

/// Strategy for a payload and a valid split point within it.
///
/// The byte count is always in `1..=payload.len()`.
pub fn split_strategy() -> impl Strategy<Value = (Vec<u8>, usize)> {
    payload_strategy(SIZE).prop_flat_map(|payload| {
        let len = payload.len();
        (Just(payload), 1..=len)
    })
}

/// Strategy for the payloads of a short chain.
pub fn chain_payloads_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..2048), 1..6)
}

/// A segment-level operation for model tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOp {
    /// Append bytes to the tail.
    Write(Vec<u8>),
    /// Consume bytes from the head.
    Read(usize),
    /// Split the head at an offset (taken modulo its length).
    SplitHead(usize),
    /// Compact the tail into its predecessor.
    CompactTail,
}

/// Strategy for a single segment operation.
pub fn segment_op_strategy() -> impl Strategy<Value = SegmentOp> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 1..3000).prop_map(SegmentOp::Write),
        (1usize..4096).prop_map(SegmentOp::Read),
        (1usize..SIZE).prop_map(SegmentOp::SplitHead),
        Just(SegmentOp::CompactTail),
    ]
}

/// Strategy for a sequence of segment operations.
pub fn segment_op_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<SegmentOp>> {
    prop::collection::vec(segment_op_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

//! Test fixtures for pools, segments and chains.

use segbuf_core::{
    FixedSelector, PoolConfig, Segment, SegmentChain, SegmentId, SegmentPool, SIZE,
};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per process.
///
/// The filter comes from `RUST_LOG`; nothing is printed when it is unset.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A pool with a single bucket that every thread shares.
///
/// Byte counts observed through it are deterministic in single-threaded tests.
pub fn isolated_pool() -> SegmentPool {
    SegmentPool::with_selector(PoolConfig::new().parallelism(1), FixedSelector(0))
}

/// A pool with `parallelism` rounded up to a power of two buckets, sharded
/// by thread.
pub fn sharded_pool(parallelism: usize) -> SegmentPool {
    SegmentPool::new(PoolConfig::new().parallelism(parallelism))
}

/// Creates a fresh segment holding `bytes`.
///
/// # Panics
///
/// Panics if `bytes` does not fit in one segment.
pub fn segment_with(bytes: &[u8]) -> Segment {
    assert!(bytes.len() <= SIZE, "payload exceeds segment size");
    let mut segment = Segment::new();
    let written = segment.write(bytes).expect("fresh segment owns its array");
    assert_eq!(written, bytes.len());
    segment
}

/// Builds a chain with one segment per payload, in order.
pub fn chain_of(payloads: &[&[u8]]) -> (SegmentChain, Vec<SegmentId>) {
    let mut chain = SegmentChain::new();
    let ids = payloads
        .iter()
        .map(|payload| {
            chain
                .push_back(segment_with(payload))
                .expect("fresh segment is detached")
        })
        .collect();
    (chain, ids)
}

/// Deterministic bytes for a payload of `len` bytes.
pub fn patterned_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

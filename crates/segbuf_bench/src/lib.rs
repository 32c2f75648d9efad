//! Benchmark utilities.

use rand::Rng;
use segbuf_core::{Segment, SegmentChain, SegmentId, SegmentPool, SIZE};

/// Generate random payload bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Random payload sizes between 1 and a full segment.
pub fn random_sizes(count: usize) -> Vec<usize> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(1..=SIZE)).collect()
}

/// Take a segment from `pool` and fill it with `data`.
pub fn filled_segment(pool: &SegmentPool, data: &[u8]) -> Segment {
    let mut segment = pool.take();
    let written = segment.write(data).unwrap_or(0);
    debug_assert_eq!(written, data.len().min(SIZE));
    segment
}

/// Build a chain whose segments each hold one payload.
pub fn filled_chain(pool: &SegmentPool, payloads: &[Vec<u8>]) -> (SegmentChain, Vec<SegmentId>) {
    let mut chain = SegmentChain::new();
    let ids = payloads
        .iter()
        .filter_map(|payload| chain.push_back(filled_segment(pool, payload)).ok())
        .collect();
    (chain, ids)
}

//! Stress tests for the segment pool.
//!
//! These runs hammer a shared pool from several threads and check that
//! every operation either succeeds or degrades without corrupting bytes.

use crate::fixtures::patterned_bytes;
use segbuf_core::{Segment, SegmentChain, SegmentPool, SegmentResult, SIZE};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Logs a summary of the run.
    pub fn log_summary(&self, name: &str) {
        info!(
            name,
            total = self.total_ops,
            successful = self.successful_ops,
            failed = self.failed_ops,
            duration = ?self.duration,
            ops_per_second = self.ops_per_second,
            "stress run finished"
        );
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform, split across threads.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Bytes written per operation.
    pub payload_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            payload_size: 2_000,
        }
    }
}

impl StressConfig {
    fn payload_size(&self) -> usize {
        self.payload_size.clamp(2, SIZE)
    }
}

/// Runs take/write/recycle cycles from every thread.
///
/// An operation fails if the taken segment is not an empty owner or does not
/// read back what was written.
pub fn stress_take_recycle(pool: Arc<SegmentPool>, config: &StressConfig) -> StressTestResult {
    run_threads(pool, config, |pool, thread, op, payload_size| {
        let payload = patterned_bytes(payload_size, (thread + op) as u8);
        let mut segment = pool.take();
        if !segment.is_empty() || !segment.is_owner() {
            return false;
        }
        match segment.write(&payload) {
            Ok(written) if written == payload.len() => {}
            _ => return false,
        }
        let intact = segment.to_vec() == payload;
        pool.recycle(segment).is_ok() && intact
    })
}

/// Builds a two-segment chain per operation, splits the head and compacts
/// the tail, then recycles everything.
///
/// An operation fails if the chain's bytes change along the way.
pub fn stress_split_compact(pool: Arc<SegmentPool>, config: &StressConfig) -> StressTestResult {
    run_threads(pool, config, |pool, thread, op, payload_size| {
        let payload = patterned_bytes(payload_size, (thread * 7 + op) as u8);
        let mut first = pool.take();
        let mut second = pool.take();
        let half = payload.len() / 2;
        if first.write(&payload[..half]).is_err() || second.write(&payload[half..]).is_err() {
            return false;
        }

        matches!(
            split_then_compact([first, second], op, pool),
            Ok(bytes) if bytes == payload
        )
    })
}

fn split_then_compact(
    segments: [Segment; 2],
    op: usize,
    pool: &SegmentPool,
) -> SegmentResult<Vec<u8>> {
    let [first, second] = segments;
    let mut chain = SegmentChain::new();
    let head = chain.push_back(first)?;
    let tail = chain.push_back(second)?;
    let head_len = chain.get(head)?.len();
    chain.split(head, op % head_len + 1, pool)?;
    chain.compact(tail, pool)?;
    let bytes = chain.to_vec();
    chain.recycle_all(pool)?;
    Ok(bytes)
}

/// Returns true if no bucket pools more bytes than the configured cap.
pub fn buckets_within_cap(pool: &SegmentPool) -> bool {
    let cap = pool.config().max_bucket_bytes;
    (0..pool.bucket_count()).all(|index| pool.bucket_byte_count(index) <= cap)
}

fn run_threads<F>(pool: Arc<SegmentPool>, config: &StressConfig, op: F) -> StressTestResult
where
    F: Fn(&SegmentPool, usize, usize, usize) -> bool + Send + Sync + 'static,
{
    let threads = config.threads.max(1);
    let ops_per_thread = config.operations / threads;
    let payload_size = config.payload_size();
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let op = Arc::new(op);

    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let pool = Arc::clone(&pool);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let op = Arc::clone(&op);

            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    if op(&pool, t, i, payload_size) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

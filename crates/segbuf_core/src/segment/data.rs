//! Reference-counted backing arrays.

use super::SIZE;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;

/// A fixed-size byte array that may be referenced by several segments.
///
/// Cloning shares the array; [`SegmentData::deep_copy`] allocates a new one.
/// Readers take the read lock; the single owning segment takes the write lock
/// to append or shift. Which segment is the owner is tracked by the segment,
/// not here.
#[derive(Clone)]
pub(crate) struct SegmentData {
    bytes: Arc<RwLock<Box<[u8]>>>,
}

impl SegmentData {
    /// Allocates a zeroed array of [`SIZE`] bytes.
    pub(crate) fn new() -> Self {
        Self {
            bytes: Arc::new(RwLock::new(vec![0u8; SIZE].into_boxed_slice())),
        }
    }

    /// Allocates a new array holding a copy of every byte of this one.
    pub(crate) fn deep_copy(&self) -> Self {
        let copy = self.bytes.read().clone();
        Self {
            bytes: Arc::new(RwLock::new(copy)),
        }
    }

    /// Returns true if both handles reference the same array.
    pub(crate) fn same_array(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.bytes.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.bytes.write()
    }

    /// Copies `len` bytes at `from` in this array to `to` in `sink`.
    ///
    /// Locks are taken in address order so two opposite copies between the
    /// same pair of arrays cannot deadlock.
    pub(crate) fn copy_into(&self, from: usize, sink: &SegmentData, to: usize, len: usize) {
        if len == 0 {
            return;
        }
        if self.same_array(sink) {
            sink.write().copy_within(from..from + len, to);
            return;
        }

        if self.addr() < sink.addr() {
            let source = self.read();
            let mut target = sink.write();
            target[to..to + len].copy_from_slice(&source[from..from + len]);
        } else {
            let mut target = sink.write();
            let source = self.read();
            target[to..to + len].copy_from_slice(&source[from..from + len]);
        }
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.bytes) as usize
    }
}

impl fmt::Debug for SegmentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentData")
            .field("array", &Arc::as_ptr(&self.bytes))
            .field("handles", &Arc::strong_count(&self.bytes))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_array() {
        let data = SegmentData::new();
        let shared = data.clone();
        assert!(data.same_array(&shared));

        data.write()[0] = 7;
        assert_eq!(shared.read()[0], 7);
    }

    #[test]
    fn deep_copy_is_independent() {
        let data = SegmentData::new();
        data.write()[10] = 42;

        let copy = data.deep_copy();
        assert!(!data.same_array(&copy));
        assert_eq!(copy.read()[10], 42);

        data.write()[10] = 1;
        assert_eq!(copy.read()[10], 42);
        assert_eq!(copy.read().len(), SIZE);
    }
}

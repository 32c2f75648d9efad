//! Fixed-size byte segments.
//!
//! A segment is a window `[pos, limit)` of unread bytes over a backing array
//! of [`SIZE`] bytes. Segments are linked into a [`SegmentChain`] while a
//! buffer holds them, and handed back to a [`SegmentPool`] once drained.
//!
//! ## Sharing
//!
//! Several segments may reference the same array (see
//! [`Segment::shared_copy`]). Such segments are marked shared and are never
//! pooled. Exactly one of them, the owner, may append bytes past its `limit`;
//! a shared array is never shifted.
//!
//! [`SegmentPool`]: crate::SegmentPool

mod chain;
mod data;

pub use chain::{Iter, Popped, SegmentChain, SegmentId};

pub(crate) use chain::Links;
pub(crate) use data::SegmentData;

use crate::error::{SegmentError, SegmentResult};

/// Size in bytes of every segment's backing array.
pub const SIZE: usize = 8192;

/// Splits of at least this many bytes share the array instead of copying.
pub const SHARE_MINIMUM: usize = 1024;

/// A window of unread bytes over a fixed-size array.
#[derive(Debug)]
pub struct Segment {
    data: SegmentData,
    /// Offset of the next unread byte.
    pos: usize,
    /// Offset of the first writable byte.
    limit: usize,
    /// True if another segment references `data`.
    shared: bool,
    /// True if this segment may append to `data`.
    owner: bool,
    /// Set while the segment is linked into a chain.
    pub(crate) links: Option<Links>,
}

impl Default for Segment {
    fn default() -> Self {
        Self::new()
    }
}

impl Segment {
    /// Creates an empty segment over a freshly allocated array.
    #[must_use]
    pub fn new() -> Self {
        Self::recycled(SegmentData::new())
    }

    /// Wraps an array that came back from the pool.
    ///
    /// The array may hold stale bytes; both cursors start at zero.
    pub(crate) fn recycled(data: SegmentData) -> Self {
        Self {
            data,
            pos: 0,
            limit: 0,
            shared: false,
            owner: true,
            links: None,
        }
    }

    /// Gives up the segment, returning its array.
    pub(crate) fn into_data(self) -> SegmentData {
        self.data
    }

    /// Returns a read-only view of the same bytes without copying them.
    ///
    /// Both this segment and the copy are marked shared; the copy is never
    /// an owner. Marking this segment shared keeps it out of the pool.
    pub fn shared_copy(&mut self) -> Segment {
        self.shared = true;
        Segment {
            data: self.data.clone(),
            pos: self.pos,
            limit: self.limit,
            shared: true,
            owner: false,
            links: None,
        }
    }

    /// Returns an owning segment over a full copy of this segment's array.
    #[must_use]
    pub fn unshared_copy(&self) -> Segment {
        Segment {
            data: self.data.deep_copy(),
            pos: self.pos,
            limit: self.limit,
            shared: false,
            owner: true,
            links: None,
        }
    }

    /// Offset of the next unread byte.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Offset of the first byte past the unread region.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of unread bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.limit - self.pos
    }

    /// Returns true if there are no unread bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.limit
    }

    /// Returns true if the array is referenced by another segment.
    #[inline]
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Returns true if this segment may append to its array.
    #[inline]
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Returns true while the segment is linked into a chain.
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.links.is_some()
    }

    /// Bytes that can still be appended at `limit` without shifting.
    ///
    /// Always zero for segments that do not own their array.
    pub fn writable_len(&self) -> usize {
        if self.owner {
            SIZE - self.limit
        } else {
            0
        }
    }

    /// Returns true if both segments reference the same array.
    pub fn shares_array_with(&self, other: &Segment) -> bool {
        self.data.same_array(&other.data)
    }

    /// Copies unread bytes into `out` without consuming them.
    ///
    /// Returns the number of bytes copied. The array lock is held only for
    /// the copy.
    pub fn copy_to(&self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.len());
        if count > 0 {
            let data = self.data.read();
            out[..count].copy_from_slice(&data[self.pos..self.pos + count]);
        }
        count
    }

    /// Copies the unread bytes into a new vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.len()];
        self.copy_to(&mut bytes);
        bytes
    }

    /// Appends as many of `bytes` as fit after `limit`.
    ///
    /// Returns the number of bytes appended.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::NotOwner`] if this segment does not own its
    /// array.
    pub fn write(&mut self, bytes: &[u8]) -> SegmentResult<usize> {
        if !self.owner {
            return Err(SegmentError::NotOwner);
        }

        let count = bytes.len().min(SIZE - self.limit);
        if count > 0 {
            let mut data = self.data.write();
            data[self.limit..self.limit + count].copy_from_slice(&bytes[..count]);
        }
        self.limit += count;
        Ok(count)
    }

    /// Copies unread bytes into `out` and consumes them.
    ///
    /// Returns the number of bytes copied.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let count = self.copy_to(out);
        self.pos += count;
        count
    }

    /// Consumes `byte_count` unread bytes without copying them.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::ReadPastLimit`] if fewer bytes are unread.
    pub fn skip(&mut self, byte_count: usize) -> SegmentResult<()> {
        if byte_count > self.len() {
            return Err(SegmentError::ReadPastLimit {
                byte_count,
                available: self.len(),
            });
        }
        self.pos += byte_count;
        Ok(())
    }

    /// Moves `byte_count` unread bytes from this segment to the end of `sink`.
    ///
    /// When the bytes do not fit after `sink.limit`, the sink's unread bytes
    /// are first shifted to offset zero.
    ///
    /// # Errors
    ///
    /// - [`SegmentError::NotOwner`] if `sink` does not own its array
    /// - [`SegmentError::ByteCountOutOfRange`] if fewer than `byte_count`
    ///   bytes are unread here
    /// - [`SegmentError::SharedSink`] if `sink` would need a shift but is shared
    /// - [`SegmentError::InsufficientCapacity`] if the bytes do not fit even
    ///   after the shift
    pub fn write_to(&mut self, sink: &mut Segment, byte_count: usize) -> SegmentResult<()> {
        if !sink.owner {
            return Err(SegmentError::NotOwner);
        }
        if byte_count > self.len() {
            return Err(SegmentError::byte_count_out_of_range(
                byte_count,
                self.len(),
            ));
        }

        if sink.limit + byte_count > SIZE {
            if sink.shared {
                return Err(SegmentError::SharedSink);
            }
            if sink.len() + byte_count > SIZE {
                return Err(SegmentError::insufficient_capacity(
                    byte_count,
                    SIZE - sink.len(),
                ));
            }
            sink.shift_to_start();
        }

        self.data
            .copy_into(self.pos, &sink.data, sink.limit, byte_count);
        sink.limit += byte_count;
        self.pos += byte_count;
        Ok(())
    }

    /// Moves the unread bytes to the start of the array.
    fn shift_to_start(&mut self) {
        let len = self.len();
        if self.pos > 0 {
            self.data.write().copy_within(self.pos..self.limit, 0);
        }
        self.pos = 0;
        self.limit = len;
    }

    /// Sets both cursors. Used when the chain copies a prefix into a
    /// segment taken from the pool.
    pub(crate) fn set_window(&mut self, pos: usize, limit: usize) {
        debug_assert!(pos <= limit && limit <= SIZE);
        self.pos = pos;
        self.limit = limit;
    }

    pub(crate) fn data(&self) -> &SegmentData {
        &self.data
    }
}

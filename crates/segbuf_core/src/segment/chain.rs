//! Circular doubly-linked chains of segments.
//!
//! A chain owns its segments in an arena and links them through
//! [`SegmentId`] handles. Every linked segment has a predecessor and a
//! successor; a sole segment is its own predecessor and successor.

use super::{Segment, SHARE_MINIMUM, SIZE};
use crate::error::{SegmentError, SegmentResult};
use crate::pool::SegmentPool;

/// Handle to a segment linked into a [`SegmentChain`].
///
/// Handles are generational: once a segment is popped, its handle no longer
/// resolves, even if the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentId {
    index: usize,
    generation: u32,
}

/// Neighbours of a linked segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links {
    pub(crate) prev: SegmentId,
    pub(crate) next: SegmentId,
}

/// A segment detached by [`SegmentChain::pop`].
#[derive(Debug)]
pub struct Popped {
    /// The detached segment. It carries no links.
    pub segment: Segment,
    /// The former successor, or `None` if the segment was the sole element.
    pub next: Option<SegmentId>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    segment: Option<Segment>,
}

/// A circular chain of segments.
///
/// The head is the segment holding the oldest unread bytes; reading order
/// follows `next` links from the head back around to it.
#[derive(Debug, Default)]
pub struct SegmentChain {
    slots: Vec<Slot>,
    vacant: Vec<usize>,
    head: Option<SegmentId>,
    len: usize,
}

impl SegmentChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of linked segments.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no segment is linked.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The first segment of the chain.
    pub fn head(&self) -> Option<SegmentId> {
        self.head
    }

    /// The last segment of the chain, which precedes the head.
    pub fn tail(&self) -> Option<SegmentId> {
        let head = self.head?;
        self.links(head).ok().map(|links| links.prev)
    }

    /// Returns the segment behind `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::UnknownSegment`] if `id` is not linked here.
    pub fn get(&self, id: SegmentId) -> SegmentResult<&Segment> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.segment.as_ref())
            .ok_or_else(|| unknown(id))
    }

    /// Returns the segment behind `id` for cursor updates.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::UnknownSegment`] if `id` is not linked here.
    pub fn get_mut(&mut self, id: SegmentId) -> SegmentResult<&mut Segment> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.segment.as_mut())
            .ok_or_else(|| unknown(id))
    }

    /// The successor of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::UnknownSegment`] if `id` is not linked here.
    pub fn next(&self, id: SegmentId) -> SegmentResult<SegmentId> {
        Ok(self.links(id)?.next)
    }

    /// The predecessor of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::UnknownSegment`] if `id` is not linked here.
    pub fn prev(&self, id: SegmentId) -> SegmentResult<SegmentId> {
        Ok(self.links(id)?.prev)
    }

    /// Starts the chain with a single segment.
    ///
    /// # Errors
    ///
    /// - [`SegmentError::ChainNotEmpty`] if the chain already has a head
    /// - [`SegmentError::StillLinked`] if `segment` is linked elsewhere
    pub fn link_first(&mut self, segment: Segment) -> SegmentResult<SegmentId> {
        if self.head.is_some() {
            return Err(SegmentError::ChainNotEmpty);
        }
        if segment.is_linked() {
            return Err(SegmentError::StillLinked);
        }

        let id = self.allocate(segment);
        *self.links_mut(id)? = Some(Links { prev: id, next: id });
        self.head = Some(id);
        self.len = 1;
        Ok(id)
    }

    /// Links `segment` immediately after `after` and returns its handle.
    ///
    /// # Errors
    ///
    /// - [`SegmentError::UnknownSegment`] if `after` is not linked here
    /// - [`SegmentError::StillLinked`] if `segment` is linked elsewhere
    pub fn push(&mut self, after: SegmentId, segment: Segment) -> SegmentResult<SegmentId> {
        if segment.is_linked() {
            return Err(SegmentError::StillLinked);
        }
        let successor = self.links(after)?.next;

        let id = self.allocate(segment);
        *self.links_mut(id)? = Some(Links {
            prev: after,
            next: successor,
        });
        self.expect_links_mut(successor)?.prev = id;
        self.expect_links_mut(after)?.next = id;
        self.len += 1;
        Ok(id)
    }

    /// Links `segment` after the tail, or starts the chain if it is empty.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::StillLinked`] if `segment` is linked elsewhere.
    pub fn push_back(&mut self, segment: Segment) -> SegmentResult<SegmentId> {
        match self.tail() {
            Some(tail) => self.push(tail, segment),
            None => self.link_first(segment),
        }
    }

    /// Unlinks `id`, joining its neighbours to each other.
    ///
    /// If `id` was the head, the head moves to its successor.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::UnknownSegment`] if `id` is not linked here.
    pub fn pop(&mut self, id: SegmentId) -> SegmentResult<Popped> {
        let links = self.links(id)?;

        let next = if links.next == id {
            None
        } else {
            self.expect_links_mut(links.prev)?.next = links.next;
            self.expect_links_mut(links.next)?.prev = links.prev;
            Some(links.next)
        };

        if self.head == Some(id) {
            self.head = next;
        }

        let mut segment = self.release(id)?;
        segment.links = None;
        self.len -= 1;
        Ok(Popped { segment, next })
    }

    /// Splits the unread bytes of `id` into a prefix of `byte_count` bytes
    /// and the remainder, linking the prefix just before `id`.
    ///
    /// Prefixes of at least [`SHARE_MINIMUM`] bytes share the array and mark
    /// both segments shared; shorter ones are copied into a segment taken
    /// from `pool`. When `id` is the head, the prefix becomes the head.
    ///
    /// # Errors
    ///
    /// - [`SegmentError::ByteCountOutOfRange`] unless
    ///   `0 < byte_count <= len`
    /// - [`SegmentError::UnknownSegment`] if `id` is not linked here
    pub fn split(
        &mut self,
        id: SegmentId,
        byte_count: usize,
        pool: &SegmentPool,
    ) -> SegmentResult<SegmentId> {
        let segment = self.get_mut(id)?;
        if byte_count == 0 || byte_count > segment.len() {
            return Err(SegmentError::byte_count_out_of_range(
                byte_count,
                segment.len(),
            ));
        }

        let prefix = if byte_count >= SHARE_MINIMUM {
            let mut prefix = segment.shared_copy();
            prefix.set_window(prefix.pos(), prefix.pos() + byte_count);
            prefix
        } else {
            let mut prefix = pool.take();
            segment
                .data()
                .copy_into(segment.pos(), prefix.data(), 0, byte_count);
            prefix.set_window(0, byte_count);
            prefix
        };
        segment.skip(byte_count)?;

        let prev = self.prev(id)?;
        let prefix_id = self.push(prev, prefix)?;
        if self.head == Some(id) {
            self.head = Some(prefix_id);
        }
        Ok(prefix_id)
    }

    /// Merges the unread bytes of `id` into its predecessor and returns the
    /// emptied segment to `pool`.
    ///
    /// Returns `false` without changing anything when the predecessor does
    /// not own its array or cannot hold the bytes. Consumed bytes of an
    /// unshared predecessor count as free space since they can be shifted
    /// away. Buffers call this on the tail, whose predecessor precedes it in
    /// reading order.
    ///
    /// # Errors
    ///
    /// - [`SegmentError::SoleSegment`] if `id` is the only segment
    /// - [`SegmentError::UnknownSegment`] if `id` is not linked here
    pub fn compact(&mut self, id: SegmentId, pool: &SegmentPool) -> SegmentResult<bool> {
        let prev = self.links(id)?.prev;
        if prev == id {
            return Err(SegmentError::SoleSegment);
        }

        let (segment, predecessor) = self.pair_mut(id, prev)?;
        if !predecessor.is_owner() {
            return Ok(false);
        }

        let byte_count = segment.len();
        let reclaimable = if predecessor.is_shared() {
            0
        } else {
            predecessor.pos()
        };
        if byte_count > SIZE - predecessor.limit() + reclaimable {
            return Ok(false);
        }

        segment.write_to(predecessor, byte_count)?;
        let popped = self.pop(id)?;
        pool.recycle(popped.segment)?;
        Ok(true)
    }

    /// Moves `byte_count` bytes from `source` to the end of `sink`.
    ///
    /// # Errors
    ///
    /// Any error of [`Segment::write_to`], [`SegmentError::SameSegment`] if
    /// both handles are equal, or [`SegmentError::UnknownSegment`].
    pub fn write_to(
        &mut self,
        source: SegmentId,
        sink: SegmentId,
        byte_count: usize,
    ) -> SegmentResult<()> {
        let (source, sink) = self.pair_mut(source, sink)?;
        source.write_to(sink, byte_count)
    }

    /// Unlinks every segment and returns it to `pool`.
    ///
    /// # Errors
    ///
    /// Only fails if the chain's links are inconsistent.
    pub fn recycle_all(&mut self, pool: &SegmentPool) -> SegmentResult<()> {
        while let Some(head) = self.head {
            let popped = self.pop(head)?;
            pool.recycle(popped.segment)?;
        }
        Ok(())
    }

    /// Iterates over the segments from head to tail.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            chain: self,
            next: self.head,
            remaining: self.len,
        }
    }

    /// Total number of unread bytes across the chain.
    pub fn byte_len(&self) -> usize {
        self.iter().map(|(_, segment)| segment.len()).sum()
    }

    /// Copies every unread byte, in reading order, into a new vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.byte_len()];
        let mut offset = 0;
        for (_, segment) in self.iter() {
            offset += segment.copy_to(&mut bytes[offset..]);
        }
        bytes
    }

    fn allocate(&mut self, segment: Segment) -> SegmentId {
        let index = match self.vacant.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.segment = Some(segment);
        SegmentId {
            index,
            generation: slot.generation,
        }
    }

    fn release(&mut self, id: SegmentId) -> SegmentResult<Segment> {
        let slot = self
            .slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .ok_or_else(|| unknown(id))?;
        let segment = slot.segment.take().ok_or_else(|| unknown(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(id.index);
        Ok(segment)
    }

    fn links(&self, id: SegmentId) -> SegmentResult<Links> {
        self.get(id)?.links.ok_or_else(|| unknown(id))
    }

    fn links_mut(&mut self, id: SegmentId) -> SegmentResult<&mut Option<Links>> {
        Ok(&mut self.get_mut(id)?.links)
    }

    fn expect_links_mut(&mut self, id: SegmentId) -> SegmentResult<&mut Links> {
        self.links_mut(id)?.as_mut().ok_or_else(|| unknown(id))
    }

    fn pair_mut(
        &mut self,
        a: SegmentId,
        b: SegmentId,
    ) -> SegmentResult<(&mut Segment, &mut Segment)> {
        self.get(a)?;
        self.get(b)?;
        if a == b {
            return Err(SegmentError::SameSegment);
        }

        let (first, second) = if a.index < b.index {
            let (left, right) = self.slots.split_at_mut(b.index);
            (&mut left[a.index], &mut right[0])
        } else {
            let (left, right) = self.slots.split_at_mut(a.index);
            (&mut right[0], &mut left[b.index])
        };
        match (first.segment.as_mut(), second.segment.as_mut()) {
            (Some(first), Some(second)) => Ok((first, second)),
            _ => Err(unknown(a)),
        }
    }
}

fn unknown(id: SegmentId) -> SegmentError {
    SegmentError::UnknownSegment {
        index: id.index,
        generation: id.generation,
    }
}

/// Iterator over a chain from head to tail.
#[derive(Debug)]
pub struct Iter<'a> {
    chain: &'a SegmentChain,
    next: Option<SegmentId>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (SegmentId, &'a Segment);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.next?;
        let segment = self.chain.get(id).ok()?;
        self.next = segment.links.map(|links| links.next);
        self.remaining -= 1;
        Some((id, segment))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::error::ErrorKind;
    use crate::pool::FixedSelector;
    use proptest::prelude::*;

    fn single_bucket_pool() -> SegmentPool {
        SegmentPool::with_selector(PoolConfig::new().parallelism(1), FixedSelector(0))
    }

    fn filled(bytes: &[u8]) -> Segment {
        let mut segment = Segment::new();
        segment.write(bytes).unwrap();
        segment
    }

    #[test]
    fn sole_segment_links_to_itself() {
        let mut chain = SegmentChain::new();
        let id = chain.link_first(filled(b"a")).unwrap();

        assert_eq!(chain.next(id).unwrap(), id);
        assert_eq!(chain.prev(id).unwrap(), id);
        assert_eq!(chain.head(), Some(id));
        assert_eq!(chain.tail(), Some(id));
        assert!(chain.get(id).unwrap().is_linked());

        let err = chain.link_first(Segment::new()).unwrap_err();
        assert_eq!(err, SegmentError::ChainNotEmpty);
    }

    #[test]
    fn push_inserts_after() {
        let mut chain = SegmentChain::new();
        let a = chain.link_first(filled(b"a")).unwrap();
        let c = chain.push(a, filled(b"c")).unwrap();
        let b = chain.push(a, filled(b"b")).unwrap();

        assert_eq!(chain.next(a).unwrap(), b);
        assert_eq!(chain.next(b).unwrap(), c);
        assert_eq!(chain.next(c).unwrap(), a);
        assert_eq!(chain.prev(a).unwrap(), c);
        assert_eq!(chain.prev(c).unwrap(), b);
        assert_eq!(chain.prev(b).unwrap(), a);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.to_vec(), b"abc");
    }

    #[test]
    fn pop_relinks_neighbours() {
        let mut chain = SegmentChain::new();
        let a = chain.push_back(filled(b"a")).unwrap();
        let b = chain.push_back(filled(b"b")).unwrap();
        let c = chain.push_back(filled(b"c")).unwrap();

        let popped = chain.pop(b).unwrap();
        assert_eq!(popped.next, Some(c));
        assert!(!popped.segment.is_linked());
        assert_eq!(popped.segment.to_vec(), b"b");
        assert_eq!(chain.next(a).unwrap(), c);
        assert_eq!(chain.prev(c).unwrap(), a);
        assert_eq!(chain.to_vec(), b"ac");
    }

    #[test]
    fn pop_head_moves_head() {
        let mut chain = SegmentChain::new();
        let a = chain.push_back(filled(b"a")).unwrap();
        let b = chain.push_back(filled(b"b")).unwrap();

        chain.pop(a).unwrap();
        assert_eq!(chain.head(), Some(b));
        assert_eq!(chain.next(b).unwrap(), b);
    }

    #[test]
    fn pop_sole_segment_empties_chain() {
        let mut chain = SegmentChain::new();
        let a = chain.link_first(filled(b"a")).unwrap();

        let popped = chain.pop(a).unwrap();
        assert_eq!(popped.next, None);
        assert!(chain.is_empty());
        assert_eq!(chain.head(), None);
        assert_eq!(chain.tail(), None);
    }

    #[test]
    fn stale_handle_is_rejected() {
        let mut chain = SegmentChain::new();
        let a = chain.link_first(filled(b"a")).unwrap();
        chain.pop(a).unwrap();
        let b = chain.link_first(filled(b"b")).unwrap();

        let err = chain.get(a).unwrap_err();
        assert!(matches!(err, SegmentError::UnknownSegment { .. }));
        assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
        assert_eq!(chain.get(b).unwrap().to_vec(), b"b");
    }

    #[test]
    fn large_split_shares_array() {
        let pool = single_bucket_pool();
        let mut chain = SegmentChain::new();
        let payload: Vec<u8> = (0..8000).map(|i| (i % 251) as u8).collect();
        let a = chain.link_first(filled(&payload)).unwrap();

        let prefix = chain.split(a, 2000, &pool).unwrap();

        let original = chain.get(a).unwrap();
        let head = chain.get(prefix).unwrap();
        assert!(head.shares_array_with(original));
        assert!(head.is_shared());
        assert!(!head.is_owner());
        assert!(original.is_shared());
        assert_eq!(head.len(), 2000);
        assert_eq!(original.pos(), 2000);
        assert_eq!(original.len(), 6000);
        assert_eq!(chain.head(), Some(prefix));
        assert_eq!(chain.to_vec(), payload);
    }

    #[test]
    fn small_split_copies_into_pooled_segment() {
        let pool = single_bucket_pool();
        pool.recycle(Segment::new()).unwrap();
        assert_eq!(pool.byte_count(), SIZE);

        let mut chain = SegmentChain::new();
        let a = chain.link_first(filled(b"hello world")).unwrap();
        let prefix = chain.split(a, 5, &pool).unwrap();

        assert_eq!(pool.byte_count(), 0);
        let head = chain.get(prefix).unwrap();
        let original = chain.get(a).unwrap();
        assert!(!head.shares_array_with(original));
        assert!(!original.is_shared());
        assert!(head.is_owner());
        assert_eq!(head.to_vec(), b"hello");
        assert_eq!(original.to_vec(), b" world");
        assert_eq!(chain.to_vec(), b"hello world");
    }

    #[test]
    fn split_of_inner_segment_keeps_head() {
        let pool = single_bucket_pool();
        let mut chain = SegmentChain::new();
        let a = chain.push_back(filled(b"ab")).unwrap();
        let b = chain.push_back(filled(b"cdef")).unwrap();

        let prefix = chain.split(b, 1, &pool).unwrap();
        assert_eq!(chain.head(), Some(a));
        assert_eq!(chain.next(a).unwrap(), prefix);
        assert_eq!(chain.next(prefix).unwrap(), b);
        assert_eq!(chain.to_vec(), b"abcdef");
    }

    #[test]
    fn split_rejects_out_of_range() {
        let pool = single_bucket_pool();
        let mut chain = SegmentChain::new();
        let a = chain.link_first(filled(b"abc")).unwrap();

        for byte_count in [0, 4] {
            let err = chain.split(a, byte_count, &pool).unwrap_err();
            assert_eq!(err, SegmentError::byte_count_out_of_range(byte_count, 3));
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn compact_merges_into_predecessor() {
        let pool = single_bucket_pool();
        let mut chain = SegmentChain::new();
        chain.push_back(filled(&[1u8; 100])).unwrap();
        let tail = chain.push_back(filled(&[2u8; 50])).unwrap();

        assert!(chain.compact(tail, &pool).unwrap());

        assert_eq!(chain.len(), 1);
        let head = chain.head().unwrap();
        assert_eq!(chain.get(head).unwrap().len(), 150);
        let bytes = chain.to_vec();
        assert!(bytes[..100].iter().all(|&b| b == 1));
        assert!(bytes[100..].iter().all(|&b| b == 2));
        assert_eq!(pool.byte_count(), SIZE);
    }

    #[test]
    fn compact_reclaims_consumed_bytes() {
        let pool = single_bucket_pool();
        let mut chain = SegmentChain::new();
        let head = chain.push_back(filled(&vec![1u8; SIZE])).unwrap();
        chain.get_mut(head).unwrap().skip(SIZE - 10).unwrap();
        let tail = chain.push_back(filled(&[2u8; 300])).unwrap();

        assert!(chain.compact(tail, &pool).unwrap());
        let merged = chain.get(head).unwrap();
        assert_eq!(merged.pos(), 0);
        assert_eq!(merged.len(), 310);
    }

    #[test]
    fn compact_skips_shared_predecessor_without_room() {
        let pool = single_bucket_pool();
        let mut chain = SegmentChain::new();
        let head = chain.push_back(filled(&vec![1u8; SIZE - 10])).unwrap();
        let _view = chain.get_mut(head).unwrap().shared_copy();
        chain.get_mut(head).unwrap().skip(4000).unwrap();
        let tail = chain.push_back(filled(&[2u8; 300])).unwrap();

        assert!(!chain.compact(tail, &pool).unwrap());
        assert_eq!(chain.len(), 2);
        assert_eq!(pool.byte_count(), 0);
    }

    #[test]
    fn compact_skips_non_owner_predecessor() {
        let pool = single_bucket_pool();
        let mut chain = SegmentChain::new();
        let a = chain.link_first(filled(&[7u8; 4000])).unwrap();
        let prefix = chain.split(a, 2000, &pool).unwrap();
        assert!(!chain.get(prefix).unwrap().is_owner());

        assert!(!chain.compact(a, &pool).unwrap());
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn compact_rejects_sole_segment() {
        let pool = single_bucket_pool();
        let mut chain = SegmentChain::new();
        let a = chain.link_first(filled(b"a")).unwrap();

        let err = chain.compact(a, &pool).unwrap_err();
        assert_eq!(err, SegmentError::SoleSegment);
        assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
    }

    #[test]
    fn write_to_between_linked_segments() {
        let mut chain = SegmentChain::new();
        let a = chain.push_back(filled(b"ab")).unwrap();
        let b = chain.push_back(filled(b"cdef")).unwrap();

        chain.write_to(b, a, 2).unwrap();
        assert_eq!(chain.get(a).unwrap().to_vec(), b"abcd");
        assert_eq!(chain.get(b).unwrap().to_vec(), b"ef");

        let err = chain.write_to(a, a, 1).unwrap_err();
        assert_eq!(err, SegmentError::SameSegment);
    }

    #[test]
    fn recycle_all_returns_segments() {
        let pool = single_bucket_pool();
        let mut chain = SegmentChain::new();
        chain.push_back(filled(b"a")).unwrap();
        chain.push_back(filled(b"b")).unwrap();

        chain.recycle_all(&pool).unwrap();
        assert!(chain.is_empty());
        assert_eq!(pool.byte_count(), 2 * SIZE);
    }

    proptest! {
        #[test]
        fn split_preserves_bytes(
            payload in prop::collection::vec(any::<u8>(), 1..SIZE),
            cut in any::<prop::sample::Index>(),
        ) {
            let pool = single_bucket_pool();
            let byte_count = cut.index(payload.len()) + 1;
            let mut chain = SegmentChain::new();
            let a = chain.link_first(filled(&payload)).unwrap();

            let prefix = chain.split(a, byte_count, &pool).unwrap();

            let head = chain.get(prefix).unwrap();
            let original = chain.get(a).unwrap();
            prop_assert_eq!(head.len(), byte_count);
            prop_assert_eq!(
                head.shares_array_with(original),
                byte_count >= SHARE_MINIMUM
            );
            let mut joined = head.to_vec();
            joined.extend(original.to_vec());
            prop_assert_eq!(joined, payload);
        }
    }
}

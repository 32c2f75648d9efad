//! Error types for segment and pool operations.

use thiserror::Error;

/// Result type for segment operations.
pub type SegmentResult<T> = Result<T, SegmentError>;

/// Broad classification of a [`SegmentError`].
///
/// Every error raised by this crate is a caller error: either an argument
/// outside the accepted range, or an operation invoked in a state where the
/// contract forbids it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An argument was outside the accepted range.
    InvalidArgument,
    /// The operation was called in a state that forbids it.
    PreconditionViolation,
}

/// Errors that can occur in segment, chain and pool operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// A byte count was zero or larger than the unread region.
    #[error("byte count {byte_count} out of range: {available} bytes readable")]
    ByteCountOutOfRange {
        /// The requested byte count.
        byte_count: usize,
        /// Unread bytes in the segment.
        available: usize,
    },

    /// The sink cannot hold the bytes even after discarding consumed bytes.
    #[error("insufficient capacity: need {required} bytes, {available} available")]
    InsufficientCapacity {
        /// Bytes that had to fit.
        required: usize,
        /// Bytes that could be made available.
        available: usize,
    },

    /// The sink would need to be shifted but its array is shared.
    #[error("cannot shift a shared segment")]
    SharedSink,

    /// Source and sink of a transfer are the same segment.
    #[error("cannot transfer bytes from a segment to itself")]
    SameSegment,

    /// A cursor advance went past the write cursor.
    #[error("cannot advance {byte_count} bytes: {available} bytes readable")]
    ReadPastLimit {
        /// The requested advance.
        byte_count: usize,
        /// Unread bytes in the segment.
        available: usize,
    },

    /// The segment does not own its array and cannot append to it.
    #[error("segment does not own its array")]
    NotOwner,

    /// The segment is still linked into a chain.
    #[error("segment is still linked into a chain")]
    StillLinked,

    /// The segment is the only element of its chain.
    #[error("cannot compact the sole segment of a chain")]
    SoleSegment,

    /// The handle does not name a live segment in this chain.
    #[error("unknown segment {index}:{generation}")]
    UnknownSegment {
        /// Slot index of the handle.
        index: usize,
        /// Generation of the handle.
        generation: u32,
    },

    /// The chain already has a head.
    #[error("chain is not empty")]
    ChainNotEmpty,

    /// The process-wide pool was already initialised.
    #[error("global segment pool is already initialized")]
    GlobalPoolInitialized,
}

impl SegmentError {
    /// Returns the broad class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ByteCountOutOfRange { .. }
            | Self::InsufficientCapacity { .. }
            | Self::SharedSink
            | Self::SameSegment
            | Self::ReadPastLimit { .. } => ErrorKind::InvalidArgument,
            Self::NotOwner
            | Self::StillLinked
            | Self::SoleSegment
            | Self::UnknownSegment { .. }
            | Self::ChainNotEmpty
            | Self::GlobalPoolInitialized => ErrorKind::PreconditionViolation,
        }
    }

    /// Creates a byte count out of range error.
    pub fn byte_count_out_of_range(byte_count: usize, available: usize) -> Self {
        Self::ByteCountOutOfRange {
            byte_count,
            available,
        }
    }

    /// Creates an insufficient capacity error.
    pub fn insufficient_capacity(required: usize, available: usize) -> Self {
        Self::InsufficientCapacity {
            required,
            available,
        }
    }
}

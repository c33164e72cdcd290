use std::io;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the buffer and the buffered file layered on top of it.
#[derive(Debug, Error)]
pub enum Error {
    /// Every slot is fixed, or the eviction policy offered nothing evictable.
    #[error("buffer overflow: too many slots fixed (capacity {capacity})")]
    SlotOverflow { capacity: usize },

    /// The byte budget is still exceeded after evicting every unfixed slot.
    #[error("buffer overflow: {used} bytes cached, capacity is {capacity} bytes")]
    ByteOverflow { used: usize, capacity: usize },

    #[error("slot is fixed and cannot be removed")]
    SlotFixed,

    #[error("buffer invariant violated: {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("malformed buffer configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid buffer configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for the two capacity conditions: a sizing problem, never retried.
    pub fn is_overflow(&self) -> bool {
        matches!(self, Error::SlotOverflow { .. } | Error::ByteOverflow { .. })
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::Block(BlockError::Codec(e)) => e,
            other => io::Error::other(other),
        }
    }
}

/// Usage errors on a [`crate::block::Block`].
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("block has been released")]
    Released,

    #[error("block released twice")]
    AlreadyReleased,

    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: usize, len: usize },

    #[error("region offset {offset} size {size} does not fit an array of length {len}")]
    InvalidRegion {
        offset: usize,
        size: usize,
        len: usize,
    },

    #[error("deflate codec failed: {0}")]
    Codec(#[source] io::Error),
}

impl From<BlockError> for io::Error {
    fn from(err: BlockError) -> Self {
        match err {
            BlockError::Codec(e) => e,
            BlockError::OutOfBounds { .. } | BlockError::InvalidRegion { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            other => io::Error::other(other),
        }
    }
}

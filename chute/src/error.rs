//! Error types for chute framing, streaming, and file handling

use std::path::PathBuf;
use thiserror::Error;

/// Result type for chute operations
pub type Result<T> = std::result::Result<T, Error>;

/// Chute error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO error without path context
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error on a named file
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unknown frame magic number
    #[error("Unknown magic number: {0:#010x}")]
    UnknownMagic(u32),

    /// Block-size exponent outside the supported range
    #[error("Block-size id {0} exceeds maximum {max}", max = crate::frame::MAX_BLOCK_SIZE_ID)]
    BlockSizeIdOutOfRange(u8),

    /// Declared block size exceeds the frame's nominal block size
    #[error("Declared block size {declared} exceeds nominal block size {nominal}")]
    BlockTooLarge { declared: u32, nominal: u32 },

    /// Unexpected end of input mid-header or mid-block
    #[error("Truncated stream: expected {expected} bytes, got {actual}")]
    Truncated { expected: u64, actual: u64 },

    /// The adapted algorithm reported an internal failure
    #[error("Codec error: {0}")]
    Codec(String),

    /// Regenerated payload does not match the stored stream checksum
    #[error("Checksum mismatch: stored {stored:#08x}, computed {computed:#08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// Destination exists and overwrite was not authorized
    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// Dictionary file exceeds the absolute sanity ceiling
    #[error("Dictionary file too large: {} ({size} bytes)", path.display())]
    DictionaryTooLarge { path: PathBuf, size: u64 },

    /// The streaming codec left part of a staged input chunk unconsumed
    #[error("Streaming codec consumed {consumed} of {fed} staged bytes")]
    InputNotConsumed { fed: usize, consumed: usize },

    /// The streaming codec asked for more bytes than the staging buffer holds
    #[error("Codec requested {requested} bytes, staging capacity is {capacity}")]
    ChunkRequestTooLarge { requested: usize, capacity: usize },
}

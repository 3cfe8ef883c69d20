//! Error types for bagkit
//!
//! Provides a unified error type for all container operations.

use thiserror::Error;

use crate::record::OpCode;

/// Result type alias using BagError
pub type Result<T> = std::result::Result<T, BagError>;

/// Unified error type for bag reading and writing
#[derive(Debug, Error)]
pub enum BagError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported bag version: {0:?}")]
    UnsupportedVersion(String),

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Unexpected opcode: expected {expected} but was {actual}")]
    UnexpectedOpcode { expected: OpCode, actual: OpCode },

    #[error("Unknown opcode: 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("Truncated input: needed {needed} bytes, {available} available")]
    TruncatedInput { needed: usize, available: usize },

    #[error("Bag was never finalized (index position {0})")]
    Unindexed(u64),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Unknown connection id: {0}")]
    UnknownConnection(u32),

    #[error("No chunk at record position {0}")]
    UnknownChunk(u64),

    // -------------------------------------------------------------------------
    // Compression Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    // -------------------------------------------------------------------------
    // Writer Errors
    // -------------------------------------------------------------------------
    #[error("Writer state error: {0}")]
    WriterState(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BagError {
    /// Shorthand for a truncated read of `needed` bytes with `available` left
    pub(crate) fn truncated(needed: usize, available: usize) -> Self {
        BagError::TruncatedInput { needed, available }
    }

    /// Map an I/O error from a positioned read, turning EOF into `TruncatedInput`
    pub(crate) fn from_read(err: std::io::Error, needed: usize) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            BagError::truncated(needed, 0)
        } else {
            BagError::Io(err)
        }
    }
}

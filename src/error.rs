//! Error types for cryptstream

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for cryptstream
#[derive(Error, Debug)]
pub enum Error {
    // Crypto errors
    #[error("Integrity check failed for chunk {chunk}: data corrupted or wrong key")]
    Integrity { chunk: u64 },

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    // Layout errors
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    #[error("Raw length {raw_len} does not describe a valid chunk sequence")]
    MalformedLength { raw_len: u64 },

    // Stream state errors
    #[error("Position {position} out of range (stream size {size})")]
    OutOfRange { position: u64, size: u64 },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Stream is not open")]
    NotOpen,

    #[error("Stream is already open")]
    AlreadyOpen,

    #[error("Stream has been closed and its store released")]
    Closed,

    #[error("Sealing chunk {chunk} failed earlier; the stream can only be closed")]
    WriteFailed { chunk: u64 },

    // Raw store errors
    #[error("Store error: {0}")]
    Store(#[from] io::Error),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// True when the error signals failed authentication of a chunk
    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::Integrity { .. })
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Store(inner) => inner,
            Error::Integrity { .. } | Error::MalformedLength { .. } => {
                io::Error::new(io::ErrorKind::InvalidData, e)
            }
            Error::OutOfRange { .. } => io::Error::new(io::ErrorKind::InvalidInput, e),
            Error::Unsupported(_) => io::Error::new(io::ErrorKind::Unsupported, e),
            other => io::Error::other(other),
        }
    }
}

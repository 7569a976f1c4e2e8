//! Cryptography module for cryptstream
//!
//! Provides per-chunk AES-256-GCM sealing with the chunk index bound as
//! additional authenticated data. Keys are supplied by the caller.

mod encryption;
mod keys;

pub use encryption::{chunk_aad, ChunkCodec, SealedChunk};
pub use keys::StreamKey;

/// Size of AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Framing bytes added to every chunk (nonce + tag)
pub const CHUNK_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

//! cryptstream - Random-access authenticated-encryption byte stream
//!
//! Plaintext is stored as a sequence of independently sealed AES-256-GCM
//! chunks, so any byte range can be read back by decrypting only the chunks
//! it touches. The total plaintext length follows from the raw length alone.

pub mod cache;
pub mod chunk;
pub mod config;
pub mod crypto;
pub mod error;
pub mod store;
pub mod stream;

pub use config::Config;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::chunk::ChunkLayout;
    pub use crate::config::{Config, StreamConfig};
    pub use crate::crypto::StreamKey;
    pub use crate::error::{Error, Result};
    pub use crate::store::{FileStore, MemoryStore, RawStore};
    pub use crate::stream::{ByteStream, EncryptedStream, OpenMode, StreamIo};
}

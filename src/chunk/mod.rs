//! Chunk layout arithmetic
//!
//! Translates between plaintext offsets and raw chunk positions. Nothing
//! here touches key material or the store; the total plaintext length is
//! derived from the raw length alone.

use crate::crypto::CHUNK_OVERHEAD;
use crate::error::{Error, Result};
use std::ops::Range;

/// Default plaintext chunk size: 64 KiB
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Fixed chunk geometry of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    chunk_size: u64,
}

impl ChunkLayout {
    /// Create a layout with the given plaintext chunk size
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize(chunk_size));
        }
        Ok(ChunkLayout {
            chunk_size: chunk_size as u64,
        })
    }

    /// Plaintext bytes per full chunk
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Raw bytes per full chunk (nonce + ciphertext + tag)
    pub fn raw_chunk_size(&self) -> u64 {
        self.chunk_size + CHUNK_OVERHEAD as u64
    }

    /// Index of the chunk holding a plaintext offset
    pub fn chunk_index_of(&self, offset: u64) -> u64 {
        offset / self.chunk_size
    }

    /// Position of a plaintext offset inside its chunk
    pub fn offset_within_chunk(&self, offset: u64) -> u64 {
        offset % self.chunk_size
    }

    /// Plaintext offset where a chunk starts
    pub fn plaintext_offset_of_chunk(&self, index: u64) -> u64 {
        index * self.chunk_size
    }

    /// Raw store offset where a chunk's frame starts
    pub fn raw_offset_of_chunk(&self, index: u64) -> u64 {
        index * self.raw_chunk_size()
    }

    /// Total plaintext length implied by a raw store length.
    ///
    /// A trailing remainder too small to hold a non-empty chunk means the
    /// store was truncated or is not a stream of this layout.
    pub fn total_plaintext_length(&self, raw_len: u64) -> Result<u64> {
        let raw_chunk = self.raw_chunk_size();
        let full = raw_len / raw_chunk;
        let rem = raw_len % raw_chunk;

        if rem == 0 {
            return Ok(full * self.chunk_size);
        }
        if rem <= CHUNK_OVERHEAD as u64 {
            return Err(Error::MalformedLength { raw_len });
        }
        Ok(full * self.chunk_size + (rem - CHUNK_OVERHEAD as u64))
    }

    /// Raw store length needed for a plaintext length
    pub fn raw_length_of(&self, plaintext_len: u64) -> u64 {
        let chunks = self.chunk_count(plaintext_len);
        plaintext_len + chunks * CHUNK_OVERHEAD as u64
    }

    /// Number of chunks holding `plaintext_len` bytes
    pub fn chunk_count(&self, plaintext_len: u64) -> u64 {
        plaintext_len.div_ceil(self.chunk_size)
    }

    /// Plaintext bytes held by chunk `index` of a stream of `total_len` bytes.
    /// Zero when the chunk lies past the end.
    pub fn plaintext_len_of_chunk(&self, index: u64, total_len: u64) -> u64 {
        let start = self.plaintext_offset_of_chunk(index);
        if start >= total_len {
            return 0;
        }
        (total_len - start).min(self.chunk_size)
    }

    /// Raw frame length of chunk `index`, zero past the end
    pub fn raw_len_of_chunk(&self, index: u64, total_len: u64) -> u64 {
        match self.plaintext_len_of_chunk(index, total_len) {
            0 => 0,
            len => len + CHUNK_OVERHEAD as u64,
        }
    }

    /// Chunk indices covering `[offset, offset + len)`, clamped to the stream
    pub fn chunk_span(&self, offset: u64, len: u64, total_len: u64) -> Range<u64> {
        let end = offset.saturating_add(len).min(total_len);
        if offset >= end {
            return 0..0;
        }
        self.chunk_index_of(offset)..self.chunk_index_of(end - 1) + 1
    }
}

impl Default for ChunkLayout {
    fn default() -> Self {
        ChunkLayout {
            chunk_size: DEFAULT_CHUNK_SIZE as u64,
        }
    }
}

//! AES-256-GCM chunk sealing
//!
//! Each chunk is framed on disk as:
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! AAD = chunk_index (8 bytes, big-endian)
//! ```
//!
//! The AAD binds a chunk to its position so chunks cannot be reordered
//! within a stream without failing authentication.

use crate::crypto::{StreamKey, CHUNK_OVERHEAD, NONCE_SIZE, TAG_SIZE};
use crate::error::{Error, Result};
use rand::RngCore;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use tracing::warn;
use zeroize::Zeroizing;

/// One encrypted chunk split into its framing parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedChunk {
    /// Nonce used for this chunk (unique per encryption)
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext, same length as the plaintext chunk
    pub ciphertext: Vec<u8>,
    /// GCM authentication tag
    pub tag: [u8; TAG_SIZE],
}

impl SealedChunk {
    /// Size of the chunk as stored
    pub fn framed_len(&self) -> usize {
        CHUNK_OVERHEAD + self.ciphertext.len()
    }

    /// Serialize to the on-disk frame
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.framed_len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes.extend_from_slice(&self.tag);
        bytes
    }

    /// Parse an on-disk frame. A frame must carry at least one ciphertext byte.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() <= CHUNK_OVERHEAD {
            return Err(Error::MalformedLength {
                raw_len: bytes.len() as u64,
            });
        }

        let (nonce, rest) = bytes.split_at(NONCE_SIZE);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_SIZE);

        let mut sealed = SealedChunk {
            nonce: [0u8; NONCE_SIZE],
            ciphertext: ciphertext.to_vec(),
            tag: [0u8; TAG_SIZE],
        };
        sealed.nonce.copy_from_slice(nonce);
        sealed.tag.copy_from_slice(tag);
        Ok(sealed)
    }
}

/// Build AAD: chunk_index (8 bytes BE)
pub fn chunk_aad(chunk_index: u64) -> [u8; 8] {
    chunk_index.to_be_bytes()
}

/// Seals and opens individual chunks under one key
pub struct ChunkCodec {
    key: LessSafeKey,
}

impl ChunkCodec {
    /// Create a codec bound to a stream key
    pub fn new(key: &StreamKey) -> Result<Self> {
        let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes())
            .map_err(|_| Error::Encryption("Failed to create AES-256-GCM key".to_string()))?;
        Ok(ChunkCodec {
            key: LessSafeKey::new(unbound),
        })
    }

    /// Encrypt one plaintext chunk under a fresh random nonce
    pub fn encrypt(&self, plaintext: &[u8], chunk_index: u64) -> Result<SealedChunk> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.to_vec();
        let tag = self
            .key
            .seal_in_place_separate_tag(nonce, Aad::from(chunk_aad(chunk_index)), &mut in_out)
            .map_err(|_| Error::Encryption(format!("Sealing chunk {} failed", chunk_index)))?;

        let mut tag_bytes = [0u8; TAG_SIZE];
        tag_bytes.copy_from_slice(tag.as_ref());

        Ok(SealedChunk {
            nonce: nonce_bytes,
            ciphertext: in_out,
            tag: tag_bytes,
        })
    }

    /// Decrypt one chunk. Returns nothing but the error on authentication failure.
    pub fn decrypt(
        &self,
        nonce: &[u8; NONCE_SIZE],
        ciphertext: &[u8],
        tag: &[u8; TAG_SIZE],
        chunk_index: u64,
    ) -> Result<Vec<u8>> {
        let nonce = Nonce::assume_unique_for_key(*nonce);

        // ring opens ciphertext || tag in one buffer
        let mut in_out = Zeroizing::new(Vec::with_capacity(ciphertext.len() + TAG_SIZE));
        in_out.extend_from_slice(ciphertext);
        in_out.extend_from_slice(tag);

        match self
            .key
            .open_in_place(nonce, Aad::from(chunk_aad(chunk_index)), &mut in_out)
        {
            Ok(plaintext) => Ok(plaintext.to_vec()),
            Err(_) => {
                warn!("Authentication failed for chunk {}", chunk_index);
                Err(Error::Integrity { chunk: chunk_index })
            }
        }
    }

    /// Decrypt a chunk given as a parsed frame
    pub fn open(&self, sealed: &SealedChunk, chunk_index: u64) -> Result<Vec<u8>> {
        self.decrypt(&sealed.nonce, &sealed.ciphertext, &sealed.tag, chunk_index)
    }
}

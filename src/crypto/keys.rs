//! Stream key handling
//!
//! The key is owned by the caller; this type only keeps it zeroized in
//! memory and offers hex loading for the command line.

use crate::crypto::KEY_SIZE;
use crate::error::{Error, Result};
use rand::RngCore;
use std::path::Path;
use zeroize::Zeroizing;

/// 256-bit stream encryption key
#[derive(Clone)]
pub struct StreamKey {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl StreamKey {
    /// Wrap raw key material
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(Error::InvalidKeyLength {
                expected: KEY_SIZE,
                got: bytes.len(),
            });
        }

        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(bytes);
        Ok(StreamKey { key })
    }

    /// Generate a random key
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        rand::thread_rng().fill_bytes(&mut key[..]);
        StreamKey { key }
    }

    /// Parse a hex-encoded key (surrounding whitespace ignored)
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(encoded.trim())
                .map_err(|e| Error::Serialization(format!("Invalid hex key: {}", e)))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Hex encoding of the key
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.key[..]))
    }

    /// Read a hex key file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = Zeroizing::new(std::fs::read_to_string(path.as_ref())?);
        Self::from_hex(&content)
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl std::fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StreamKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        let key1 = StreamKey::generate();
        let key2 = StreamKey::generate();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_hex_roundtrip() {
        let key = StreamKey::generate();
        let restored = StreamKey::from_hex(&format!("  {}\n", key.to_hex().as_str())).unwrap();
        assert_eq!(key.as_bytes(), restored.as_bytes());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let result = StreamKey::from_bytes(&[0u8; 16]);
        assert!(matches!(
            result,
            Err(Error::InvalidKeyLength {
                expected: 32,
                got: 16
            })
        ));
    }

    #[test]
    fn test_bad_hex_rejected() {
        assert!(StreamKey::from_hex("not hex").is_err());
    }

    #[test]
    fn test_load_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.key");
        let key = StreamKey::generate();
        std::fs::write(&path, key.to_hex().as_bytes()).unwrap();

        let loaded = StreamKey::load(&path).unwrap();
        assert_eq!(loaded.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_debug_hides_material() {
        let key = StreamKey::generate();
        assert_eq!(format!("{:?}", key), "StreamKey(..)");
    }
}

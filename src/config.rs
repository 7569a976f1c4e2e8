//! Configuration management for cryptstream

use crate::cache::DEFAULT_CACHE_CHUNKS;
use crate::chunk::{ChunkLayout, DEFAULT_CHUNK_SIZE};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest accepted plaintext chunk size: 64 MiB
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Stream geometry and caching
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Per-stream settings.
///
/// The chunk size is not recorded in the stream, so readers and writers
/// must use the same value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamConfig {
    /// Plaintext bytes per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Number of decrypted chunks kept in memory per stream
    #[serde(default = "default_cache_chunks")]
    pub cache_chunks: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_cache_chunks() -> usize {
    DEFAULT_CACHE_CHUNKS
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            cache_chunks: DEFAULT_CACHE_CHUNKS,
        }
    }
}

impl StreamConfig {
    /// Chunk layout described by this config
    pub fn layout(&self) -> Result<ChunkLayout> {
        ChunkLayout::new(self.chunk_size)
    }

    /// Validate the stream settings
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig(
                "Chunk size must be greater than 0".to_string(),
            ));
        }

        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::InvalidConfig(format!(
                "Chunk size {} exceeds limit of {} bytes",
                self.chunk_size, MAX_CHUNK_SIZE
            )));
        }

        if self.cache_chunks == 0 {
            return Err(Error::InvalidConfig(
                "At least one chunk must be cacheable".to_string(),
            ));
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from a file, with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Load from a file if it exists, otherwise start from defaults.
    /// Environment overrides apply either way.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            return Self::load(path);
        }

        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(chunk_size) = std::env::var("CRYPTSTREAM_CHUNK_SIZE") {
            if let Ok(size) = chunk_size.trim().parse::<usize>() {
                self.stream.chunk_size = size;
            }
        }

        if let Ok(cache_chunks) = std::env::var("CRYPTSTREAM_CACHE_CHUNKS") {
            if let Ok(count) = cache_chunks.trim().parse::<usize>() {
                self.stream.cache_chunks = count;
            }
        }
    }

    /// Save configuration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.stream.validate()
    }

    /// Default config location (`~/.config/cryptstream/config.json`)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cryptstream")
            .join("config.json")
    }
}

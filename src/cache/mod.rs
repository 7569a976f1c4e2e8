//! Decrypted chunk cache
//!
//! Holds the most recently decrypted chunks of one stream, keyed by chunk
//! index. The stream default is a single slot, enough to serve sequential
//! reads that stay inside one chunk without decrypting it again. Evicted
//! plaintext is zeroized.

use std::collections::VecDeque;
use tracing::debug;
use zeroize::Zeroizing;

/// Default number of decrypted chunks kept per stream
pub const DEFAULT_CACHE_CHUNKS: usize = 1;

/// Small LRU of decrypted chunks (front = oldest)
pub struct ChunkCache {
    capacity: usize,
    entries: VecDeque<(u64, Zeroizing<Vec<u8>>)>,
    hits: u64,
    misses: u64,
}

impl ChunkCache {
    /// Create a cache holding up to `capacity` chunks (at least one)
    pub fn new(capacity: usize) -> Self {
        ChunkCache {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a chunk and mark it most recently used
    pub fn get(&mut self, index: u64) -> Option<&[u8]> {
        match self.entries.iter().position(|(i, _)| *i == index) {
            Some(pos) => {
                self.hits += 1;
                if let Some(entry) = self.entries.remove(pos) {
                    self.entries.push_back(entry);
                }
                self.entries.back().map(|(_, data)| data.as_slice())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Return a cached chunk, or produce it with `fetch` and cache it.
    /// Nothing is cached when `fetch` fails.
    pub fn get_or_try_insert_with<F, E>(&mut self, index: u64, fetch: F) -> Result<&[u8], E>
    where
        F: FnOnce() -> Result<Vec<u8>, E>,
    {
        if self.get(index).is_none() {
            let data = fetch()?;
            self.put(index, data);
        }
        Ok(self
            .entries
            .back()
            .map(|(_, data)| data.as_slice())
            .unwrap_or_default())
    }

    /// Insert a decrypted chunk, evicting the oldest when full
    pub fn put(&mut self, index: u64, data: Vec<u8>) {
        self.entries.retain(|(i, _)| *i != index);
        while self.entries.len() >= self.capacity {
            if let Some((evicted, _)) = self.entries.pop_front() {
                debug!("Evicted chunk {} from cache", evicted);
            }
        }
        self.entries.push_back((index, Zeroizing::new(data)));
    }

    /// Whether a chunk is cached (does not touch LRU order or counters)
    pub fn contains(&self, index: u64) -> bool {
        self.entries.iter().any(|(i, _)| *i == index)
    }

    /// Drop all cached plaintext
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            capacity: self.capacity,
            cached_chunks: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub capacity: usize,
    pub cached_chunks: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

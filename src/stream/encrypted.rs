//! Random-access encrypted stream
//!
//! Plaintext is cut into fixed-size chunks, each sealed independently with
//! AES-256-GCM and appended to a raw store. Reads decrypt only the chunks a
//! request touches. All state lives behind one mutex per instance.

use crate::cache::{CacheStats, ChunkCache};
use crate::chunk::ChunkLayout;
use crate::config::StreamConfig;
use crate::crypto::{ChunkCodec, SealedChunk, StreamKey};
use crate::error::{Error, Result};
use crate::store::RawStore;
use crate::stream::{ByteStream, OpenMode};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

enum State {
    /// Not open (either never opened or already closed)
    Idle,
    Reading {
        pos: u64,
        total_len: u64,
    },
    Writing {
        buffer: Zeroizing<Vec<u8>>,
        next_index: u64,
        written: u64,
    },
    /// A chunk could not be stored; nothing more is sealed
    Failed {
        chunk: u64,
        stored: u64,
    },
}

struct Inner<S> {
    /// None once the raw handle has been released
    store: Option<S>,
    state: State,
    cache: ChunkCache,
}

/// Encrypting/decrypting byte stream over a raw store
pub struct EncryptedStream<S: RawStore> {
    codec: ChunkCodec,
    layout: ChunkLayout,
    inner: Mutex<Inner<S>>,
}

fn not_open<S>(store: &Option<S>) -> Error {
    if store.is_some() {
        Error::NotOpen
    } else {
        Error::Closed
    }
}

impl<S: RawStore> EncryptedStream<S> {
    /// Create a stream with 64 KiB chunks and a single-chunk cache
    pub fn new(key: &StreamKey, store: S) -> Result<Self> {
        Self::with_config(key, store, &StreamConfig::default())
    }

    /// Create a stream with explicit settings
    pub fn with_config(key: &StreamKey, store: S, config: &StreamConfig) -> Result<Self> {
        config.validate()?;

        Ok(EncryptedStream {
            codec: ChunkCodec::new(key)?,
            layout: config.layout()?,
            inner: Mutex::new(Inner {
                store: Some(store),
                state: State::Idle,
                cache: ChunkCache::new(config.cache_chunks),
            }),
        })
    }

    /// Chunk geometry of this stream
    pub fn layout(&self) -> ChunkLayout {
        self.layout
    }

    /// Mode the stream is currently open in
    pub fn mode(&self) -> Option<OpenMode> {
        match self.inner.lock().state {
            State::Idle => None,
            State::Reading { .. } => Some(OpenMode::Read),
            State::Writing { .. } | State::Failed { .. } => Some(OpenMode::Write),
        }
    }

    /// Decrypted chunk cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.lock().cache.stats()
    }

    /// Authenticate every chunk without returning plaintext.
    /// Returns the number of chunks checked.
    pub fn verify(&self) -> Result<u64> {
        let mut guard = self.inner.lock();
        let Inner { store, state, .. } = &mut *guard;

        let total_len = match state {
            State::Reading { total_len, .. } => *total_len,
            State::Writing { .. } | State::Failed { .. } => {
                return Err(Error::Unsupported(
                    "verify on a write-mode stream".to_string(),
                ))
            }
            State::Idle => return Err(not_open(store)),
        };
        let store = store.as_mut().ok_or(Error::Closed)?;

        let chunks = self.layout.chunk_count(total_len);
        for index in 0..chunks {
            // Plaintext is dropped (and zeroized) immediately
            drop(Zeroizing::new(self.decrypt_chunk(store, index, total_len)?));
        }

        info!("Verified {} chunks ({} bytes)", chunks, total_len);
        Ok(chunks)
    }

    /// Fetch one chunk frame from the store and open it
    fn decrypt_chunk(&self, store: &mut S, index: u64, total_len: u64) -> Result<Vec<u8>> {
        let raw_offset = self.layout.raw_offset_of_chunk(index);
        let raw_len = self.layout.raw_len_of_chunk(index, total_len);

        debug!("Fetching chunk {} ({} raw bytes at {})", index, raw_len, raw_offset);

        let frame = store.read_at(raw_offset, raw_len as usize)?;
        let sealed = SealedChunk::from_bytes(&frame)?;
        self.codec.open(&sealed, index)
    }

    /// Seal one plaintext chunk and append it to the store
    fn seal_chunk(&self, store: &mut S, plaintext: &[u8], index: u64) -> Result<()> {
        let sealed = self.codec.encrypt(plaintext, index)?;
        store.append(&sealed.to_bytes())?;

        debug!("Sealed chunk {} ({} bytes)", index, plaintext.len());
        Ok(())
    }
}

impl<S: RawStore> ByteStream for EncryptedStream<S> {
    fn open(&self, mode: OpenMode) -> Result<()> {
        let mut guard = self.inner.lock();
        let Inner {
            store,
            state,
            cache,
        } = &mut *guard;

        let store = store.as_mut().ok_or(Error::Closed)?;
        if !matches!(state, State::Idle) {
            return Err(Error::AlreadyOpen);
        }

        match mode {
            OpenMode::Read => {
                let raw_len = store.size()?;
                let total_len = self.layout.total_plaintext_length(raw_len)?;
                cache.clear();
                *state = State::Reading { pos: 0, total_len };

                info!(
                    "Opened for reading: {} bytes in {} chunks",
                    total_len,
                    self.layout.chunk_count(total_len)
                );
            }
            OpenMode::Write => {
                store.truncate(0)?;
                *state = State::Writing {
                    buffer: Zeroizing::new(Vec::with_capacity(self.layout.chunk_size() as usize)),
                    next_index: 0,
                    written: 0,
                };

                info!("Opened for writing");
            }
        }

        Ok(())
    }

    fn read(&self, n: usize) -> Result<Vec<u8>> {
        let mut guard = self.inner.lock();
        let Inner {
            store,
            state,
            cache,
        } = &mut *guard;

        let (pos, total_len) = match state {
            State::Reading { pos, total_len } => (pos, *total_len),
            State::Writing { .. } | State::Failed { .. } => {
                return Err(Error::Unsupported(
                    "read on a write-mode stream".to_string(),
                ))
            }
            State::Idle => return Err(not_open(store)),
        };
        let store = store.as_mut().ok_or(Error::Closed)?;

        let start = *pos;
        let end = start.saturating_add(n as u64).min(total_len);
        if start >= end {
            return Ok(Vec::new());
        }

        // Nothing leaves this buffer unless every touched chunk authenticates
        let mut out = Zeroizing::new(Vec::with_capacity((end - start) as usize));
        for index in self.layout.chunk_span(start, end - start, total_len) {
            let chunk = cache
                .get_or_try_insert_with(index, || self.decrypt_chunk(&mut *store, index, total_len))?;

            let chunk_start = self.layout.plaintext_offset_of_chunk(index);
            let from = (start.max(chunk_start) - chunk_start) as usize;
            let to = (end.min(chunk_start + chunk.len() as u64) - chunk_start) as usize;
            out.extend_from_slice(&chunk[from..to]);
        }

        *pos = end;
        Ok(std::mem::take(&mut *out))
    }

    fn write(&self, bytes: &[u8]) -> Result<usize> {
        let mut guard = self.inner.lock();
        let Inner { store, state, .. } = &mut *guard;

        let (buffer, next_index, written) = match &mut *state {
            State::Writing {
                buffer,
                next_index,
                written,
            } => (buffer, next_index, written),
            State::Failed { chunk, .. } => return Err(Error::WriteFailed { chunk: *chunk }),
            State::Reading { .. } => {
                return Err(Error::Unsupported(
                    "write on a read-mode stream".to_string(),
                ))
            }
            State::Idle => return Err(not_open(store)),
        };
        let store = store.as_mut().ok_or(Error::Closed)?;

        let chunk_size = self.layout.chunk_size() as usize;
        let mut remaining = bytes;
        let mut failure = None;
        while !remaining.is_empty() {
            let take = (chunk_size - buffer.len()).min(remaining.len());
            buffer.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            *written += take as u64;

            if buffer.len() == chunk_size {
                if let Err(e) = self.seal_chunk(store, &buffer[..], *next_index) {
                    failure = Some((*next_index, e));
                    break;
                }
                *next_index += 1;
                buffer.clear();
            }
        }

        if let Some((chunk, e)) = failure {
            // The store may now end in a torn frame; nothing is sealed after it
            let stored = self.layout.plaintext_offset_of_chunk(chunk);
            warn!(
                "Sealing chunk {} failed, {} bytes stored: {}",
                chunk, stored, e
            );
            *state = State::Failed { chunk, stored };
            return Err(e);
        }

        Ok(bytes.len())
    }

    fn seek(&self, target: u64) -> Result<u64> {
        let mut guard = self.inner.lock();
        let Inner { store, state, .. } = &mut *guard;

        match state {
            State::Reading { pos, total_len } => {
                if target > *total_len {
                    return Err(Error::OutOfRange {
                        position: target,
                        size: *total_len,
                    });
                }
                *pos = target;
                Ok(target)
            }
            // Write mode is append-only: only the current end is reachable
            State::Writing { written, .. } => {
                if target != *written {
                    return Err(Error::Unsupported(format!(
                        "seek to {} in write mode (position {})",
                        target, written
                    )));
                }
                Ok(target)
            }
            State::Failed { chunk, .. } => Err(Error::WriteFailed { chunk: *chunk }),
            State::Idle => Err(not_open(store)),
        }
    }

    fn position(&self) -> Result<u64> {
        let guard = self.inner.lock();
        match &guard.state {
            State::Reading { pos, .. } => Ok(*pos),
            State::Writing { written, .. } => Ok(*written),
            State::Failed { stored, .. } => Ok(*stored),
            State::Idle => Err(not_open(&guard.store)),
        }
    }

    fn size(&self) -> Result<u64> {
        let guard = self.inner.lock();
        match &guard.state {
            State::Reading { total_len, .. } => Ok(*total_len),
            State::Writing { written, .. } => Ok(*written),
            State::Failed { stored, .. } => Ok(*stored),
            State::Idle => Err(not_open(&guard.store)),
        }
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let Inner {
            store,
            state,
            cache,
        } = &mut *guard;

        let mut raw = match store.take() {
            Some(raw) => raw,
            None => return Ok(()),
        };

        let finalized = match std::mem::replace(state, State::Idle) {
            State::Writing {
                buffer,
                next_index,
                written,
            } => {
                let sealed = if buffer.is_empty() {
                    Ok(())
                } else {
                    self.seal_chunk(&mut raw, &buffer[..], next_index)
                };
                if sealed.is_ok() {
                    info!(
                        "Closed after writing {} bytes in {} chunks",
                        written,
                        self.layout.chunk_count(written)
                    );
                }
                sealed
            }
            State::Failed { chunk, .. } => Err(Error::WriteFailed { chunk }),
            State::Reading { .. } | State::Idle => Ok(()),
        };
        cache.clear();

        // Release the handle even when the final chunk failed
        let released = raw.close();
        finalized?;
        released?;
        Ok(())
    }
}

impl<S: RawStore> Drop for EncryptedStream<S> {
    fn drop(&mut self) {
        if let State::Writing {
            buffer, written, ..
        } = &self.inner.get_mut().state
        {
            warn!(
                "Write-mode stream dropped without close: {} of {} bytes never sealed",
                buffer.len(),
                written
            );
        }
    }
}

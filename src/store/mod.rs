//! Raw byte stores
//!
//! The encrypted stream persists ciphertext through the `RawStore` trait.
//! Retry or blocking policy belongs to implementations; the stream passes
//! their errors through unchanged.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Random-access byte store holding raw chunk frames
pub trait RawStore: Send {
    /// Read exactly `len` bytes starting at `offset`
    fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>>;

    /// Append bytes at the end of the store
    fn append(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Shrink or extend the store to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Current length in bytes
    fn size(&mut self) -> io::Result<u64>;

    /// Flush and release the underlying handle
    fn close(&mut self) -> io::Result<()>;
}

fn released() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "store handle released")
}

/// Store backed by a plain file
pub struct FileStore {
    path: PathBuf,
    file: Option<File>,
    writable: bool,
}

impl FileStore {
    /// Open an existing file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(FileStore {
            path: path.as_ref().to_path_buf(),
            file: Some(file),
            writable: false,
        })
    }

    /// Create (or truncate) a file for writing
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        Ok(FileStore {
            path: path.as_ref().to_path_buf(),
            file: Some(file),
            writable: true,
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file.as_mut().ok_or_else(released)
    }
}

impl RawStore for FileStore {
    fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let file = self.file()?;
        let mut buffer = vec![0u8; len];

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            file.read_exact_at(&mut buffer, offset)?;
        }

        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buffer)?;
        }

        Ok(buffer)
    }

    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        use std::io::{Seek, SeekFrom};
        let file = self.file()?;
        file.seek(SeekFrom::End(0))?;
        file.write_all(bytes)
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.file()?.set_len(len)
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            if self.writable {
                file.flush()?;
                file.sync_all()?;
            }
            debug!("Released store {}", self.path.display());
        }
        Ok(())
    }
}

#[derive(Default)]
struct MemoryInner {
    bytes: Vec<u8>,
    reads: Vec<(u64, usize)>,
    closed: bool,
}

/// In-memory store. Clones share the same buffer, so a caller can keep a
/// handle to inspect or alter the bytes after the stream releases its own.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding existing raw bytes
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        let store = Self::default();
        store.inner.lock().bytes = bytes;
        store
    }

    /// Copy of the current contents
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().bytes.clone()
    }

    /// Apply a change to the raw bytes in place
    pub fn modify<F: FnOnce(&mut Vec<u8>)>(&self, f: F) {
        f(&mut self.inner.lock().bytes);
    }

    /// `(offset, len)` of every `read_at` served so far
    pub fn reads(&self) -> Vec<(u64, usize)> {
        self.inner.lock().reads.clone()
    }

    /// Whether any handle has closed this store
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl RawStore for MemoryStore {
    fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset too large"))?;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= inner.bytes.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of store"))?;

        let data = inner.bytes[start..end].to_vec();
        inner.reads.push((offset, len));
        Ok(data)
    }

    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.lock().bytes.extend_from_slice(bytes);
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length too large"))?;
        self.inner.lock().bytes.resize(len, 0);
        Ok(())
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.inner.lock().bytes.len() as u64)
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_basic() {
        let mut store = MemoryStore::new();

        store.append(b"hello ").unwrap();
        store.append(b"world").unwrap();

        assert_eq!(store.size().unwrap(), 11);
        assert_eq!(store.read_at(6, 5).unwrap(), b"world");
        assert_eq!(store.reads(), vec![(6, 5)]);
    }

    #[test]
    fn test_memory_store_read_past_end() {
        let mut store = MemoryStore::with_bytes(vec![1, 2, 3]);
        let err = store.read_at(2, 5).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_memory_store_clones_share_bytes() {
        let mut store = MemoryStore::new();
        let observer = store.clone();

        store.append(b"abc").unwrap();
        store.truncate(1).unwrap();
        store.close().unwrap();

        assert_eq!(observer.contents(), b"a");
        assert!(observer.is_closed());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.bin");

        let mut writer = FileStore::create(&path).unwrap();
        writer.append(b"0123456789").unwrap();
        writer.truncate(8).unwrap();
        assert_eq!(writer.size().unwrap(), 8);
        writer.close().unwrap();

        let mut reader = FileStore::open(&path).unwrap();
        assert_eq!(reader.path(), path.as_path());
        assert_eq!(reader.read_at(2, 4).unwrap(), b"2345");
        assert!(reader.read_at(6, 4).is_err());
        reader.close().unwrap();

        let err = reader.size().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}

//! Byte stream capability and the encrypted implementation
//!
//! `ByteStream` is the minimal surface a playback or transfer adapter binds
//! to. It takes `&self` so one instance can be shared between the context
//! that opens and closes it and the context servicing I/O.

mod encrypted;
mod io;

pub use encrypted::EncryptedStream;
pub use io::StreamIo;

use crate::error::Result;
use std::sync::Arc;

/// Mode a stream is opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Random-access reads over existing ciphertext
    Read,
    /// Sequential append of new plaintext
    Write,
}

/// Sequential/random-access byte stream
pub trait ByteStream {
    /// Open the stream in the given mode
    fn open(&self, mode: OpenMode) -> Result<()>;

    /// Read up to `n` bytes from the current position.
    /// Returns fewer bytes (possibly none) at end of stream.
    fn read(&self, n: usize) -> Result<Vec<u8>>;

    /// Write bytes at the current position, returning how many were accepted
    fn write(&self, bytes: &[u8]) -> Result<usize>;

    /// Move to an absolute position
    fn seek(&self, pos: u64) -> Result<u64>;

    /// Current position in bytes
    fn position(&self) -> Result<u64>;

    /// Total length in bytes
    fn size(&self) -> Result<u64>;

    /// Finalize pending data and release the underlying handle
    fn close(&self) -> Result<()>;
}

impl<T: ByteStream + ?Sized> ByteStream for &T {
    fn open(&self, mode: OpenMode) -> Result<()> {
        (**self).open(mode)
    }

    fn read(&self, n: usize) -> Result<Vec<u8>> {
        (**self).read(n)
    }

    fn write(&self, bytes: &[u8]) -> Result<usize> {
        (**self).write(bytes)
    }

    fn seek(&self, pos: u64) -> Result<u64> {
        (**self).seek(pos)
    }

    fn position(&self) -> Result<u64> {
        (**self).position()
    }

    fn size(&self) -> Result<u64> {
        (**self).size()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

impl<T: ByteStream + ?Sized> ByteStream for Arc<T> {
    fn open(&self, mode: OpenMode) -> Result<()> {
        (**self).open(mode)
    }

    fn read(&self, n: usize) -> Result<Vec<u8>> {
        (**self).read(n)
    }

    fn write(&self, bytes: &[u8]) -> Result<usize> {
        (**self).write(bytes)
    }

    fn seek(&self, pos: u64) -> Result<u64> {
        (**self).seek(pos)
    }

    fn position(&self) -> Result<u64> {
        (**self).position()
    }

    fn size(&self) -> Result<u64> {
        (**self).size()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

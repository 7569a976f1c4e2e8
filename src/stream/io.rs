//! `std::io` adapter for any `ByteStream`

use crate::stream::ByteStream;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Exposes a `ByteStream` through `Read`, `Write` and `Seek`, so it can be
/// handed to code that only knows the standard I/O traits.
pub struct StreamIo<S: ByteStream> {
    stream: S,
}

impl<S: ByteStream> StreamIo<S> {
    /// Wrap an already opened stream
    pub fn new(stream: S) -> Self {
        StreamIo { stream }
    }

    /// Borrow the wrapped stream
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Unwrap the adapter
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: ByteStream> Read for StreamIo<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.stream.read(buf.len())?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl<S: ByteStream> Write for StreamIo<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.stream.write(buf)?)
    }

    /// Partial chunks are only sealed on close; flushing has nothing to do
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: ByteStream> Seek for StreamIo<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.stream.size()?.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.stream.position()?.checked_add_signed(delta),
        };

        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )
        })?;

        Ok(self.stream.seek(target)?)
    }
}

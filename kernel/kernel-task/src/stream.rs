//! Fixed-capacity byte streams.
//!
//! Every process carries three of these (stdin, stdout, stderr) as its
//! I/O boundary towards driver and shell code. The contract is small:
//! bytes come out in the order they went in, and a full stream rejects
//! writes instead of overwriting unread data.

use kernel_layout::memory::STREAM_CAPACITY;
use thiserror::Error;

#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The stream holds `STREAM_CAPACITY` unread bytes; the writer must
    /// wait for a reader.
    #[error("stream is full")]
    Full,
}

/// Bounded FIFO ring buffer of bytes.
pub struct Stream {
    buf: [u8; STREAM_CAPACITY],
    /// Index of the oldest unread byte.
    head: usize,
    /// Unread bytes currently buffered.
    len: usize,
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: [0; STREAM_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    /// Append one byte.
    ///
    /// # Errors
    /// `Full` when the buffer already holds `STREAM_CAPACITY` unread
    /// bytes; nothing is overwritten.
    pub fn write(&mut self, byte: u8) -> Result<(), StreamError> {
        if self.len == STREAM_CAPACITY {
            return Err(StreamError::Full);
        }
        let tail = (self.head + self.len) % STREAM_CAPACITY;
        self.buf[tail] = byte;
        self.len += 1;
        Ok(())
    }

    /// Append as much of `bytes` as fits, returning how many were taken.
    pub fn write_some(&mut self, bytes: &[u8]) -> usize {
        let mut written = 0;
        for &b in bytes {
            if self.write(b).is_err() {
                break;
            }
            written += 1;
        }
        written
    }

    /// Pop the oldest unread byte.
    pub fn read(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.buf[self.head];
        self.head = (self.head + 1) % STREAM_CAPACITY;
        self.len -= 1;
        Some(byte)
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len == STREAM_CAPACITY
    }
}

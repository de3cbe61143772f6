use bytes::{Buf, BytesMut};
use std::{cmp, io};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::Config;
use crate::error::{Error, FramingError};

/// Smallest spare capacity requested from the look-ahead buffer before reading a line.
const MIN_READ: usize = 64;

/// Line oriented reader over a byte source.
///
/// Lines are accumulated in a look-ahead buffer, bytes read past the end of a line stay there
/// and are handed out first by [`read_bytes`][LineReader::read_bytes]. A second fixed capacity
/// buffer is reused by body copies so a copy never allocates per call.
///
/// One reader is expected to live as long as the connection it wraps.
pub struct LineReader<R> {
    io: R,
    lookahead: BytesMut,
    scratch: Box<[u8]>,
    max_line_len: usize,
}

impl<R> LineReader<R> {
    /// Create reader with default [`Config`].
    pub fn new(io: R) -> Self {
        Self::with_config(io, &Config::default())
    }

    pub fn with_config(io: R, config: &Config) -> Self {
        let capacity = config.get_buffer_size();
        Self {
            io,
            lookahead: BytesMut::with_capacity(capacity),
            scratch: vec![0; capacity].into_boxed_slice(),
            max_line_len: config.get_max_line_len(),
        }
    }

    /// Capacity of the reusable copy buffer.
    pub fn buffer_capacity(&self) -> usize {
        self.scratch.len()
    }

    /// Bytes read from the source but not yet consumed.
    pub fn buffered(&self) -> &[u8] {
        &self.lookahead
    }

    pub fn get_ref(&self) -> &R {
        &self.io
    }

    /// Returns the underlying source.
    ///
    /// Reading from it directly skips any [`buffered`][LineReader::buffered] bytes.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.io
    }

    pub fn into_inner(self) -> R {
        self.io
    }

    /// Take every buffered byte.
    pub(crate) fn take_buffered(&mut self) -> BytesMut {
        self.lookahead.split()
    }

    fn reserve(&mut self) {
        // `reserve` reclaims the original allocation once the previously split lines are
        // dropped, otherwise it allocates
        let additional = cmp::max(self.scratch.len().saturating_sub(self.lookahead.len()), MIN_READ);
        self.lookahead.reserve(additional);
    }
}

impl<R> LineReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Read a single line, excluding the line terminator.
    ///
    /// Lines are terminated by `\n`, a preceding `\r` is stripped. Returns `None` if the source
    /// is exhausted and no bytes are pending.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::UnterminatedLine`] if the source ends with a partial line, and
    /// [`FramingError::LineTooLong`] if no terminator is found within the configured limit.
    pub async fn read_line(&mut self) -> Result<Option<BytesMut>, Error> {
        let mut searched = 0;

        loop {
            if let Some(pos) = memchr::memchr(b'\n', &self.lookahead[searched..]) {
                let end = searched + pos;
                let len = match end.checked_sub(1) {
                    Some(cr) if self.lookahead[cr] == b'\r' => cr,
                    _ => end,
                };
                if len > self.max_line_len {
                    return Err(FramingError::LineTooLong(self.max_line_len).into());
                }

                let mut line = self.lookahead.split_to(end + 1);
                line.truncate(len);
                return Ok(Some(line));
            }

            searched = self.lookahead.len();
            // one extra byte for a pending '\r'
            if searched > self.max_line_len.saturating_add(1) {
                return Err(FramingError::LineTooLong(self.max_line_len).into());
            }

            self.reserve();
            let read = self.io.read_buf(&mut self.lookahead).await.map_err(Error::Read)?;
            if read == 0 {
                return match self.lookahead.is_empty() {
                    true => Ok(None),
                    false => Err(FramingError::UnterminatedLine.into()),
                };
            }
        }
    }

    /// Fill `dst` with buffered bytes first, then directly from the source.
    ///
    /// Returns less than `dst.len()` only when the source is exhausted.
    pub async fn read_bytes(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        fill(&mut self.io, &mut self.lookahead, dst).await
    }

    /// Fill up to `count` bytes into the reusable buffer and return them.
    ///
    /// `count` is capped by [`buffer_capacity`][LineReader::buffer_capacity]. The returned
    /// slice is empty only when the source is exhausted.
    pub async fn read_buffered(&mut self, count: usize) -> io::Result<&[u8]> {
        let count = cmp::min(count, self.scratch.len());
        let dst = &mut self.scratch[..count];
        let read = fill(&mut self.io, &mut self.lookahead, dst).await?;
        Ok(&self.scratch[..read])
    }
}

async fn fill<R>(io: &mut R, lookahead: &mut BytesMut, dst: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = cmp::min(dst.len(), lookahead.len());
    dst[..filled].copy_from_slice(&lookahead[..filled]);
    lookahead.advance(filled);

    while filled < dst.len() {
        let read = io.read(&mut dst[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }

    Ok(filled)
}

impl<R> std::fmt::Debug for LineReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("LineReader")
            .field("buffered", &self.lookahead.len())
            .field("capacity", &self.scratch.len())
            .finish_non_exhaustive()
    }
}

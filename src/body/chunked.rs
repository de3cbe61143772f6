use bytes::BytesMut;
use std::num::NonZeroU64;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Error, FramingError};
use crate::io::LineReader;
use crate::log::{debug, trace};
use crate::transfer::Transfer;

const MAX_SIZE_DIGITS: usize = (u64::BITS / 4) as usize;

/// Decode a chunked body from `reader` into `sink`, returns the decoded body length.
///
/// Shorthand for [`Transfer::decode_chunked`] without observer or cancellation.
pub async fn decode_chunked<R, W>(reader: &mut LineReader<R>, sink: &mut W) -> Result<u64, Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    Transfer::new().decode_chunked(reader, sink).await
}

/// Parse a chunk size line.
///
/// The size is the leading run of hex digits, surrounding spaces are tolerated. Anything after
/// the digits, usually a `;` chunk extension, is ignored without validation.
///
/// ```
/// use ferry::body::parse_chunk_size;
///
/// assert_eq!(parse_chunk_size(b"1a"), Ok(26));
/// assert_eq!(parse_chunk_size(b"1A;name=value"), Ok(26));
/// assert!(parse_chunk_size(b"zz").is_err());
/// ```
pub fn parse_chunk_size(line: &[u8]) -> Result<u64, FramingError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Err(FramingError::EmptySizeLine);
    }

    let digits = line
        .iter()
        .position(|e| !e.is_ascii_hexdigit())
        .unwrap_or(line.len());
    if digits == 0 {
        return Err(FramingError::InvalidSizeLine);
    }

    // leading zeros do not count toward the width of `u64`
    let digits = &line[..digits];
    let Some(start) = digits.iter().position(|&e| e != b'0') else {
        return Ok(0);
    };
    if digits.len() - start > MAX_SIZE_DIGITS {
        return Err(FramingError::ChunkTooLarge);
    }

    let digits = std::str::from_utf8(&digits[start..]).map_err(|_| FramingError::InvalidSizeLine)?;
    u64::from_str_radix(digits, 16).map_err(|_| FramingError::InvalidSizeLine)
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    Size,
    Payload(NonZeroU64),
    Trailer { last: bool },
    Done,
}

impl Transfer<'_> {
    /// Decode a chunked body from `reader` into `sink`, returns the decoded body length.
    ///
    /// Each chunk consumes its size line, its payload, and exactly one more line after the
    /// payload. The zero size chunk ends the body after its own trailing line is consumed, no
    /// further bytes are read. Trailer fields, if any, are left to the caller. The observer sees
    /// decoded payload bytes only.
    ///
    /// # Errors
    ///
    /// [`Error::Framing`] for a malformed size line, [`Error::Truncated`] if the source ends
    /// inside a chunk or before a size or trailing line.
    pub async fn decode_chunked<R, W>(
        &mut self,
        reader: &mut LineReader<R>,
        sink: &mut W,
    ) -> Result<u64, Error>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut phase = Phase::Size;
        let mut decoded = 0u64;

        loop {
            phase = match phase {
                Phase::Size => {
                    self.checkpoint()?;
                    let line = next_line(reader).await?;
                    let size = parse_chunk_size(&line).inspect_err(|_| {
                        debug!("malformed chunk size line ({} bytes)", line.len());
                    })?;
                    match NonZeroU64::new(size) {
                        Some(size) => Phase::Payload(size),
                        None => Phase::Trailer { last: true },
                    }
                }
                Phase::Payload(size) => {
                    self.copy_bounded(reader, sink, size.get()).await?;
                    decoded += size.get();
                    Phase::Trailer { last: false }
                }
                Phase::Trailer { last } => {
                    self.checkpoint()?;
                    let trailer = next_line(reader).await?;
                    if !trailer.is_empty() {
                        trace!("ignoring {} bytes after chunk", trailer.len());
                    }
                    match last {
                        true => Phase::Done,
                        false => Phase::Size,
                    }
                }
                Phase::Done => return Ok(decoded),
            };
        }
    }
}

/// Read a line where end of stream means the body is truncated.
async fn next_line<R>(reader: &mut LineReader<R>) -> Result<BytesMut, Error>
where
    R: AsyncRead + Unpin,
{
    match reader.read_line().await {
        Ok(Some(line)) => Ok(line),
        Ok(None) | Err(Error::Framing(FramingError::UnterminatedLine)) => Err(Error::Truncated),
        Err(err) => Err(err),
    }
}

//! HTTP message body framing.
//!
//! The header layer decides how a message body is delimited and hands the decision over as a
//! [`Coding`]. Everything here only moves body bytes.
//!
//! - [`copy_body`] copy a body in the given [`Coding`]
//! - [`copy_bounded`] body with a known length
//! - [`decode_chunked`] body in chunked transfer coding
//! - [`ChunkedEncoder`], [`encode_chunk`] chunked transfer coding, encode direction
mod bounded;
mod chunked;
mod encoder;

pub use bounded::copy_bounded;
pub use chunked::{decode_chunked, parse_chunk_size};
pub use encoder::{ChunkedEncoder, LAST_CHUNK, encode_chunk, encode_last};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::Error;
use crate::io::LineReader;
use crate::transfer::Transfer;

/// How a message body is delimited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coding {
    /// Exactly `n` bytes.
    ContentLength(u64),
    /// Chunked transfer coding.
    Chunked,
    /// Everything until the peer closes the connection.
    UntilClose,
}

impl Coding {
    pub const fn is_chunked(&self) -> bool {
        matches!(self, Self::Chunked)
    }
}

/// Copy a message body from `reader` to `sink`, returns the number of body bytes written.
///
/// Shorthand for [`Transfer::copy_body`] without observer or cancellation.
pub async fn copy_body<R, W>(
    reader: &mut LineReader<R>,
    sink: &mut W,
    coding: Coding,
) -> Result<u64, Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    Transfer::new().copy_body(reader, sink, coding).await
}

impl Transfer<'_> {
    /// Copy a message body from `reader` to `sink`, returns the number of body bytes written.
    ///
    /// Chunked bodies are written decoded. The sink is flushed once the body is complete.
    pub async fn copy_body<R, W>(
        &mut self,
        reader: &mut LineReader<R>,
        sink: &mut W,
        coding: Coding,
    ) -> Result<u64, Error>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let copied = match coding {
            Coding::ContentLength(len) => {
                self.copy_bounded(reader, sink, len).await?;
                len
            }
            Coding::Chunked => self.decode_chunked(reader, sink).await?,
            Coding::UntilClose => self.copy_until_close(reader, sink).await?,
        };
        sink.flush().await.map_err(Error::Write)?;
        Ok(copied)
    }

    async fn copy_until_close<R, W>(
        &mut self,
        reader: &mut LineReader<R>,
        sink: &mut W,
    ) -> Result<u64, Error>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let buffered = reader.take_buffered();
        if !buffered.is_empty() {
            self.checkpoint()?;
            self.write(sink, &buffered).await?;
        }

        let buffer_size = reader.buffer_capacity();
        let relayed = self.relay(reader.get_mut(), sink, buffer_size).await?;
        Ok(buffered.len() as u64 + relayed)
    }
}

#[cfg(test)]
mod test {
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test]
    async fn test_copy_content_length() {
        let mut reader = LineReader::new(&b"hello worldNEXT"[..]);
        let mut sink = Vec::new();

        let copied = copy_body(&mut reader, &mut sink, Coding::ContentLength(11)).await.unwrap();
        assert_eq!(copied, 11);
        assert_eq!(sink, b"hello world");

        let mut rest = [0u8; 8];
        assert_eq!(reader.read_bytes(&mut rest).await.unwrap(), 4);
        assert_eq!(&rest[..4], b"NEXT");
    }

    #[tokio::test]
    async fn test_copy_chunked() {
        let mut reader = LineReader::new(&b"3\r\nabc\r\n0\r\n\r\n"[..]);
        let mut sink = Vec::new();

        let copied = copy_body(&mut reader, &mut sink, Coding::Chunked).await.unwrap();
        assert_eq!(copied, 3);
        assert_eq!(sink, b"abc");
    }

    #[tokio::test]
    async fn test_copy_until_close_drains_lookahead() {
        let io = Builder::new()
            .read(b"HTTP/1.0 200 OK\r\nbody ")
            .read(b"until ")
            .read(b"close")
            .build();
        let mut reader = LineReader::new(io);
        let mut sink = Vec::new();
        let mut seen = Vec::new();
        let mut observer = |bytes: &[u8]| seen.extend_from_slice(bytes);

        assert_eq!(reader.read_line().await.unwrap().unwrap(), &b"HTTP/1.0 200 OK"[..]);

        let copied = Transfer::new()
            .observe(&mut observer)
            .copy_body(&mut reader, &mut sink, Coding::UntilClose)
            .await
            .unwrap();

        assert_eq!(copied, 16);
        assert_eq!(sink, b"body until close");
        assert_eq!(seen, sink);
    }

    #[tokio::test]
    async fn test_copy_empty_length() {
        let mut reader = LineReader::new(&b""[..]);
        let mut sink = Vec::new();

        assert_eq!(copy_body(&mut reader, &mut sink, Coding::ContentLength(0)).await.unwrap(), 0);
        assert!(sink.is_empty());
        assert!(!Coding::ContentLength(0).is_chunked());
    }
}

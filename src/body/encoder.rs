use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Error;

const CRLF: &[u8; 2] = b"\r\n";

/// The terminal zero size chunk including its trailing line.
pub const LAST_CHUNK: &[u8; 5] = b"0\r\n\r\n";

/// Encode a single chunk into `dst`.
///
/// An empty `chunk` encodes nothing, a zero size chunk would terminate the body.
///
/// ```
/// let mut dst = bytes::BytesMut::new();
/// ferry::body::encode_chunk(b"Wikipedia", &mut dst);
/// ferry::body::encode_last(&mut dst);
/// assert_eq!(&dst[..], b"9\r\nWikipedia\r\n0\r\n\r\n");
/// ```
pub fn encode_chunk(chunk: &[u8], dst: &mut BytesMut) {
    if chunk.is_empty() {
        return;
    }
    put_size_line(dst, chunk.len() as u64);
    dst.put_slice(chunk);
    dst.put_slice(CRLF);
}

/// Encode the terminal chunk into `dst`.
pub fn encode_last(dst: &mut BytesMut) {
    dst.put_slice(LAST_CHUNK);
}

fn put_size_line(dst: &mut BytesMut, size: u64) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut digits = [0u8; 16];
    let mut at = digits.len();
    let mut size = size;
    loop {
        at -= 1;
        digits[at] = HEX[(size & 0xF) as usize];
        size >>= 4;
        if size == 0 {
            break;
        }
    }

    dst.reserve(digits.len() - at + CRLF.len());
    dst.put_slice(&digits[at..]);
    dst.put_slice(CRLF);
}

/// Chunked transfer coding writer.
///
/// Chunk boundaries are chosen by the caller, one [`write_chunk`] call is one chunk on the
/// wire. [`finish`] must be called to terminate the body.
///
/// [`write_chunk`]: ChunkedEncoder::write_chunk
/// [`finish`]: ChunkedEncoder::finish
#[derive(Debug)]
pub struct ChunkedEncoder<W> {
    io: W,
    header: BytesMut,
    finished: bool,
}

impl<W> ChunkedEncoder<W> {
    pub fn new(io: W) -> Self {
        Self {
            io,
            header: BytesMut::with_capacity(16 + CRLF.len()),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn get_ref(&self) -> &W {
        &self.io
    }

    pub fn into_inner(self) -> W {
        self.io
    }
}

impl<W> ChunkedEncoder<W>
where
    W: AsyncWrite + Unpin,
{
    /// Write `chunk` as one chunk, empty chunks are skipped.
    ///
    /// Fails with [`Error::Finished`] once [`finish`](Self::finish) succeeded.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), Error> {
        if self.finished {
            return Err(Error::Finished);
        }
        if chunk.is_empty() {
            return Ok(());
        }

        self.header.clear();
        put_size_line(&mut self.header, chunk.len() as u64);

        let mut buf = (&self.header[..]).chain(chunk).chain(&CRLF[..]);
        self.io.write_all_buf(&mut buf).await.map_err(Error::Write)
    }

    /// Write the terminal chunk and flush, subsequent calls are no-op.
    pub async fn finish(&mut self) -> Result<(), Error> {
        if self.finished {
            return Ok(());
        }
        self.io.write_all(LAST_CHUNK).await.map_err(Error::Write)?;
        self.io.flush().await.map_err(Error::Write)?;
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::body::decode_chunked;
    use crate::io::LineReader;

    #[test]
    fn test_encode_chunk() {
        let mut dst = BytesMut::new();
        encode_chunk(b"", &mut dst);
        assert!(dst.is_empty());

        encode_chunk(&[b'x'; 26], &mut dst);
        assert_eq!(&dst[..4], b"1A\r\n");
        assert_eq!(&dst[dst.len() - 2..], b"\r\n");
        assert_eq!(dst.len(), 4 + 26 + 2);

        let mut dst = BytesMut::new();
        put_size_line(&mut dst, u64::MAX);
        assert_eq!(&dst[..], b"FFFFFFFFFFFFFFFF\r\n");
    }

    #[tokio::test]
    async fn test_encoder_roundtrip() {
        let mut encoder = ChunkedEncoder::new(Vec::new());
        encoder.write_chunk(b"Wiki").await.unwrap();
        encoder.write_chunk(b"").await.unwrap();
        encoder.write_chunk(b"pedia").await.unwrap();
        encoder.finish().await.unwrap();
        encoder.finish().await.unwrap();
        assert!(encoder.is_finished());
        assert!(matches!(encoder.write_chunk(b"late").await, Err(Error::Finished)));

        let wire = encoder.into_inner();
        assert_eq!(wire, b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n");

        let mut reader = LineReader::new(&wire[..]);
        let mut body = Vec::new();
        decode_chunked(&mut reader, &mut body).await.unwrap();
        assert_eq!(body, b"Wikipedia");
    }
}

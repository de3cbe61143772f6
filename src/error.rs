//! Transfer errors.
//!
//! Every error is fatal for the message body being transferred. After a [`Error::Framing`] or
//! [`Error::Truncated`] the byte stream cannot be resynchronized, the connection must be closed.
use std::io;

/// Malformed chunked framing.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// Chunk size line contains no characters.
    #[error("empty chunk size line")]
    EmptySizeLine,
    /// Chunk size line does not start with a hex digit.
    #[error("chunk size line does not start with hex digits")]
    InvalidSizeLine,
    /// Chunk size does not fit in `u64`.
    #[error("chunk size too large")]
    ChunkTooLarge,
    /// Line exceeds the configured limit.
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),
    /// Source ended in the middle of a line.
    #[error("unterminated line at end of stream")]
    UnterminatedLine,
}

/// Relay, copy, and chunked decode error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed chunked framing.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    /// Source ended before the declared body was complete.
    #[error("message body truncated")]
    Truncated,
    /// Reading from the source failed.
    #[error("source read failed: {0}")]
    Read(#[source] io::Error),
    /// Writing to the sink failed.
    #[error("sink write failed: {0}")]
    Write(#[source] io::Error),
    /// Operation cancelled before completion.
    #[error("transfer cancelled")]
    Cancelled,
    /// Chunk written after the terminal chunk.
    #[error("chunked body already finished")]
    Finished,
}

impl Error {
    /// Returns `true` if the error is caused by the peer's byte stream rather than the transport.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Framing(_) | Self::Truncated)
    }
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Read(err) | Error::Write(err) => err,
            Error::Framing(err) => io::Error::new(io::ErrorKind::InvalidData, err),
            Error::Truncated => io::Error::new(io::ErrorKind::UnexpectedEof, Error::Truncated),
            Error::Cancelled => io::Error::new(io::ErrorKind::Interrupted, Error::Cancelled),
            Error::Finished => io::Error::new(io::ErrorKind::InvalidInput, Error::Finished),
        }
    }
}

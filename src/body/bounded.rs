use std::cmp;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Error;
use crate::io::LineReader;
use crate::log::warning;
use crate::transfer::Transfer;

/// Copy exactly `total` bytes from `reader` to `sink`.
///
/// Shorthand for [`Transfer::copy_bounded`] without observer or cancellation.
pub async fn copy_bounded<R, W>(
    reader: &mut LineReader<R>,
    sink: &mut W,
    total: u64,
) -> Result<(), Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    Transfer::new().copy_bounded(reader, sink, total).await
}

impl Transfer<'_> {
    /// Copy exactly `total` bytes from `reader` to `sink`, reusing the reader's buffer.
    ///
    /// Never writes more than `total` bytes, and never issues an empty write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Truncated`] if the source is exhausted first. Bytes already copied stay
    /// written to the sink.
    pub async fn copy_bounded<R, W>(
        &mut self,
        reader: &mut LineReader<R>,
        sink: &mut W,
        total: u64,
    ) -> Result<(), Error>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut remaining = total;

        while remaining > 0 {
            self.checkpoint()?;

            #[allow(
                clippy::cast_possible_truncation,
                reason = "the minimum is at most buffer capacity which is usize"
            )]
            let count = cmp::min(remaining, reader.buffer_capacity() as u64) as usize;

            let chunk = reader.read_buffered(count).await.map_err(Error::Read)?;
            if chunk.is_empty() {
                warning!("body truncated, {remaining} of {total} bytes missing");
                return Err(Error::Truncated);
            }

            remaining -= chunk.len() as u64;
            self.write(sink, chunk).await?;
        }

        Ok(())
    }
}

//! Per-operation transfer options.
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::log::trace;

/// Observation hook, invoked with every slice handed to a sink.
///
/// The slice borrows a buffer that is reused for the next read, an observer that needs the
/// bytes later must copy them. The hook runs before the next read is issued, so a slow observer
/// throttles the transfer.
pub type Observer<'a> = &'a mut (dyn FnMut(&[u8]) + Send);

/// Options shared by every copy loop: an optional [`Observer`] and an optional cancellation
/// token.
///
/// Cancellation is checked before every read. A write that already started always completes,
/// and its bytes are observed, before cancellation is honored.
///
/// ```no_run
/// # async fn run(mut src: &[u8], mut dst: Vec<u8>) -> Result<(), ferry::Error> {
/// let token = tokio_util::sync::CancellationToken::new();
/// let mut seen = 0;
/// let mut observer = |bytes: &[u8]| seen += bytes.len();
///
/// ferry::Transfer::new()
///     .observe(&mut observer)
///     .cancel_on(token.clone())
///     .relay(&mut src, &mut dst, 4096)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Transfer<'a> {
    observer: Option<Observer<'a>>,
    cancel: Option<CancellationToken>,
}

impl<'a> Transfer<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: Option<Observer<'a>>) -> Self {
        Self { observer, cancel: None }
    }

    pub fn observe(mut self, observer: Observer<'a>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Loop head check, fails with [`Error::Cancelled`] once cancellation is requested.
    pub(crate) fn checkpoint(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            trace!("transfer cancelled");
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn cancel_token(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Write all `bytes` to the sink, then observe them.
    pub(crate) async fn write<W>(&mut self, sink: &mut W, bytes: &[u8]) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
    {
        debug_assert!(!bytes.is_empty());
        sink.write_all(bytes).await.map_err(Error::Write)?;
        self.notify(bytes);
        Ok(())
    }

    pub(crate) fn notify(&mut self, bytes: &[u8]) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer(bytes);
        }
    }
}

/// Await a cancel safe read, giving up early if `token` is cancelled.
pub(crate) async fn cancellable<T, F>(token: Option<&CancellationToken>, read: F) -> Result<T, Error>
where
    F: Future<Output = io::Result<T>>,
{
    let Some(token) = token else {
        return read.await.map_err(Error::Read);
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            trace!("read cancelled");
            Err(Error::Cancelled)
        }
        result = read => result.map_err(Error::Read),
    }
}

impl std::fmt::Debug for Transfer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Transfer")
            .field("observed", &self.observer.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

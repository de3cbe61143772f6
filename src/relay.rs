//! Protocol agnostic byte relay.
//!
//! - [`relay`] pump one direction until the source is exhausted
//! - [`Tunnel`] pump both directions of a connection pair concurrently
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Error;
use crate::log::{debug, error};
use crate::transfer::{Observer, Transfer, cancellable};

/// Relay bytes from `source` to `sink` until `source` is exhausted, returns the number of bytes
/// relayed.
///
/// Each slice is written to the sink before it is passed to `observer`, and the buffer is only
/// reused after the observer returns. A `buffer_size` of zero is clamped to one.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), ferry::Error> {
/// let mut source: &[u8] = b"CONNECT tunnel payload";
/// let mut sink = Vec::new();
/// let mut observed = Vec::new();
///
/// let n = ferry::relay(&mut source, &mut sink, Some(&mut |bytes: &[u8]| observed.extend_from_slice(bytes)), 4).await?;
///
/// assert_eq!(n, 22);
/// assert_eq!(sink, observed);
/// # Ok(())
/// # }
/// ```
pub async fn relay<R, W>(
    source: &mut R,
    sink: &mut W,
    observer: Option<Observer<'_>>,
    buffer_size: usize,
) -> Result<u64, Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    Transfer::with_observer(observer).relay(source, sink, buffer_size).await
}

impl Transfer<'_> {
    /// Relay bytes from `source` to `sink` until `source` is exhausted, returns the number of
    /// bytes relayed.
    ///
    /// See [`relay`].
    pub async fn relay<R, W>(
        &mut self,
        source: &mut R,
        sink: &mut W,
        buffer_size: usize,
    ) -> Result<u64, Error>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buffer = vec![0u8; buffer_size.max(1)];
        let mut relayed = 0u64;

        loop {
            self.checkpoint()?;

            let read = cancellable(self.cancel_token(), source.read(&mut buffer[..])).await?;
            if read == 0 {
                debug!("relay finished after {relayed} bytes");
                return Ok(relayed);
            }

            let bytes = &buffer[..read];
            sink.write_all(bytes).await.map_err(Error::Write)?;
            sink.flush().await.map_err(Error::Write)?;
            self.notify(bytes);
            relayed += read as u64;
        }
    }
}

/// Relay both directions between `client` and `server` until both are exhausted.
///
/// Shorthand for [`Tunnel::run`] without observers.
pub async fn tunnel<C, S>(client: C, server: S, buffer_size: usize) -> Result<(u64, u64), Error>
where
    C: AsyncRead + AsyncWrite,
    S: AsyncRead + AsyncWrite,
{
    Tunnel::new(buffer_size).run(client, server).await
}

/// Full duplex relay between a client and a server connection.
///
/// Each direction runs its own [`relay`] loop with its own buffer. When a direction reaches end
/// of stream, the write half of its sink is shut down and the other direction keeps running. If
/// either direction fails, including the shutdown of its sink, the other one is cancelled.
pub struct Tunnel<'a> {
    buffer_size: usize,
    cancel: CancellationToken,
    upstream: Option<Observer<'a>>,
    downstream: Option<Observer<'a>>,
}

impl<'a> Tunnel<'a> {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            cancel: CancellationToken::new(),
            upstream: None,
            downstream: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.get_buffer_size())
    }

    /// Stop both directions once `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Observe bytes sent from client to server.
    pub fn observe_upstream(mut self, observer: Observer<'a>) -> Self {
        self.upstream = Some(observer);
        self
    }

    /// Observe bytes sent from server to client.
    pub fn observe_downstream(mut self, observer: Observer<'a>) -> Self {
        self.downstream = Some(observer);
        self
    }

    /// Run the tunnel, returns bytes relayed `(client to server, server to client)`.
    pub async fn run<C, S>(self, client: C, server: S) -> Result<(u64, u64), Error>
    where
        C: AsyncRead + AsyncWrite,
        S: AsyncRead + AsyncWrite,
    {
        let Self { buffer_size, cancel, upstream, downstream } = self;

        // failure in one direction must not cancel the caller's token
        let cancel = cancel.child_token();

        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut server_read, mut server_write) = tokio::io::split(server);

        let upstream = Transfer::with_observer(upstream).cancel_on(cancel.clone());
        let downstream = Transfer::with_observer(downstream).cancel_on(cancel.clone());

        let (up, down) = tokio::join!(
            pump(upstream, &mut client_read, &mut server_write, buffer_size, &cancel),
            pump(downstream, &mut server_read, &mut client_write, buffer_size, &cancel),
        );

        debug!("tunnel finished, upstream: {up:?}, downstream: {down:?}");

        let result = match (up, down) {
            (Ok(up), Ok(down)) => Ok((up, down)),
            (Err(err), Ok(_)) | (Ok(_), Err(err)) => Err(err),
            (Err(Error::Cancelled), Err(err)) | (Err(err), Err(_)) => Err(err),
        };
        match &result {
            Ok(_) | Err(Error::Cancelled) => {}
            Err(err) => {
                error!("tunnel failed: {err}");
            }
        }
        result
    }
}

async fn pump<R, W>(
    mut transfer: Transfer<'_>,
    source: &mut R,
    sink: &mut W,
    buffer_size: usize,
    on_error: &CancellationToken,
) -> Result<u64, Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = match transfer.relay(source, sink, buffer_size).await {
        // half close, the peer may still be sending
        Ok(relayed) => sink.shutdown().await.map(|()| relayed).map_err(Error::Write),
        Err(err) => Err(err),
    };
    if result.is_err() {
        on_error.cancel();
    }
    result
}

impl std::fmt::Debug for Tunnel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Tunnel")
            .field("buffer_size", &self.buffer_size)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;
    use tokio_test::io::Builder;

    use super::*;

    /// Sink accepting at most one byte per write call.
    struct Trickle(Vec<u8>);

    impl AsyncWrite for Trickle {
        fn poll_write(mut self: Pin<&mut Self>, _: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
            let Some(&byte) = buf.first() else {
                return Poll::Ready(Ok(0));
            };
            self.0.push(byte);
            Poll::Ready(Ok(1))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Sink that cancels `token` on every write, after accepting the whole buffer.
    struct CancelOnWrite {
        written: Vec<u8>,
        token: CancellationToken,
    }

    impl AsyncWrite for CancelOnWrite {
        fn poll_write(mut self: Pin<&mut Self>, _: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
            self.token.cancel();
            self.written.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Connection that is at end of stream and fails to close its write half.
    struct BrokenClose;

    impl AsyncRead for BrokenClose {
        fn poll_read(self: Pin<&mut Self>, _: &mut Context, _: &mut ReadBuf) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for BrokenClose {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }
    }

    #[tokio::test]
    async fn test_relay_partial_writes() {
        let mut source = &b"partial writes are completed"[..];
        let mut sink = Trickle(Vec::new());
        let mut seen = Vec::new();
        let mut observer = |bytes: &[u8]| seen.push(bytes.len());

        let n = relay(&mut source, &mut sink, Some(&mut observer), 8).await.unwrap();

        assert_eq!(n, 28);
        assert_eq!(sink.0, b"partial writes are completed");
        assert_eq!(seen, [8, 8, 8, 4]);
    }

    #[tokio::test]
    async fn test_relay_empty() {
        let mut source = &b""[..];
        let mut sink = Vec::new();
        let mut calls = 0;
        let mut observer = |_: &[u8]| calls += 1;

        assert_eq!(relay(&mut source, &mut sink, Some(&mut observer), 0).await.unwrap(), 0);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_relay_read_error() {
        let mut source = Builder::new()
            .read(b"ok")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut sink = Vec::new();

        let err = relay(&mut source, &mut sink, None, 16).await.unwrap_err();
        match err {
            Error::Read(err) => assert_eq!(err.kind(), io::ErrorKind::ConnectionReset),
            err => panic!("unexpected error: {err}"),
        }
        assert_eq!(sink, b"ok");
    }

    #[tokio::test]
    async fn test_relay_cancel_pending_read() {
        let (mut source, _peer) = tokio::io::duplex(64);
        let mut sink = Vec::new();
        let token = CancellationToken::new();

        let cancel = token.clone();
        let mut transfer = Transfer::new().cancel_on(token);
        let result = tokio::join!(
            transfer.relay(&mut source, &mut sink, 64),
            async move { cancel.cancel() },
        );

        assert!(matches!(result.0, Err(Error::Cancelled)));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_completes_pending_write() {
        let token = CancellationToken::new();
        let mut source = &b"abcdefgh"[..];
        let mut sink = CancelOnWrite { written: Vec::new(), token: token.clone() };
        let mut seen = Vec::new();
        let mut observer = |bytes: &[u8]| seen.extend_from_slice(bytes);

        let result = Transfer::new()
            .observe(&mut observer)
            .cancel_on(token)
            .relay(&mut source, &mut sink, 4)
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(sink.written, b"abcd");
        assert_eq!(seen, b"abcd");
        assert_eq!(source, b"efgh");
    }

    #[tokio::test]
    async fn test_tunnel_close_error() {
        match tunnel(BrokenClose, BrokenClose, 8).await {
            Err(Error::Write(err)) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
            result => panic!("unexpected result: {result:?}"),
        }
    }
}

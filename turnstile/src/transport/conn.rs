//! Connection handed out by a listener or dialer

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

use super::Connection;
use crate::gate::Release;
use crate::SerialAddr;

/// One live connection over a freshly opened stream.
///
/// Reads and writes go straight to the stream. Closing (or shutting down, or
/// dropping) releases the gate's slot so the next accept/dial can reopen;
/// reads and writes after close fail with `NotConnected`.
#[derive(Debug)]
pub struct ReopenConn<S> {
    stream: S,
    local: SerialAddr,
    remote: SerialAddr,
    release: Release,
}

impl<S> ReopenConn<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: S, local: SerialAddr, remote: SerialAddr, release: Release) -> Self {
        Self {
            stream,
            local,
            remote,
            release,
        }
    }

    /// Release the slot, then close the underlying stream.
    ///
    /// Safe to call more than once.
    pub async fn close(&mut self) -> io::Result<()> {
        self.shutdown().await
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

impl<S> Connection for ReopenConn<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn local_addr(&self) -> &SerialAddr {
        &self.local
    }

    fn remote_addr(&self) -> &SerialAddr {
        &self.remote
    }

    // The medium has no deadline primitive

    fn set_deadline(&mut self, _deadline: Option<Instant>) -> io::Result<()> {
        Ok(())
    }

    fn set_read_deadline(&mut self, _deadline: Option<Instant>) -> io::Result<()> {
        Ok(())
    }

    fn set_write_deadline(&mut self, _deadline: Option<Instant>) -> io::Result<()> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.release.is_held()
    }
}

/// After close the stream may already belong to the next connection
fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "Connection closed")
}

impl<S: AsyncRead + Unpin> AsyncRead for ReopenConn<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.release.is_held() {
            return Poll::Ready(Err(closed()));
        }
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ReopenConn<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if !self.release.is_held() {
            return Poll::Ready(Err(closed()));
        }
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Release first: the stream close runs even if the slot was already gone
        self.release.release();
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::transport::open_fn;
    use crate::{Connection, ReopenListener};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_forwards_bytes_unchanged() {
        let listener = ReopenListener::new(
            open_fn(|| async {
                Ok::<_, std::io::Error>(Builder::new()
                    .read(b"GET / HTTP/1.1\r\n")
                    .write(b"HTTP/1.1 200 OK\r\n")
                    .build())
            }),
            "/dev/ttyS0",
        );

        let mut conn = listener.accept().await.unwrap();
        let mut buf = [0u8; 16];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"GET / HTTP/1.1\r\n");
        conn.write_all(b"HTTP/1.1 200 OK\r\n").await.unwrap();
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_addresses() {
        let listener = ReopenListener::new(
            open_fn(|| async { Ok::<_, std::io::Error>(tokio::io::duplex(64).0) }),
            "/dev/ttyACM0",
        );
        let conn = listener.accept().await.unwrap();
        assert_eq!(conn.local_addr().to_string(), "/dev/ttyACM0");
        assert_eq!(conn.local_addr().network(), "serial");
        assert_eq!(conn.remote_addr().to_string(), "peer");
    }

    #[tokio::test]
    async fn test_deadlines_are_noops() {
        let (stream, mut remote) = tokio::io::duplex(64);
        let slot = std::sync::Mutex::new(Some(stream));
        let listener = ReopenListener::new(
            open_fn(move || {
                let stream = slot.lock().unwrap().take();
                async move {
                    stream.ok_or_else(|| std::io::Error::other("already taken"))
                }
            }),
            "pipe",
        );
        let mut conn = listener.accept().await.unwrap();

        let past = std::time::Instant::now()
            .checked_sub(Duration::from_secs(60))
            .unwrap_or_else(std::time::Instant::now);
        let future = std::time::Instant::now() + Duration::from_millis(1);
        conn.set_deadline(Some(past)).unwrap();
        conn.set_read_deadline(Some(std::time::Instant::now())).unwrap();
        conn.set_write_deadline(Some(future)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        conn.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        remote.write_all(b"pong").await.unwrap();
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        conn.set_deadline(None).unwrap();
    }

    #[tokio::test]
    async fn test_close_twice() {
        let listener = ReopenListener::new(
            open_fn(|| async { Ok::<_, std::io::Error>(tokio::io::duplex(64).0) }),
            "pipe",
        );
        let mut conn = listener.accept().await.unwrap();
        assert!(conn.is_open());
        conn.close().await.unwrap();
        assert!(!conn.is_open());
        conn.close().await.unwrap();
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_drop_releases_slot() {
        let listener = ReopenListener::new(
            open_fn(|| async { Ok::<_, std::io::Error>(tokio::io::duplex(64).0) }),
            "pipe",
        );
        let conn = listener.accept().await.unwrap();
        drop(conn);
        let next = tokio::time::timeout(Duration::from_secs(1), listener.accept()).await;
        assert!(next.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_closed_conn_cannot_touch_shared_stream() {
        let (local, mut remote) = tokio::io::duplex(64);
        let listener = ReopenListener::from_stream(local, "stdio");

        let mut first = listener.accept().await.unwrap();
        first.close().await.unwrap();
        let mut second = listener.accept().await.unwrap();
        second.write_all(b"live ").await.unwrap();

        let err = first.write_all(b"stale").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotConnected);
        let mut buf = [0u8; 8];
        let err = first.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotConnected);

        let mut buf = [0u8; 5];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"live ");
        let mut rest = [0u8; 8];
        let more = tokio::time::timeout(Duration::from_millis(50), remote.read(&mut rest)).await;
        assert!(more.is_err(), "stale bytes reached the stream");

        // The live connection still reads what arrives
        remote.write_all(b"ok").await.unwrap();
        let mut buf = [0u8; 2];
        second.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ok");
    }
}

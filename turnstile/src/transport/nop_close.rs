//! Close adapter for streams that must outlive every connection

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::Open;

/// Shared handle to an already-open stream whose shutdown does nothing.
///
/// Clones refer to the same stream, so a fixed in-memory or pre-opened stream
/// can be handed out by every "open" of a gate and survive each close.
#[derive(Debug)]
pub struct NopClose<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> NopClose<T> {
    pub fn new(stream: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stream)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for NopClose<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for NopClose<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.lock()).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for NopClose<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut *self.lock()).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.lock()).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// [`Open`] that always succeeds with the same shared stream
#[derive(Debug)]
pub struct ReuseStream<T> {
    stream: NopClose<T>,
}

impl<T> ReuseStream<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream: NopClose::new(stream),
        }
    }
}

impl<T> Open for ReuseStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Stream = NopClose<T>;

    fn open(&self) -> impl Future<Output = io::Result<NopClose<T>>> + Send {
        std::future::ready(Ok(self.stream.clone()))
    }
}

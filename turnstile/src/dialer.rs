//! Dialer façade: the active-side mirror of [`ReopenListener`](crate::ReopenListener)

use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::gate::Gate;
use crate::transport::{Open, ReopenConn, ReuseStream};
use crate::{ReopenConfig, ReopenError, SerialAddr};

/// Hands out one connection at a time over a reopenable stream.
///
/// Same admission rules as the listener. Every wait (for the previous
/// connection, or between failed opens) also races a caller-supplied
/// cancellation future.
pub struct ReopenDialer<O> {
    gate: Gate<O>,
}

impl<O: Open> ReopenDialer<O> {
    pub fn new(open: O, name: impl Into<String>) -> Self {
        Self::with_config(open, name, ReopenConfig::default())
    }

    pub fn with_config(open: O, name: impl Into<String>, config: ReopenConfig) -> Self {
        Self {
            gate: Gate::new(open, SerialAddr::new(name), config),
        }
    }

    /// Dial, giving up with [`ReopenError::Cancelled`] once `cancel` completes.
    ///
    /// `address` only labels the connection's remote end. A cancelled waiter
    /// never holds the right to open; a cancelled opener hands it back.
    pub async fn dial_with<C: Future>(
        &self,
        address: &str,
        cancel: C,
    ) -> Result<ReopenConn<O::Stream>, ReopenError> {
        self.gate.connect(SerialAddr::new(address), cancel).await
    }

    pub async fn dial(&self, address: &str) -> Result<ReopenConn<O::Stream>, ReopenError> {
        self.dial_with(address, std::future::pending::<()>()).await
    }

    /// Dial with a deadline `timeout` from now
    pub async fn dial_timeout(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<ReopenConn<O::Stream>, ReopenError> {
        self.dial_with(address, tokio::time::sleep(timeout)).await
    }

    /// Idempotent. Blocked and future dials fail with [`ReopenError::Closed`].
    pub fn close(&self) {
        self.gate.close();
    }

    pub fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }

    pub fn local_addr(&self) -> &SerialAddr {
        self.gate.addr()
    }
}

impl<T> ReopenDialer<ReuseStream<T>>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Dialer over an already-open stream that is never closed by connections
    pub fn from_stream(stream: T, name: impl Into<String>) -> Self {
        Self::new(ReuseStream::new(stream), name)
    }
}

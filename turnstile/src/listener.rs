//! Listener façade over a reopenable stream

use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::gate::Gate;
use crate::transport::{Listener, Open, ReopenConn, ReuseStream};
use crate::{ReopenConfig, ReopenError, SerialAddr};

/// Accepts one connection at a time over a stream that is reopened for each.
///
/// `accept` returns as soon as the stream opens; while that connection is
/// live, further accepts block until it is closed. Open failures are retried
/// with backoff until success or [`close`](Self::close).
pub struct ReopenListener<O> {
    gate: Gate<O>,
}

impl<O: Open> ReopenListener<O> {
    pub fn new(open: O, name: impl Into<String>) -> Self {
        Self::with_config(open, name, ReopenConfig::default())
    }

    pub fn with_config(open: O, name: impl Into<String>, config: ReopenConfig) -> Self {
        Self {
            gate: Gate::new(open, SerialAddr::new(name), config),
        }
    }

    /// Wait for the previous connection to close, then open a new one.
    ///
    /// Only interrupted by closing the listener.
    pub async fn accept(&self) -> Result<ReopenConn<O::Stream>, ReopenError> {
        let peer = SerialAddr::new(self.gate.config().peer_name.as_str());
        self.gate.connect(peer, std::future::pending::<()>()).await
    }

    /// Idempotent. Blocked and future accepts fail with [`ReopenError::Closed`].
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

impl<T> ReopenListener<ReuseStream<T>>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Listener over an already-open stream that is never closed by connections
    pub fn from_stream(stream: T, name: impl Into<String>) -> Self {
        Self::new(ReuseStream::new(stream), name)
    }
}

impl<O: Open> Listener for ReopenListener<O> {
    type Connection = ReopenConn<O::Stream>;

    async fn accept(&self) -> io::Result<Self::Connection> {
        Ok(ReopenListener::accept(self).await?)
    }

    fn close(&self) {
        ReopenListener::close(self);
    }

    fn local_addr(&self) -> &SerialAddr {
        ReopenListener::local_addr(self)
    }
}

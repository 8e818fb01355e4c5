//! Transport layer abstraction
//!
//! Traits at the boundary between the admission gate and the outside world:
//! how a stream gets opened, and what a connection and a listener look like.

pub mod conn;
#[cfg(unix)]
pub mod device;
pub mod nop_close;

pub use conn::ReopenConn;
#[cfg(unix)]
pub use device::{Device, DeviceStream};
pub use nop_close::{NopClose, ReuseStream};

use std::future::Future;
use std::io;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::SerialAddr;

/// Something that can (re)open a duplex stream.
///
/// Called repeatedly by a gate, never concurrently with itself. A failed open
/// must not leave a half-opened resource behind.
pub trait Open: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn open(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// [`Open`] implemented by a closure, see [`open_fn`]
#[derive(Clone)]
pub struct OpenFn<F>(F);

/// Wrap a closure returning an open future
pub fn open_fn<F, Fut, S>(f: F) -> OpenFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = io::Result<S>> + Send,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    OpenFn(f)
}

impl<F, Fut, S> Open for OpenFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = io::Result<S>> + Send,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Stream = S;

    fn open(&self) -> impl Future<Output = io::Result<S>> + Send {
        (self.0)()
    }
}

/// A bidirectional connection with network-style addressing
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin {
    fn local_addr(&self) -> &SerialAddr;

    fn remote_addr(&self) -> &SerialAddr;

    /// Read and write deadline together. `None` clears it.
    fn set_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()>;

    fn set_read_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()>;

    fn set_write_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()>;

    /// Check if connection is still open
    fn is_open(&self) -> bool;
}

/// A passive acceptor of connections
#[allow(async_fn_in_trait)]
pub trait Listener: Send + Sync {
    type Connection: Connection;

    /// Wait for the next connection
    async fn accept(&self) -> io::Result<Self::Connection>;

    /// Stop accepting; blocked and future accepts fail
    fn close(&self);

    fn local_addr(&self) -> &SerialAddr;
}

//! Opener for character devices and FIFOs (serial ports, named pipes)

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::unix::pipe::{self, Receiver, Sender};
use tracing::debug;

use super::Open;

/// Opens a path on every call as a readiness-driven duplex stream.
///
/// The path must be a character device or a FIFO; regular files cannot be
/// polled and fail to open.
#[derive(Debug, Clone)]
pub struct Device {
    path: PathBuf,
}

impl Device {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path as an address label
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }
}

impl Open for Device {
    type Stream = DeviceStream;

    fn open(&self) -> impl Future<Output = io::Result<DeviceStream>> + Send {
        let path = self.path.clone();
        async move {
            debug!("Opening device {}", path.display());
            // Receiver first so a FIFO already has a reader when the sender opens
            let rx = pipe::OpenOptions::new().unchecked(true).open_receiver(&path)?;
            let tx = pipe::OpenOptions::new().unchecked(true).open_sender(&path)?;
            Ok(DeviceStream {
                rx: Some(rx),
                tx: Some(tx),
            })
        }
    }
}

/// Non-blocking read and write handles on one device.
///
/// Dropping a pending read leaves nothing running in the background, and
/// shutdown closes both handles.
#[derive(Debug)]
pub struct DeviceStream {
    rx: Option<Receiver>,
    tx: Option<Sender>,
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "Device closed")
}

impl AsyncRead for DeviceStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.rx.as_mut() {
            Some(rx) => Pin::new(rx).poll_read(cx, buf),
            None => Poll::Ready(Err(not_connected())),
        }
    }
}

impl AsyncWrite for DeviceStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.tx.as_mut() {
            Some(tx) => Pin::new(tx).poll_write(cx, buf),
            None => Poll::Ready(Err(not_connected())),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.tx.as_mut() {
            Some(tx) => Pin::new(tx).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.rx = None;
        self.tx = None;
        Poll::Ready(Ok(()))
    }
}

//! Turnstile - reopenable streams as listeners and dialers
//!
//! Adapts a duplex byte stream that has to be opened, closed and reopened over
//! its lifetime (a serial port, a FIFO, a named pipe) into a connection-oriented
//! listener or dialer. At most one connection is live at a time; the next
//! accept/dial waits for it to close and then reopens the stream.

pub mod addr;
pub mod backoff;
pub mod config;
pub mod dialer;
pub mod error;
mod gate;
pub mod listener;
pub mod transport;

pub use addr::*;
pub use config::*;
pub use dialer::*;
pub use error::*;
pub use listener::*;
pub use transport::*;

#[cfg(test)]
mod testing {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{duplex, DuplexStream};

    use crate::transport::{open_fn, Open};

    /// Opener that fails `fail_first` times with NotFound, then hands out
    /// duplex halves. `attempts` counts every call.
    pub(crate) fn flaky(fail_first: usize, attempts: Arc<AtomicUsize>) -> impl Open<Stream = DuplexStream> {
        open_fn(move || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < fail_first {
                    Err(io::Error::new(io::ErrorKind::NotFound, "device not present"))
                } else {
                    Ok(duplex(64).0)
                }
            }
        })
    }
}

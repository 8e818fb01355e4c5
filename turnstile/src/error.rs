//! Errors returned by accept and dial

use std::io;
use thiserror::Error;

/// Terminal outcomes of an accept/dial call other than a connection.
///
/// Open failures never show up here; they are retried until the gate closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReopenError {
    /// The listener or dialer has been closed
    #[error("use of closed listener or dialer")]
    Closed,

    /// The caller's cancellation signal fired first
    #[error("dial cancelled")]
    Cancelled,
}

impl From<ReopenError> for io::Error {
    fn from(err: ReopenError) -> Self {
        let kind = match err {
            ReopenError::Closed => io::ErrorKind::NotConnected,
            ReopenError::Cancelled => io::ErrorKind::Interrupted,
        };
        io::Error::new(kind, err)
    }
}

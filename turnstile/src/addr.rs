//! Address stand-in for media that have no network address

use std::fmt;

/// Label for one end of a reopenable stream, usually a device path.
///
/// Network is always `"serial"`; the display form is the label itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerialAddr(String);

impl SerialAddr {
    pub const NETWORK: &'static str = "serial";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Transport kind, mirrors a socket address family
    pub fn network(&self) -> &str {
        Self::NETWORK
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SerialAddr {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SerialAddr {
    fn from(name: String) -> Self {
        Self(name)
    }
}

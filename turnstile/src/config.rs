//! Gate configuration

use std::time::Duration;

/// Configuration shared by [`ReopenListener`](crate::ReopenListener) and
/// [`ReopenDialer`](crate::ReopenDialer)
#[derive(Debug, Clone)]
pub struct ReopenConfig {
    /// Delay after the first failed open
    pub initial_backoff: Duration,
    /// Upper bound for the doubling delay between open attempts
    pub max_backoff: Duration,
    /// Remote address label for accepted connections
    pub peer_name: String,
}

impl Default for ReopenConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            peer_name: "peer".to_string(),
        }
    }
}

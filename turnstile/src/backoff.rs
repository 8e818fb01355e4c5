//! Delay policy between failed open attempts

use std::time::Duration;

use crate::ReopenConfig;

/// Doubling delay, capped. No jitter, no reset within one retry sequence.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }

    pub fn from_config(config: &ReopenConfig) -> Self {
        Self::new(config.initial_backoff, config.max_backoff)
    }

    /// Delay to wait now; the following one is doubled up to the cap
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }
}

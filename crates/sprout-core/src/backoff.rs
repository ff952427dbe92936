//! Consecutive-error backoff for the consumer loop

use std::time::Duration;

/// Tracks consecutive infrastructure errors
///
/// The n-th consecutive error sleeps `min(n * step, cap)`; reaching
/// `max_consecutive` means give up.
#[derive(Debug, Clone)]
pub struct ErrorBackoff {
    consecutive: u32,
    max_consecutive: u32,
    step: Duration,
    cap: Duration,
}

impl ErrorBackoff {
    #[must_use]
    pub fn new(max_consecutive: u32, step: Duration, cap: Duration) -> Self {
        Self {
            consecutive: 0,
            max_consecutive,
            step,
            cap,
        }
    }

    /// Count one more error
    ///
    /// Returns the sleep before the next attempt, or `None` once the ceiling
    /// is reached.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.consecutive = self.consecutive.saturating_add(1);
        if self.consecutive >= self.max_consecutive {
            return None;
        }
        Some(self.delay_for(self.consecutive))
    }

    /// Sleep for the n-th consecutive error
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.cap)
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    #[must_use]
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    #[must_use]
    pub fn max_consecutive(&self) -> u32 {
        self.max_consecutive
    }
}

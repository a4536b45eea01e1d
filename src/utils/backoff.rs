//! Full-jitter exponential backoff between acquisition attempts.

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use std::time::Duration;

/// Exponential backoff with "full jitter".
///
/// The ceiling for attempt `n` (0-based) is `min(cap, base * 2^n)`; the actual
/// delay is sampled uniformly from `[0, ceiling)`. With the defaults the
/// ceilings are 20ms, 40ms, 80ms, then 100ms for every later attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullJitterBackoff {
    base: Duration,
    cap: Duration,
}

impl Default for FullJitterBackoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(STARTING_BACKOFF_DELAY_MS),
            Duration::from_millis(MAX_BACKOFF_DELAY_MS),
        )
    }
}

impl FullJitterBackoff {
    /// Create a backoff with the given starting ceiling and maximum ceiling.
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Starting ceiling.
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// Maximum ceiling.
    pub const fn cap(&self) -> Duration {
        self.cap
    }

    /// Upper bound (exclusive) of the delay after the given failed attempt.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        // 1 << attempt overflows past 31; everything that large is capped anyway
        1u32.checked_shl(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Jittered delay to sleep after the given failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        tokio_retry::strategy::jitter(self.ceiling(attempt))
    }
}

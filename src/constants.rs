//! Default values shared by the lock guard, its configuration and its tests.
//!
//! Durations are expressed in milliseconds where they also appear in the TOML
//! configuration, so the serde defaults and the builder defaults can never
//! drift apart.

use std::time::Duration;

/// Default number of acquisition attempts (a single attempt, no retries).
pub const DEFAULT_RETRY_LIMIT: u32 = 1;

/// Default lease applied to the lock key (30 seconds).
pub const DEFAULT_LEASE_MS: u64 = 30_000;

/// Default interval between lease renewals (6 seconds).
///
/// The interval is deliberately independent of the lease. With the default
/// lease a key survives four missed renewals before it expires.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 6_000;

/// Starting ceiling for the full-jitter backoff between attempts (20ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 20;

/// Maximum ceiling for the full-jitter backoff between attempts (100ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 100;

/// Number of random bytes in an ownership token.
pub const TOKEN_LENGTH: usize = 24;

/// Separator placed between a configured key prefix and the lock key.
pub const KEY_PREFIX_SEPARATOR: char = ':';

/// Default lease as a [`Duration`].
pub const fn default_lease() -> Duration {
    Duration::from_millis(DEFAULT_LEASE_MS)
}

/// Default heartbeat interval as a [`Duration`].
pub const fn default_heartbeat_interval() -> Duration {
    Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS)
}

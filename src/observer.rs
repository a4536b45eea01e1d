//! Observability hooks for lock runs.
//!
//! Renewal and release failures never reach the caller of
//! [`LockGuard::run`](crate::guard::LockGuard::run): a lease-based lock is best
//! effort, and a failed renewal tick is not a reason to abort the critical
//! section. They are still worth seeing. Every such outcome is logged through
//! `tracing` and emitted as a [`LockEvent`] to the configured [`LockObserver`].
//!
//! [`LockStats`] is a ready-made observer that counts events, which is enough
//! to notice a lease renewing into a failing store.
//!
//! ```rust,no_run
//! use lockguard::guard::LockGuard;
//! use lockguard::observer::LockStats;
//! use lockguard::store::MemoryStore;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), lockguard::core::LockError> {
//! let stats = Arc::new(LockStats::new());
//! let guard = LockGuard::builder(Arc::new(MemoryStore::new()), "nightly-report")
//!     .observer(stats.clone())
//!     .build()?;
//! # let _ = guard;
//! // ... run the guard, then:
//! let snapshot = stats.snapshot();
//! println!("renewal failures: {}", snapshot.renewal_failures);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Something that happened during a lock run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    /// The conditional write succeeded on the given (1-based) attempt.
    Acquired {
        /// Lock key
        key: String,
        /// Attempt that won
        attempt: u32,
    },
    /// One acquisition attempt did not obtain the lock.
    AttemptFailed {
        /// Lock key
        key: String,
        /// Attempt that lost (1-based)
        attempt: u32,
        /// Why, when it was not plain contention
        reason: Option<String>,
    },
    /// All attempts were used up.
    NotObtained {
        /// Lock key
        key: String,
        /// Attempts made
        attempts: u32,
    },
    /// A heartbeat tick extended the lease.
    Renewed {
        /// Lock key
        key: String,
    },
    /// A heartbeat tick found the key gone; the lease already expired.
    RenewalMissed {
        /// Lock key
        key: String,
    },
    /// A heartbeat tick failed against the store.
    RenewalFailed {
        /// Lock key
        key: String,
        /// Store error message
        error: String,
    },
    /// Release deleted the key.
    Released {
        /// Lock key
        key: String,
    },
    /// Release found the key owned by someone else (or already gone).
    ReleaseSkipped {
        /// Lock key
        key: String,
    },
    /// Release failed against the store.
    ReleaseFailed {
        /// Lock key
        key: String,
        /// Store error message
        error: String,
    },
}

impl LockEvent {
    /// Key the event refers to.
    pub fn key(&self) -> &str {
        match self {
            LockEvent::Acquired { key, .. }
            | LockEvent::AttemptFailed { key, .. }
            | LockEvent::NotObtained { key, .. }
            | LockEvent::Renewed { key }
            | LockEvent::RenewalMissed { key }
            | LockEvent::RenewalFailed { key, .. }
            | LockEvent::Released { key }
            | LockEvent::ReleaseSkipped { key }
            | LockEvent::ReleaseFailed { key, .. } => key,
        }
    }
}

impl fmt::Display for LockEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockEvent::Acquired { key, attempt } => {
                write!(f, "lock '{key}' acquired on attempt {attempt}")
            }
            LockEvent::AttemptFailed { key, attempt, reason: None } => {
                write!(f, "lock '{key}' busy on attempt {attempt}")
            }
            LockEvent::AttemptFailed { key, attempt, reason: Some(reason) } => {
                write!(f, "lock '{key}' attempt {attempt} failed: {reason}")
            }
            LockEvent::NotObtained { key, attempts } => {
                write!(f, "lock '{key}' not obtained after {attempts} attempt(s)")
            }
            LockEvent::Renewed { key } => write!(f, "lease on '{key}' renewed"),
            LockEvent::RenewalMissed { key } => {
                write!(f, "lease on '{key}' could not be renewed: key no longer exists")
            }
            LockEvent::RenewalFailed { key, error } => {
                write!(f, "lease on '{key}' could not be renewed: {error}")
            }
            LockEvent::Released { key } => write!(f, "lock '{key}' released"),
            LockEvent::ReleaseSkipped { key } => {
                write!(f, "lock '{key}' not released: held by another owner or expired")
            }
            LockEvent::ReleaseFailed { key, error } => {
                write!(f, "lock '{key}' release failed: {error}")
            }
        }
    }
}

/// Receives [`LockEvent`]s from lock runs.
///
/// Called inline from the acquisition loop, the heartbeat task and the
/// release step, so implementations should return quickly.
pub trait LockObserver: Send + Sync {
    /// Called for every event of a run.
    fn on_event(&self, event: &LockEvent);
}

/// Observer that drops every event. The default when none is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LockObserver for NoopObserver {
    fn on_event(&self, _event: &LockEvent) {}
}

/// Counting observer.
///
/// Share one instance across many guards through an `Arc` to get process-wide
/// totals.
#[derive(Debug, Default)]
pub struct LockStats {
    acquired: AtomicU64,
    attempts_failed: AtomicU64,
    not_obtained: AtomicU64,
    renewals: AtomicU64,
    renewals_missed: AtomicU64,
    renewal_failures: AtomicU64,
    released: AtomicU64,
    releases_skipped: AtomicU64,
    release_failures: AtomicU64,
}

/// Point-in-time copy of [`LockStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LockStatsSnapshot {
    /// Successful acquisitions
    pub acquired: u64,
    /// Lost acquisition attempts
    pub attempts_failed: u64,
    /// Runs that gave up acquiring
    pub not_obtained: u64,
    /// Successful lease renewals
    pub renewals: u64,
    /// Renewals that found the key gone
    pub renewals_missed: u64,
    /// Renewals that failed against the store
    pub renewal_failures: u64,
    /// Releases that deleted the key
    pub released: u64,
    /// Releases that left a foreign key alone
    pub releases_skipped: u64,
    /// Releases that failed against the store
    pub release_failures: u64,
}

impl LockStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all counters.
    pub fn snapshot(&self) -> LockStatsSnapshot {
        LockStatsSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            attempts_failed: self.attempts_failed.load(Ordering::Relaxed),
            not_obtained: self.not_obtained.load(Ordering::Relaxed),
            renewals: self.renewals.load(Ordering::Relaxed),
            renewals_missed: self.renewals_missed.load(Ordering::Relaxed),
            renewal_failures: self.renewal_failures.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            releases_skipped: self.releases_skipped.load(Ordering::Relaxed),
            release_failures: self.release_failures.load(Ordering::Relaxed),
        }
    }
}

impl LockObserver for LockStats {
    fn on_event(&self, event: &LockEvent) {
        let counter = match event {
            LockEvent::Acquired { .. } => &self.acquired,
            LockEvent::AttemptFailed { .. } => &self.attempts_failed,
            LockEvent::NotObtained { .. } => &self.not_obtained,
            LockEvent::Renewed { .. } => &self.renewals,
            LockEvent::RenewalMissed { .. } => &self.renewals_missed,
            LockEvent::RenewalFailed { .. } => &self.renewal_failures,
            LockEvent::Released { .. } => &self.released,
            LockEvent::ReleaseSkipped { .. } => &self.releases_skipped,
            LockEvent::ReleaseFailed { .. } => &self.release_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

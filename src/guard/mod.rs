//! Lease-based distributed lock around a critical section.
//!
//! A [`LockGuard`] runs one critical section while holding one key in a shared
//! [`LockStore`]. A run goes through these states:
//!
//! ```text
//! Idle -> Acquiring -> Failed                       (retry limit exhausted)
//!                   -> Held -> Running -> Releasing -> Idle
//! ```
//!
//! 1. **Acquiring**: up to `retry_limit` conditional writes of a fresh token,
//!    with full-jitter backoff between attempts
//! 2. **Running**: the critical section and a lease heartbeat run as separate
//!    tasks; the first of {critical section finished, caller cancelled}
//!    decides the result
//! 3. **Releasing**: the heartbeat is stopped and the key is deleted only if
//!    it still holds this run's token
//!
//! # Single use
//!
//! [`LockGuard::run`] consumes the guard. Build a new guard for every logical
//! lock request; two callers can never drive the same token and `held` state.
//!
//! # Safety window
//!
//! This is best-effort mutual exclusion. If the store is unreachable long
//! enough for the lease to lapse while the critical section is still running,
//! another process can acquire the key. Renewal failures are visible through
//! `tracing` and the [`observer`](crate::observer) hook, not as run errors.
//!
//! # Example
//!
//! ```rust,no_run
//! use lockguard::guard::LockGuard;
//! use lockguard::store::MemoryStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), lockguard::core::LockError> {
//! let store = Arc::new(MemoryStore::new());
//!
//! let guard = LockGuard::builder(store, "invoices:close-month")
//!     .retry_limit(3)
//!     .lease(Duration::from_secs(10))
//!     .build()?;
//!
//! guard
//!     .run(CancellationToken::new(), |_cancel| async move {
//!         // only one process gets here at a time
//!         Ok(())
//!     })
//!     .await
//! # }
//! ```

mod heartbeat;
mod state;
mod supervisor;
pub mod token;

pub use token::{OsRngTokenSource, Token, TokenSource};

use crate::config::LockConfig;
use crate::constants::{
    DEFAULT_RETRY_LIMIT, KEY_PREFIX_SEPARATOR, default_heartbeat_interval, default_lease,
};
use crate::core::LockError;
use crate::observer::{LockEvent, LockObserver, NoopObserver};
use crate::store::LockStore;
use crate::utils::FullJitterBackoff;
use heartbeat::Heartbeat;
use state::LockState;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A single-use distributed lock around one critical section.
///
/// Created through [`LockGuard::new`] or [`LockGuard::builder`]; consumed by
/// [`LockGuard::run`].
pub struct LockGuard {
    store: Arc<dyn LockStore>,
    state: LockState,
    heartbeat_interval: Duration,
    backoff: FullJitterBackoff,
    tokens: Arc<dyn TokenSource>,
    observer: Arc<dyn LockObserver>,
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("state", &self.state)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl LockGuard {
    /// Create a guard for `key` with default options.
    ///
    /// Defaults: one attempt, 30s lease, 6s heartbeat.
    ///
    /// # Errors
    ///
    /// [`LockError::EmptyKey`] if `key` is empty.
    pub fn new(store: Arc<dyn LockStore>, key: impl Into<String>) -> Result<Self, LockError> {
        Self::builder(store, key).build()
    }

    /// Start configuring a guard for `key`.
    pub fn builder(store: Arc<dyn LockStore>, key: impl Into<String>) -> LockGuardBuilder {
        LockGuardBuilder::new(store, key.into())
    }

    /// The store key this guard contends for, including any prefix.
    pub fn key(&self) -> &str {
        self.state.key()
    }

    /// Lease applied on acquisition and on every renewal.
    pub fn lease(&self) -> Duration {
        self.state.lease()
    }

    /// Maximum number of acquisition attempts.
    pub fn retry_limit(&self) -> u32 {
        self.state.retry_limit()
    }

    /// Interval between lease renewals.
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Acquire the lock, run `critical_section` while holding it, then release.
    ///
    /// The critical section receives a clone of `cancel`. Returns:
    /// - `Ok(())` when the critical section succeeded
    /// - [`LockError::NotObtained`] when every attempt found the key held
    /// - [`LockError::Cancelled`] when `cancel` fired first; the call returns
    ///   without waiting for the critical section
    /// - [`LockError::Handler`] / [`LockError::Panicked`] when the critical
    ///   section failed
    ///
    /// Cancellation is not observed while acquiring. Release always runs
    /// once the lock was obtained, whatever the outcome; its own result is
    /// only logged.
    pub async fn run<F, Fut>(
        mut self,
        cancel: CancellationToken,
        critical_section: F,
    ) -> Result<(), LockError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.acquire().await?;

        let heartbeat = Heartbeat::start(
            Arc::clone(&self.store),
            Arc::clone(&self.observer),
            self.state.key().to_string(),
            self.state.lease(),
            self.heartbeat_interval,
        );

        let result = supervisor::supervise(
            self.state.key(),
            &cancel,
            heartbeat.stop_token(),
            critical_section,
        )
        .await;

        heartbeat.stop().await;
        self.state.release(self.store.as_ref(), self.observer.as_ref()).await;

        result
    }

    /// Try up to `retry_limit` times to write a fresh token under the key.
    async fn acquire(&mut self) -> Result<(), LockError> {
        let retry_limit = self.state.retry_limit();

        for attempt in 0..retry_limit {
            self.state.reset();

            match self.try_obtain().await {
                Ok(true) => {
                    self.state.mark_held();
                    debug!(
                        key = %self.state.key(),
                        token = ?self.state.token(),
                        attempt = attempt + 1,
                        "Lock acquired"
                    );
                    self.emit(LockEvent::Acquired {
                        key: self.state.key().to_string(),
                        attempt: attempt + 1,
                    });
                    return Ok(());
                }
                Ok(false) => {
                    debug!(key = %self.state.key(), attempt = attempt + 1, "Lock busy");
                    self.emit(LockEvent::AttemptFailed {
                        key: self.state.key().to_string(),
                        attempt: attempt + 1,
                        reason: None,
                    });
                }
                Err(reason) => {
                    debug!(
                        key = %self.state.key(),
                        attempt = attempt + 1,
                        error = %reason,
                        "Lock attempt failed"
                    );
                    self.emit(LockEvent::AttemptFailed {
                        key: self.state.key().to_string(),
                        attempt: attempt + 1,
                        reason: Some(reason),
                    });
                }
            }

            if attempt + 1 < retry_limit {
                tokio::time::sleep(self.backoff.delay(attempt)).await;
            }
        }

        self.emit(LockEvent::NotObtained {
            key: self.state.key().to_string(),
            attempts: retry_limit,
        });
        Err(LockError::NotObtained { key: self.state.key().to_string(), attempts: retry_limit })
    }

    /// One conditional write. `Err` carries why the attempt was abandoned;
    /// the caller treats it exactly like contention.
    async fn try_obtain(&mut self) -> Result<bool, String> {
        let token = self.tokens.generate().map_err(|e| e.to_string())?;
        let written = self
            .store
            .set_if_absent(self.state.key(), token.as_str(), self.state.lease())
            .await;
        self.state.set_candidate(token);
        written.map_err(|e| e.to_string())
    }

    fn emit(&self, event: LockEvent) {
        self.observer.on_event(&event);
    }
}

/// Builder for [`LockGuard`]; options are validated by [`build`](Self::build).
pub struct LockGuardBuilder {
    store: Arc<dyn LockStore>,
    key: String,
    key_prefix: Option<String>,
    retry_limit: u32,
    lease: Duration,
    heartbeat_interval: Duration,
    backoff: FullJitterBackoff,
    tokens: Arc<dyn TokenSource>,
    observer: Arc<dyn LockObserver>,
}

impl fmt::Debug for LockGuardBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuardBuilder")
            .field("key", &self.key)
            .field("key_prefix", &self.key_prefix)
            .field("retry_limit", &self.retry_limit)
            .field("lease", &self.lease)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl LockGuardBuilder {
    fn new(store: Arc<dyn LockStore>, key: String) -> Self {
        Self {
            store,
            key,
            key_prefix: None,
            retry_limit: DEFAULT_RETRY_LIMIT,
            lease: default_lease(),
            heartbeat_interval: default_heartbeat_interval(),
            backoff: FullJitterBackoff::default(),
            tokens: Arc::new(OsRngTokenSource),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replace the key given to [`LockGuard::builder`].
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Namespace the key as `{prefix}:{key}`.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Maximum number of acquisition attempts (at least 1).
    pub fn retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// Expiry set on the key when acquired and on each renewal.
    pub fn lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Interval between lease renewals while the critical section runs.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Backoff between acquisition attempts.
    pub fn backoff(mut self, backoff: FullJitterBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Source of ownership tokens.
    pub fn token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Receiver of run events.
    pub fn observer(mut self, observer: Arc<dyn LockObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Apply every option present in `config`.
    pub fn config(mut self, config: &LockConfig) -> Self {
        self.retry_limit = config.retry_limit;
        self.lease = config.lease();
        self.heartbeat_interval = config.heartbeat_interval();
        self.backoff = config.backoff();
        if let Some(prefix) = &config.key_prefix {
            self.key_prefix = Some(prefix.clone());
        }
        self
    }

    /// Validate the options and create the guard.
    ///
    /// # Errors
    ///
    /// - [`LockError::EmptyKey`] if the key is empty
    /// - [`LockError::InvalidOption`] for a zero retry limit, lease or
    ///   heartbeat interval, an empty prefix, or a backoff base above its cap
    pub fn build(self) -> Result<LockGuard, LockError> {
        if self.key.is_empty() {
            return Err(LockError::EmptyKey);
        }
        if self.retry_limit == 0 {
            return Err(invalid("retry_limit", "must be at least 1"));
        }
        if self.lease.is_zero() {
            return Err(invalid("lease", "must be greater than zero"));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(invalid("heartbeat_interval", "must be greater than zero"));
        }
        if self.backoff.base() > self.backoff.cap() {
            return Err(invalid(
                "backoff",
                format!(
                    "base {:?} is larger than cap {:?}",
                    self.backoff.base(),
                    self.backoff.cap()
                ),
            ));
        }

        let key = match &self.key_prefix {
            Some(prefix) if prefix.trim().is_empty() => {
                return Err(invalid("key_prefix", "must not be empty"));
            }
            Some(prefix) => format!("{prefix}{KEY_PREFIX_SEPARATOR}{}", self.key),
            None => self.key,
        };

        if self.heartbeat_interval >= self.lease {
            warn!(
                key = %key,
                lease_ms = self.lease.as_millis(),
                heartbeat_ms = self.heartbeat_interval.as_millis(),
                "Heartbeat interval not shorter than the lease; lock may expire between renewals"
            );
        }

        Ok(LockGuard {
            store: self.store,
            state: LockState::new(key, self.lease, self.retry_limit),
            heartbeat_interval: self.heartbeat_interval,
            backoff: self.backoff,
            tokens: self.tokens,
            observer: self.observer,
        })
    }
}

fn invalid(option: &'static str, reason: impl Into<String>) -> LockError {
    LockError::InvalidOption { option, reason: reason.into() }
}

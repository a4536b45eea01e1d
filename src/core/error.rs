//! Error types for lock guard operations.
//!
//! The error system follows the lifecycle of a single run:
//! - **Construction**: [`LockError::EmptyKey`], [`LockError::InvalidOption`]
//! - **Acquisition**: [`LockError::NotObtained`]
//! - **Execution**: [`LockError::Cancelled`], [`LockError::Panicked`], [`LockError::Handler`]
//!
//! Store failures never appear in [`LockError`]. They are absorbed where they
//! happen: a failed conditional write counts as a lost attempt, and renewal or
//! release failures are logged and reported to the observer only.
//!
//! # Examples
//!
//! ```rust,no_run
//! use lockguard::core::LockError;
//!
//! fn should_retry_later(error: &LockError) -> bool {
//!     match error {
//!         LockError::NotObtained { .. } => true,
//!         LockError::Cancelled => false,
//!         _ => false,
//!     }
//! }
//! ```

use std::any::Any;
use thiserror::Error;

/// The error returned by [`LockGuard::run`](crate::guard::LockGuard::run) and by
/// guard construction.
///
/// Exactly one of these (or success) is produced per run.
#[derive(Error, Debug)]
pub enum LockError {
    /// The lock key was empty after applying overrides.
    #[error("lock key must not be empty")]
    EmptyKey,

    /// A construction option was rejected.
    #[error("invalid lock option `{option}`: {reason}")]
    InvalidOption {
        /// Name of the rejected option
        option: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Every acquisition attempt found the key held (or the store failing).
    ///
    /// Retryable by the caller at a higher level.
    #[error("key: {key}, err: lock not obtained after {attempts} attempt(s)")]
    NotObtained {
        /// The contended key
        key: String,
        /// Number of attempts made
        attempts: u32,
    },

    /// The caller's cancellation token fired before the critical section finished.
    #[error("lock run cancelled before the critical section finished")]
    Cancelled,

    /// The critical section panicked. The payload is preserved when it was an
    /// error value, otherwise it carries the formatted panic message.
    #[error("critical section panicked: {0:#}")]
    Panicked(anyhow::Error),

    /// The critical section returned an error.
    #[error(transparent)]
    Handler(anyhow::Error),
}

impl LockError {
    /// Check if this is a contention failure the caller may retry later.
    pub fn is_not_obtained(&self) -> bool {
        matches!(self, LockError::NotObtained { .. })
    }

    /// Check if the run ended because the caller cancelled it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LockError::Cancelled)
    }

    /// Build a [`LockError::Panicked`] from a caught panic payload.
    ///
    /// `anyhow::Error` and boxed `std::error::Error` payloads are kept as-is;
    /// string payloads become the error message; anything else is reported
    /// with a placeholder since it cannot be formatted.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<anyhow::Error>() {
            Ok(error) => return LockError::Panicked(*error),
            Err(payload) => payload,
        };
        let payload = match payload.downcast::<Box<dyn std::error::Error + Send + Sync>>() {
            Ok(error) => return LockError::Panicked(anyhow::anyhow!(*error)),
            Err(payload) => payload,
        };
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-displayable panic payload".to_string()
        };
        LockError::Panicked(anyhow::anyhow!(message))
    }
}

/// Failure reported by a [`LockStore`](crate::store::LockStore) implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store was reached but the command failed.
    #[error("store command failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Failure to produce an ownership token.
#[derive(Error, Debug)]
#[error("failed to generate lock token: {0}")]
pub struct TokenError(pub String);

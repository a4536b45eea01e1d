//! Lease-based distributed locking for critical sections.
//!
//! `lockguard` lets independent processes take turns running a critical
//! section, using a shared key-value store (typically Redis) as the arbiter.
//! A run acquires a key with a fresh random token, keeps its lease alive with
//! a heartbeat while the critical section executes, and releases it with an
//! atomic compare-and-delete so that a lock which expired and was re-acquired
//! elsewhere is never deleted by mistake.
//!
//! # Modules
//!
//! - [`guard`] - the lock guard: acquisition, heartbeat, supervision, release
//! - [`store`] - the store contract and an in-memory implementation
//! - [`config`] - lock options and TOML loading
//! - [`observer`] - event hooks for renewal and release outcomes
//! - [`core`] - error types
//! - [`utils`] - full-jitter backoff
//!
//! # Guarantees
//!
//! Mutual exclusion is best effort. It holds while the store is reachable and
//! renewals land before the lease runs out; it is not a consensus protocol.
//!
//! # Example
//!
//! ```rust,no_run
//! use lockguard::guard::LockGuard;
//! use lockguard::store::MemoryStore;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), lockguard::core::LockError> {
//! let store = Arc::new(MemoryStore::new());
//! let cancel = CancellationToken::new();
//!
//! LockGuard::new(store, "rebuild-search-index")?
//!     .run(cancel, |_cancel| async move {
//!         // exclusive work
//!         Ok(())
//!     })
//!     .await
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod core;
pub mod guard;
pub mod observer;
pub mod store;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::core::LockError;
pub use guard::{LockGuard, LockGuardBuilder};
pub use store::{LockStore, MemoryStore};

//! Test utilities for lockguard.
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests under `tests/`.
//!
//! - [`init_test_logging`] wires `tracing` output into the test harness
//! - [`FaultyStore`] wraps a [`MemoryStore`] to count calls and inject
//!   store failures per operation
//!
//! # Example
//!
//! ```rust,no_run
//! use lockguard::test_utils::FaultyStore;
//!
//! let store = FaultyStore::new();
//! store.fail_extend(true);
//! // every heartbeat tick now fails; acquisition and release still work
//! ```

use crate::core::StoreError;
use crate::store::{LockStore, MemoryStore};
use async_trait::async_trait;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=lockguard=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// A [`MemoryStore`] with switchable failures and per-operation call counts.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_set: AtomicBool,
    fail_extend: AtomicBool,
    fail_delete: AtomicBool,
    set_calls: AtomicUsize,
    extend_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl FaultyStore {
    /// A store with no failures switched on.
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying store, for inspecting or seeding keys.
    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    /// Make `set_if_absent` fail.
    pub fn fail_set(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    /// Make `extend` fail.
    pub fn fail_extend(&self, fail: bool) {
        self.fail_extend.store(fail, Ordering::SeqCst);
    }

    /// Make `compare_and_delete` fail.
    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Number of `set_if_absent` calls so far.
    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    /// Number of `extend` calls so far.
    pub fn extend_calls(&self) -> usize {
        self.extend_calls.load(Ordering::SeqCst)
    }

    /// Number of `compare_and_delete` calls so far.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

fn injected(operation: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {operation} failure"))
}

#[async_trait]
impl LockStore for FaultyStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(injected("set"));
        }
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn extend(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.extend_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_extend.load(Ordering::SeqCst) {
            return Err(injected("extend"));
        }
        self.inner.extend(key, ttl).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.compare_and_delete(key, expected).await
    }
}

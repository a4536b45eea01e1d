//! The key-value store contract the lock guard arbitrates through.
//!
//! The guard never talks to a concrete database. It needs exactly three atomic
//! operations, each of which a single Redis command (or script) provides:
//!
//! | Operation              | Redis equivalent                              |
//! |------------------------|-----------------------------------------------|
//! | [`LockStore::set_if_absent`]      | `SET key value NX PX ttl`          |
//! | [`LockStore::extend`]             | `PEXPIRE key ttl`                  |
//! | [`LockStore::compare_and_delete`] | `EVAL` [`COMPARE_AND_DELETE_SCRIPT`] |
//!
//! [`MemoryStore`] implements the contract in-process and is what the crate's
//! own tests run against.

pub mod memory;

pub use memory::MemoryStore;

use crate::core::StoreError;
use async_trait::async_trait;
use std::time::Duration;

/// Lua script that deletes `KEYS[1]` only if its value equals `ARGV[1]`.
///
/// Running the comparison store-side is what makes release safe: a separate
/// `GET` followed by `DEL` could delete a lock that expired and was taken by
/// another holder in between.
pub const COMPARE_AND_DELETE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
	return redis.call("del", KEYS[1])
else
	return 0
end"#;

/// Atomic operations a shared store must provide to arbitrate a lock.
///
/// Every method must be a single atomic operation on the store side. The
/// guard calls them from spawned tasks, so implementations must be
/// `Send + Sync`.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key` to `value` with the given expiry, only if `key` is absent.
    ///
    /// Returns `true` when the write happened.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Reset the expiry of `key` to `ttl` from now.
    ///
    /// Returns `false` when the key no longer exists.
    async fn extend(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Delete `key` only if its current value equals `expected`.
    ///
    /// Returns `true` when the key was deleted.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;
}

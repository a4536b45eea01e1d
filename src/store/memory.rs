//! In-process [`LockStore`] with real expiry semantics.
//!
//! Keys expire lazily: an expired entry is treated as absent by every
//! operation and removed the next time it is touched. Atomicity of each
//! operation comes from the per-shard locking of [`DashMap`]'s entry API.

use super::LockStore;
use crate::core::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    fn new(value: &str, ttl: Duration) -> Self {
        Self { value: value.to_string(), expires_at: Instant::now() + ttl }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A [`LockStore`] kept in memory, shared between tasks of one process.
///
/// Useful for tests and single-process deployments. Clone the surrounding
/// `Arc` to share one store between several guards.
///
/// # Example
///
/// ```rust,no_run
/// use lockguard::store::{LockStore, MemoryStore};
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = MemoryStore::new();
/// assert!(store.set_if_absent("report", "a", Duration::from_secs(5)).await?);
/// assert!(!store.set_if_absent("report", "b", Duration::from_secs(5)).await?);
/// assert_eq!(store.get("report").as_deref(), Some("a"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key`, if present and not expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());
        if value.is_none() {
            self.evict_expired(key, now);
        }
        value
    }

    /// Remaining time before `key` expires, if present.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let remaining = self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at.saturating_duration_since(now));
        if remaining.is_none() {
            self.evict_expired(key, now);
        }
        remaining
    }

    /// Check whether `key` is present and not expired.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Unconditionally set `key`, replacing any current value.
    ///
    /// Lets tests play the part of another holder.
    pub fn insert(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.insert(key.to_string(), StoredValue::new(value, ttl));
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|entry| !entry.is_expired(now)).count()
    }

    /// Check whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove `key` if its entry has expired. The read guard must be released first.
    fn evict_expired(&self, key: &str, now: Instant) {
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
    }

    /// Drop every expired entry, returning how many were removed.
    ///
    /// Expired keys are also dropped whenever they are read, written or
    /// released; this sweeps keys nobody touches again.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(StoredValue::new(value, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn extend(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.remove();
                    Ok(false)
                } else {
                    occupied.get_mut().expires_at = now + ttl;
                    Ok(true)
                }
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        // An expired entry is removed too, but counts as absent
        let removed = self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now) || entry.value == expected);
        Ok(removed.is_some_and(|(_, entry)| !entry.is_expired(now)))
    }
}

//! Lock options loaded from TOML.

use crate::constants::{
    DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_LEASE_MS, DEFAULT_RETRY_LIMIT, MAX_BACKOFF_DELAY_MS,
    STARTING_BACKOFF_DELAY_MS,
};
use crate::utils::FullJitterBackoff;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Options for lock guards, as they appear in a host's configuration file.
///
/// Every field is optional in TOML; missing fields take the defaults used by
/// [`LockGuard::builder`](crate::guard::LockGuard::builder). Values are only
/// validated when the config is applied to a builder and built.
///
/// # Example
///
/// ```toml
/// retry_limit = 3
/// lease_ms = 10000
/// heartbeat_interval_ms = 2000
/// key_prefix = "billing"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Maximum acquisition attempts per run.
    pub retry_limit: u32,

    /// Lease on the lock key, in milliseconds.
    pub lease_ms: u64,

    /// Interval between lease renewals, in milliseconds.
    pub heartbeat_interval_ms: u64,

    /// Starting ceiling of the backoff between attempts, in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum ceiling of the backoff between attempts, in milliseconds.
    pub backoff_cap_ms: u64,

    /// Namespace prepended to every key as `{prefix}:{key}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            lease_ms: DEFAULT_LEASE_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            backoff_base_ms: STARTING_BACKOFF_DELAY_MS,
            backoff_cap_ms: MAX_BACKOFF_DELAY_MS,
            key_prefix: None,
        }
    }
}

impl LockConfig {
    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or a field has the wrong type.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse lock configuration")
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read lock config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid lock config in {}", path.display()))
    }

    /// Load a configuration file if it exists, otherwise return the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load_from(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize lock configuration")
    }

    /// Lease as a [`Duration`].
    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Backoff between acquisition attempts.
    pub fn backoff(&self) -> FullJitterBackoff {
        FullJitterBackoff::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_cap_ms),
        )
    }
}

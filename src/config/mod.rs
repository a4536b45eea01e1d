//! Configuration for lock guards.
//!
//! Hosts usually keep lock options next to the rest of their settings. A
//! [`LockConfig`] can be parsed from TOML, loaded from a file, and applied to a
//! [`LockGuardBuilder`](crate::guard::LockGuardBuilder):
//!
//! ```rust,no_run
//! use lockguard::config::LockConfig;
//! use lockguard::guard::LockGuard;
//! use lockguard::store::MemoryStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = LockConfig::load_or_default(Path::new("/etc/myapp/lock.toml")).await?;
//! let guard = LockGuard::builder(Arc::new(MemoryStore::new()), "daily-export")
//!     .config(&config)
//!     .build()?;
//! # let _ = guard;
//! # Ok(())
//! # }
//! ```

mod lock;

pub use lock::LockConfig;

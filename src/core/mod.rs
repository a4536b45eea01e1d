//! Core types shared across the lock guard.
//!
//! Currently this is the error taxonomy; see [`error`] for details.

pub mod error;

pub use error::{LockError, StoreError, TokenError};

//! Supporting utilities for the lock guard.

pub mod backoff;

pub use backoff::FullJitterBackoff;

//! Per-run lock state and the atomic release step.

use super::token::Token;
use crate::observer::{LockEvent, LockObserver};
use crate::store::LockStore;
use std::time::Duration;
use tracing::{debug, warn};

/// What [`LockState::release`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseOutcome {
    /// This instance never held the lock; nothing was sent to the store.
    NotHeld,
    /// The key held our token and was deleted.
    Deleted,
    /// The key was gone or held a different token; it was left alone.
    NotOwner,
    /// The store call failed.
    Failed,
}

/// Key, ownership token, lease and `held` flag of one lock run.
///
/// `held` is true only between a confirmed conditional write and release;
/// [`reset`](Self::reset) clears it together with the token before each
/// attempt so a token never outlives the attempt that generated it.
#[derive(Debug)]
pub(crate) struct LockState {
    key: String,
    token: Option<Token>,
    lease: Duration,
    retry_limit: u32,
    held: bool,
}

impl LockState {
    pub(crate) fn new(key: String, lease: Duration, retry_limit: u32) -> Self {
        Self { key, token: None, lease, retry_limit, held: false }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn lease(&self) -> Duration {
        self.lease
    }

    pub(crate) fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    pub(crate) fn is_held(&self) -> bool {
        self.held
    }

    pub(crate) fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Forget the previous attempt.
    pub(crate) fn reset(&mut self) {
        self.held = false;
        self.token = None;
    }

    /// Record the token about to be written. Not held until confirmed.
    pub(crate) fn set_candidate(&mut self, token: Token) {
        self.held = false;
        self.token = Some(token);
    }

    /// The store confirmed the conditional write of the candidate token.
    pub(crate) fn mark_held(&mut self) {
        debug_assert!(self.token.is_some(), "held without a token");
        self.held = self.token.is_some();
    }

    /// Delete the key if, store-side, it still holds our token.
    ///
    /// A no-op unless this instance believes it holds the lock. The outcome is
    /// logged and reported to the observer but never returned to the caller
    /// of the run.
    pub(crate) async fn release(
        &mut self,
        store: &dyn LockStore,
        observer: &dyn LockObserver,
    ) -> ReleaseOutcome {
        let token = match (self.held, self.token.as_ref()) {
            (true, Some(token)) => token,
            _ => return ReleaseOutcome::NotHeld,
        };

        let (outcome, event) = match store.compare_and_delete(&self.key, token.as_str()).await {
            Ok(true) => {
                debug!(key = %self.key, ?token, "Lock released");
                (ReleaseOutcome::Deleted, LockEvent::Released { key: self.key.clone() })
            }
            Ok(false) => {
                warn!(
                    key = %self.key,
                    ?token,
                    "Lock not released: lease expired or key now owned by another holder"
                );
                (ReleaseOutcome::NotOwner, LockEvent::ReleaseSkipped { key: self.key.clone() })
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to release lock");
                (
                    ReleaseOutcome::Failed,
                    LockEvent::ReleaseFailed { key: self.key.clone(), error: e.to_string() },
                )
            }
        };
        observer.on_event(&event);

        self.held = false;
        outcome
    }
}

//! Runs the critical section and races it against caller cancellation.

use crate::core::LockError;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run `critical_section` on its own task and wait for whichever comes first:
/// its outcome, or cancellation of `cancel`.
///
/// The critical section receives a clone of `cancel`. A panic inside it, even
/// one raised while building its future, is caught on the task and reported
/// as [`LockError::Panicked`]. When the critical section ends, normally or
/// not, `heartbeat_stop` is cancelled before the outcome is sent.
///
/// If cancellation wins, the critical section task is left running with its
/// own (cancelled) token and its eventual outcome is discarded.
pub(crate) async fn supervise<F, Fut>(
    key: &str,
    cancel: &CancellationToken,
    heartbeat_stop: CancellationToken,
    critical_section: F,
) -> Result<(), LockError>
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let (outcome_tx, outcome_rx) = oneshot::channel::<Result<(), LockError>>();
    let section_cancel = cancel.clone();
    let task_key = key.to_string();

    tokio::spawn(async move {
        let caught = AssertUnwindSafe(async move { critical_section(section_cancel).await })
            .catch_unwind()
            .await;
        heartbeat_stop.cancel();

        let outcome = match caught {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(LockError::Handler(e)),
            Err(payload) => {
                let error = LockError::from_panic(payload);
                warn!(key = %task_key, error = %error, "Critical section panicked");
                Err(error)
            }
        };
        // The supervisor may have stopped listening after a cancellation
        let _ = outcome_tx.send(outcome);
    });

    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(key = %key, "Lock run cancelled by caller");
            Err(LockError::Cancelled)
        }
        outcome = outcome_rx => outcome.unwrap_or_else(|_| {
            Err(LockError::Panicked(anyhow::anyhow!(
                "critical section task ended without reporting an outcome"
            )))
        }),
    }
}

//! Lease renewal while the critical section runs.

use crate::observer::{LockEvent, LockObserver};
use crate::store::LockStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// A background task that extends the lease on a held key every `interval`.
///
/// Renewal is best effort. Failed ticks are logged and reported to the
/// observer, never to the critical section. The task ends when its stop
/// token is cancelled, which both the critical-section runner (on finish or
/// panic) and the supervisor (before release) do.
#[derive(Debug)]
pub(crate) struct Heartbeat {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Spawn the renewal task. The first renewal happens one interval from now.
    pub(crate) fn start(
        store: Arc<dyn LockStore>,
        observer: Arc<dyn LockObserver>,
        key: String,
        lease: Duration,
        interval: Duration,
    ) -> Self {
        let stop = CancellationToken::new();
        let task_stop = stop.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(key = %key, interval_ms = interval.as_millis(), "Heartbeat started");

            loop {
                tokio::select! {
                    biased;
                    () = task_stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let renewal = tokio::select! {
                    biased;
                    () = task_stop.cancelled() => break,
                    renewal = store.extend(&key, lease) => renewal,
                };

                let event = match renewal {
                    Ok(true) => {
                        trace!(key = %key, "Lease renewed");
                        LockEvent::Renewed { key: key.clone() }
                    }
                    Ok(false) => {
                        warn!(key = %key, "Lease renewal found no key; the lock has expired");
                        LockEvent::RenewalMissed { key: key.clone() }
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Lease renewal failed");
                        LockEvent::RenewalFailed { key: key.clone(), error: e.to_string() }
                    }
                };
                observer.on_event(&event);
            }

            debug!(key = %key, "Heartbeat stopped");
        });

        Self { stop, handle }
    }

    /// A handle that stops the heartbeat when cancelled.
    pub(crate) fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Signal the task to stop and wait until it has.
    pub(crate) async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.handle.await {
            debug!(error = %e, "Heartbeat task ended abnormally");
        }
    }
}

use crate::common::fast_guard;
use lockguard::LockError;
use lockguard::constants::MAX_BACKOFF_DELAY_MS;
use lockguard::observer::LockStats;
use lockguard::test_utils::FaultyStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// Paused clock: elapsed time is exactly the total of the backoff sleeps
#[tokio::test(start_paused = true)]
async fn test_held_key_exhausts_every_attempt() {
    let store = Arc::new(FaultyStore::new());
    store.memory().insert("reindex", "someone-else", Duration::from_secs(30));
    let stats = Arc::new(LockStats::new());
    let ran = Arc::new(AtomicBool::new(false));

    let flag = ran.clone();
    let start = Instant::now();
    let result = fast_guard(store.clone(), "reindex")
        .retry_limit(3)
        .observer(stats.clone())
        .build()
        .unwrap()
        .run(CancellationToken::new(), move |_| async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

    match result {
        Err(LockError::NotObtained { key, attempts }) => {
            assert_eq!(key, "reindex");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected NotObtained, got {other:?}"),
    }
    assert_eq!(store.set_calls(), 3);
    // Two sleeps between three attempts, none after the last
    let elapsed = start.elapsed();
    assert!(elapsed <= Duration::from_millis(2 * MAX_BACKOFF_DELAY_MS), "backoff took {elapsed:?}");
    // Ceilings for attempts 0 and 1 are 20ms and 40ms
    assert!(elapsed <= Duration::from_millis(60), "backoff above its ceilings: {elapsed:?}");
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(store.delete_calls(), 0, "release attempted for a lock never held");
    assert_eq!(store.memory().get("reindex").as_deref(), Some("someone-else"));

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.attempts_failed, 3);
    assert_eq!(snapshot.not_obtained, 1);
    assert_eq!(snapshot.acquired, 0);
}

#[tokio::test(start_paused = true)]
async fn test_default_retry_limit_makes_one_attempt() {
    let store = Arc::new(FaultyStore::new());
    store.memory().insert("nightly", "someone-else", Duration::from_secs(30));

    let start = Instant::now();
    let err = fast_guard(store.clone(), "nightly")
        .build()
        .unwrap()
        .run(CancellationToken::new(), |_| async { Ok(()) })
        .await
        .unwrap_err();

    assert!(err.is_not_obtained());
    assert_eq!(err.to_string(), "key: nightly, err: lock not obtained after 1 attempt(s)");
    assert_eq!(store.set_calls(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO, "slept after the only attempt");
}

#[tokio::test(start_paused = true)]
async fn test_store_errors_count_as_failed_attempts() {
    let store = Arc::new(FaultyStore::new());
    store.fail_set(true);

    let start = Instant::now();
    let err = fast_guard(store.clone(), "billing")
        .retry_limit(2)
        .build()
        .unwrap()
        .run(CancellationToken::new(), |_| async { Ok(()) })
        .await
        .unwrap_err();

    assert!(matches!(err, LockError::NotObtained { attempts: 2, .. }));
    assert_eq!(store.set_calls(), 2);
    // One backoff between the two attempts, capped by the first ceiling
    assert!(start.elapsed() <= Duration::from_millis(20));
    assert!(store.memory().is_empty());
}

#[tokio::test]
async fn test_acquires_once_previous_holder_expires() {
    let store = Arc::new(FaultyStore::new());
    // A holder that crashed: its lease runs out without a release
    store.memory().insert("cleanup", "crashed-owner", Duration::from_millis(60));

    fast_guard(store.clone(), "cleanup")
        .retry_limit(100)
        .build()
        .unwrap()
        .run(CancellationToken::new(), |_| async { Ok(()) })
        .await
        .unwrap();

    assert!(store.set_calls() > 1);
    assert!(store.memory().is_empty());
}

#[tokio::test]
async fn test_key_prefix_namespaces_the_stored_key() {
    let store = Arc::new(FaultyStore::new());
    let observed = store.clone();

    fast_guard(store.clone(), "rollup")
        .key_prefix("jobs")
        .build()
        .unwrap()
        .run(CancellationToken::new(), move |_| async move {
            assert!(observed.memory().contains_key("jobs:rollup"));
            assert!(!observed.memory().contains_key("rollup"));
            Ok(())
        })
        .await
        .unwrap();

    assert!(store.memory().is_empty());
}

use crate::common::{FAST_HEARTBEAT, SHORT_LEASE, fast_guard};
use lockguard::guard::LockGuard;
use lockguard::observer::LockStats;
use lockguard::store::MemoryStore;
use lockguard::test_utils::FaultyStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_heartbeat_outlives_short_lease() {
    let store = Arc::new(MemoryStore::new());
    let observed = store.clone();
    let stats = Arc::new(LockStats::new());

    fast_guard(store.clone(), "rebuild")
        .observer(stats.clone())
        .build()
        .unwrap()
        .run(CancellationToken::new(), move |_| async move {
            // Run for several leases, checking the key is still ours each time
            for _ in 0..5 {
                tokio::time::sleep(SHORT_LEASE - Duration::from_millis(20)).await;
                assert!(observed.contains_key("rebuild"), "lease expired mid-run");
            }
            Ok(())
        })
        .await
        .unwrap();

    assert!(!store.contains_key("rebuild"));
    let snapshot = stats.snapshot();
    assert!(snapshot.renewals >= 5, "too few renewals: {snapshot:?}");
    assert_eq!(snapshot.released, 1);
}

#[tokio::test]
async fn test_lapsed_lease_is_not_released_over_new_owner() {
    let store = Arc::new(MemoryStore::new());
    let stats = Arc::new(LockStats::new());
    let thief_store = store.clone();

    // Heartbeat slower than the lease: the key lapses while the section runs
    LockGuard::builder(store.clone(), "export")
        .lease(Duration::from_millis(50))
        .heartbeat_interval(Duration::from_secs(5))
        .observer(stats.clone())
        .build()
        .unwrap()
        .run(CancellationToken::new(), move |_| async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            fast_guard(thief_store.clone(), "export")
                .lease(Duration::from_secs(5))
                .build()
                .unwrap()
                .run(CancellationToken::new(), |_| async { Ok(()) })
                .await?;
            // A third party takes the key and keeps it
            thief_store.insert("export", "other-owner", Duration::from_secs(5));
            Ok::<(), anyhow::Error>(())
        })
        .await
        .unwrap();

    assert_eq!(store.get("export").as_deref(), Some("other-owner"));
    assert_eq!(stats.snapshot().releases_skipped, 1);
}

#[tokio::test]
async fn test_renewal_failures_do_not_fail_the_run() {
    let store = Arc::new(FaultyStore::new());
    store.fail_extend(true);
    let stats = Arc::new(LockStats::new());

    fast_guard(store.clone(), "sweeper")
        .lease(Duration::from_secs(5))
        .observer(stats.clone())
        .build()
        .unwrap()
        .run(CancellationToken::new(), |_| async {
            tokio::time::sleep(FAST_HEARTBEAT * 5).await;
            Ok(())
        })
        .await
        .unwrap();

    let snapshot = stats.snapshot();
    assert!(snapshot.renewal_failures >= 2, "failures not reported: {snapshot:?}");
    assert_eq!(snapshot.renewals, 0);
    assert_eq!(snapshot.released, 1);
    assert!(!store.memory().contains_key("sweeper"));
}

#[tokio::test]
async fn test_heartbeat_stops_when_run_returns() {
    let store = Arc::new(FaultyStore::new());

    fast_guard(store.clone(), "compact")
        .build()
        .unwrap()
        .run(CancellationToken::new(), |_| async {
            tokio::time::sleep(FAST_HEARTBEAT * 4).await;
            Ok(())
        })
        .await
        .unwrap();

    let calls = store.extend_calls();
    assert!(calls >= 1);
    tokio::time::sleep(FAST_HEARTBEAT * 5).await;
    assert_eq!(store.extend_calls(), calls, "heartbeat kept renewing after release");
}

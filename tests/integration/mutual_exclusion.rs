use crate::common::{Occupancy, fast_guard};
use lockguard::LockError;
use lockguard::guard::LockGuard;
use lockguard::store::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_overlapping_runs_only_one_holds() {
    lockguard::test_utils::init_test_logging(None);
    let store = Arc::new(MemoryStore::new());
    let barrier = Arc::new(Barrier::new(2));

    let holder_store = store.clone();
    let holder_barrier = barrier.clone();
    let holder = tokio::spawn(async move {
        fast_guard(holder_store, "payroll")
            .build()
            .unwrap()
            .run(CancellationToken::new(), move |_| async move {
                holder_barrier.wait().await; // signal that the lock is held
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await
    });

    barrier.wait().await;
    let contender = LockGuard::new(store.clone(), "payroll")
        .unwrap()
        .run(CancellationToken::new(), |_| async {
            Err(anyhow::anyhow!("second holder entered the critical section"))
        })
        .await;

    match contender {
        Err(LockError::NotObtained { key, attempts }) => {
            assert_eq!(key, "payroll");
            assert_eq!(attempts, 1);
        }
        other => panic!("expected NotObtained, got {other:?}"),
    }
    holder.await.unwrap().unwrap();
    assert!(!store.contains_key("payroll"));
}

#[tokio::test]
async fn test_concurrent_runs_never_overlap() {
    let store = Arc::new(MemoryStore::new());
    let occupancy = Occupancy::new();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let occupancy = occupancy.clone();
        handles.push(tokio::spawn(async move {
            fast_guard(store, "ledger")
                .retry_limit(200)
                .build()
                .unwrap()
                .run(CancellationToken::new(), move |_| async move {
                    occupancy.enter();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    occupancy.exit();
                    Ok(())
                })
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(e) => assert!(e.is_not_obtained(), "unexpected error: {e}"),
        }
    }

    assert!(succeeded >= 1);
    assert_eq!(occupancy.entries(), succeeded);
    assert_eq!(occupancy.peak(), 1, "two critical sections ran at once");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_different_keys_do_not_contend() {
    let store = Arc::new(MemoryStore::new());
    let occupancy = Occupancy::new();
    let barrier = Arc::new(Barrier::new(2));

    let mut handles = Vec::new();
    for key in ["orders", "invoices"] {
        let store = store.clone();
        let occupancy = occupancy.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            fast_guard(store, key)
                .build()
                .unwrap()
                .run(CancellationToken::new(), move |_| async move {
                    occupancy.enter();
                    // both must be inside at the same time to pass the barrier
                    barrier.wait().await;
                    occupancy.exit();
                    Ok(())
                })
                .await
        }));
    }

    for handle in handles {
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("independent keys blocked each other")
            .unwrap()
            .unwrap();
    }
    assert_eq!(occupancy.peak(), 2);
}

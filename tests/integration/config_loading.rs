use lockguard::config::LockConfig;
use lockguard::guard::LockGuard;
use lockguard::test_utils::FaultyStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_guard_built_from_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("lock.toml");
    tokio::fs::write(
        &path,
        r#"
retry_limit = 4
lease_ms = 200
heartbeat_interval_ms = 40
backoff_base_ms = 5
backoff_cap_ms = 10
key_prefix = "reports"
"#,
    )
    .await
    .unwrap();

    let config = LockConfig::load_from(&path).await.unwrap();
    let store = Arc::new(FaultyStore::new());
    store.memory().insert("reports:weekly", "someone-else", Duration::from_secs(30));

    let guard = LockGuard::builder(store.clone(), "weekly").config(&config).build().unwrap();
    assert_eq!(guard.key(), "reports:weekly");
    assert_eq!(guard.retry_limit(), 4);
    assert_eq!(guard.lease(), Duration::from_millis(200));
    assert_eq!(guard.heartbeat_interval(), Duration::from_millis(40));

    let err = guard.run(CancellationToken::new(), |_| async { Ok(()) }).await.unwrap_err();
    assert!(err.is_not_obtained());
    assert_eq!(store.set_calls(), 4);
}

#[tokio::test]
async fn test_missing_config_file_uses_defaults() {
    let temp = TempDir::new().unwrap();
    let config = LockConfig::load_or_default(&temp.path().join("absent.toml")).await.unwrap();
    assert_eq!(config, LockConfig::default());

    let guard =
        LockGuard::builder(Arc::new(FaultyStore::new()), "job").config(&config).build().unwrap();
    assert_eq!(guard.retry_limit(), 1);
    assert_eq!(guard.lease(), Duration::from_secs(30));
}

#[tokio::test]
async fn test_invalid_config_is_rejected_at_build() {
    let config = LockConfig::from_toml_str("retry_limit = 0").unwrap();

    let err = LockGuard::builder(Arc::new(FaultyStore::new()), "job")
        .config(&config)
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("retry_limit"), "unexpected error: {err}");
}

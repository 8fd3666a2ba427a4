//! Start, stop and readiness.

use super::*;
use cache_fallback::{CacheError, Origin};

#[tokio::test]
async fn test_readiness_follows_lifecycle() {
    let primary = TestBackend::new();
    let secondary = TestBackend::new();
    let conn = builder(&primary, &secondary).build().unwrap();

    assert!(!conn.is_ready());
    conn.start().await.unwrap();
    assert!(conn.is_ready());
    conn.stop().await.unwrap();
    assert!(!conn.is_ready());
}

#[tokio::test]
async fn test_readiness_with_one_backend_available() {
    let primary = TestBackend::new();
    let secondary = TestBackend::new();
    let conn = builder(&primary, &secondary).build().unwrap();
    conn.start().await.unwrap();

    // Secondary alone
    primary.set_ready(false);
    assert!(conn.is_ready());

    // Primary alone, while healthy
    primary.set_ready(true);
    secondary.set_ready(false);
    assert!(conn.is_ready());

    // Primary alone, once demoted
    primary.set_failing(true);
    secondary.set_failing(false);
    conn.get(&key("a")).await.unwrap();
    assert!(!conn.is_ready());

    secondary.set_ready(true);
    assert!(conn.is_ready());

    // Neither
    primary.set_ready(false);
    secondary.set_ready(false);
    assert!(!conn.is_ready());
}

#[tokio::test]
async fn test_always_ready_overrides_everything() {
    let primary = TestBackend::new();
    let secondary = TestBackend::new();
    primary.set_ready(false);
    secondary.set_ready(false);
    let conn = builder(&primary, &secondary)
        .always_ready(true)
        .build()
        .unwrap();

    assert!(conn.is_ready());
    conn.start().await.unwrap();
    assert!(conn.is_ready());
    conn.stop().await.unwrap();
    assert!(conn.is_ready());
}

#[tokio::test]
async fn test_secondary_start_failure_fails_start() {
    let primary = TestBackend::new();
    let secondary = TestBackend::new();
    secondary.refuse_start();
    let conn = builder(&primary, &secondary)
        .primary_optional_at_start(true)
        .build()
        .unwrap();

    let err = conn.start().await.unwrap_err();
    assert!(matches!(
        err,
        CacheError::Lifecycle {
            role: Origin::Secondary,
            action: "start",
            ..
        }
    ));
    assert!(err.to_string().starts_with("failed to start secondary backend"));
    assert!(!conn.is_ready());
}

#[tokio::test]
async fn test_primary_start_failure_is_fatal_by_default() {
    let primary = TestBackend::new();
    let secondary = TestBackend::new();
    primary.refuse_start();
    let conn = builder(&primary, &secondary).build().unwrap();

    let err = conn.start().await.unwrap_err();
    assert!(matches!(
        err,
        CacheError::Lifecycle {
            role: Origin::Primary,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_optional_primary_start_failure_demotes() {
    let primary = TestBackend::new();
    let secondary = TestBackend::new();
    primary.refuse_start();
    let log = EventLog::default();
    let conn = builder(&primary, &secondary)
        .primary_optional_at_start(true)
        .recovery_delay(Duration::from_secs(1))
        .on_event(log.listener())
        .build()
        .unwrap();

    conn.start().await.unwrap();
    assert!(conn.is_ready());
    assert!(!conn.health().healthy);
    assert!(conn.health().recovery_armed);
    assert_eq!(log.types(), vec!["primary_demoted"]);

    conn.set(&key("a"), Bytes::from_static(b"1"), ttl())
        .await
        .unwrap();
    assert_eq!(primary.calls(), 0);
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test]
async fn test_stop_then_operations_are_disconnected() {
    let primary = TestBackend::new();
    let secondary = TestBackend::new();
    let conn = builder(&primary, &secondary).build().unwrap();
    conn.start().await.unwrap();
    conn.stop().await.unwrap();

    let err = conn.get(&key("a")).await.unwrap_err();
    assert!(err.is_disconnected());
    assert!(matches!(
        err,
        CacheError::Disconnected {
            source: BackendError::NotStarted
        }
    ));
    // Refused before reaching either backend
    assert_eq!(primary.calls(), 0);
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_operations_after_stop_leave_health_alone() {
    let primary = TestBackend::failing();
    let secondary = TestBackend::new();
    let log = EventLog::default();
    let conn = builder(&primary, &secondary)
        .recovery_delay(Duration::from_secs(1))
        .on_event(log.listener())
        .build()
        .unwrap();
    conn.start().await.unwrap();
    conn.stop().await.unwrap();

    for id in ["a", "b", "c"] {
        assert!(conn.get(&key(id)).await.unwrap_err().is_disconnected());
    }

    assert!(conn.health().healthy);
    assert!(!conn.health().recovery_armed);
    assert!(log.all().is_empty());
}

#[tokio::test]
async fn test_failed_restart_is_not_ready() {
    let primary = TestBackend::new();
    let secondary = TestBackend::new();
    let conn = builder(&primary, &secondary).build().unwrap();
    conn.start().await.unwrap();
    conn.stop().await.unwrap();

    primary.refuse_start();
    let err = conn.start().await.unwrap_err();
    assert!(matches!(
        err,
        CacheError::Lifecycle {
            role: Origin::Primary,
            action: "start",
            ..
        }
    ));
    assert!(!conn.is_ready());

    // The secondary started alongside the primary and was stopped again
    secondary.set_ready(true);
    assert!(!secondary.is_ready());
    assert!(conn.get(&key("a")).await.unwrap_err().is_disconnected());
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test]
async fn test_failed_start_while_running_stops_everything() {
    let primary = TestBackend::new();
    let secondary = TestBackend::new();
    let conn = builder(&primary, &secondary).build().unwrap();
    conn.start().await.unwrap();
    assert!(conn.is_ready());

    secondary.refuse_start();
    assert!(conn.start().await.is_err());

    assert!(!conn.is_ready());
    assert!(!primary.is_ready());
}

#[tokio::test]
async fn test_restart_after_stop() {
    let primary = TestBackend::new();
    let secondary = TestBackend::new();
    let conn = builder(&primary, &secondary).build().unwrap();

    for _ in 0..3 {
        conn.start().await.unwrap();
        conn.set(&key("a"), Bytes::from_static(b"1"), ttl())
            .await
            .unwrap();
        assert!(conn.get(&key("a")).await.unwrap().is_some());
        conn.stop().await.unwrap();
    }
}

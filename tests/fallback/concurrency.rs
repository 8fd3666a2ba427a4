//! Many callers sharing one connection.

use super::*;
use futures::future::join_all;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_demote_once() {
    let primary = TestBackend::failing();
    primary.set_delay(Duration::from_millis(20));
    let secondary = TestBackend::new();
    let log = EventLog::default();
    let conn = builder(&primary, &secondary)
        .recovery_delay(Duration::from_secs(60))
        .on_event(log.listener())
        .build()
        .unwrap();
    conn.start().await.unwrap();

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let conn = conn.clone();
            tokio::spawn(async move {
                conn.set(&key(&format!("k{i}")), Bytes::from_static(b"v"), ttl())
                    .await
            })
        })
        .collect();

    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(secondary.calls(), 50);
    assert_eq!(log.count("primary_demoted"), 1);
    assert_eq!(log.count("fallback_applied"), 50);

    let armed = log
        .all()
        .into_iter()
        .filter(|event| {
            matches!(
                event,
                FallbackEvent::PrimaryDemoted {
                    recovery_armed: true,
                    ..
                }
            )
        })
        .count();
    assert_eq!(armed, 1);
    assert!(conn.health().recovery_armed);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_see_recovery() {
    let primary = TestBackend::failing();
    let secondary = TestBackend::new();
    let log = EventLog::default();
    let conn = builder(&primary, &secondary)
        .recovery_delay(Duration::from_millis(100))
        .on_event(log.listener())
        .build()
        .unwrap();
    conn.start().await.unwrap();

    let k = key("a");
    conn.get(&k).await.unwrap();
    primary.set_failing(false);

    // Concurrent callers while demoted all bypass the primary
    let results = join_all((0..10).map(|_| conn.get(&k))).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(primary.calls(), 1);
    assert_eq!(log.count("primary_bypassed"), 10);

    tokio::time::sleep(Duration::from_millis(150)).await;

    let results = join_all((0..10).map(|_| conn.get(&k))).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(primary.calls(), 11);
    assert_eq!(log.count("primary_restored"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_clones_share_health() {
    let primary = TestBackend::failing();
    let secondary = TestBackend::new();
    let conn = builder(&primary, &secondary).build().unwrap();
    conn.start().await.unwrap();

    let other = conn.clone();
    tokio::spawn(async move { other.get(&key("a")).await })
        .await
        .unwrap()
        .unwrap();

    assert!(!conn.health().healthy);
    conn.get(&key("a")).await.unwrap();
    assert_eq!(primary.calls(), 1);
}

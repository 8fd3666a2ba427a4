//! Event delivery through a live connection.
//!
//! A listener that panics must not break routing or starve the listeners
//! registered after it.

use super::*;
use cache_fallback_core::{Operation, Origin};

#[tokio::test]
async fn test_panicking_listener_does_not_break_operations() {
    let primary = TestBackend::failing();
    let secondary = TestBackend::new();
    let log = EventLog::default();
    let conn = builder(&primary, &secondary)
        .debug(true)
        .on_event(|_| panic!("listener bug"))
        .on_event(log.listener())
        .build()
        .unwrap();
    conn.start().await.unwrap();

    conn.set(&key("a"), Bytes::from_static(b"1"), ttl())
        .await
        .unwrap();
    let record = conn.get(&key("a")).await.unwrap().unwrap();
    assert_eq!(record.origin, Some(Origin::Secondary));

    assert_eq!(log.count("fallback_applied"), 2);
}

#[tokio::test]
async fn test_events_carry_connection_name_and_operation() {
    let primary = TestBackend::new();
    let secondary = TestBackend::new();
    let log = EventLog::default();
    let conn = builder(&primary, &secondary)
        .name("sessions")
        .on_event(log.listener())
        .build()
        .unwrap();
    conn.start().await.unwrap();

    conn.delete(&key("a")).await.unwrap();

    let events = log.all();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source_name(), "sessions");
    assert_eq!(events[0].operation(), Some(Operation::Delete));
    assert!(matches!(
        events[0],
        FallbackEvent::PrimarySucceeded {
            operation: Operation::Delete,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_logging_through_a_full_cycle() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let primary = TestBackend::failing();
    let secondary = TestBackend::new();
    let conn = builder(&primary, &secondary)
        .name("logged")
        .primary_timeout(Duration::from_millis(50))
        .recovery_delay(Duration::from_millis(100))
        .build()
        .unwrap();
    conn.start().await.unwrap();

    conn.get(&key("a")).await.unwrap();
    conn.get(&key("a")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(conn.health().healthy);

    conn.stop().await.unwrap();
}

#[tokio::test]
async fn test_events_report_which_backend_answered() {
    let primary = TestBackend::new();
    let secondary = TestBackend::new();
    let log = EventLog::default();
    let conn = builder(&primary, &secondary)
        .on_event(log.listener())
        .build()
        .unwrap();
    conn.start().await.unwrap();

    conn.get(&key("a")).await.unwrap();
    primary.set_failing(true);
    conn.get(&key("a")).await.unwrap();

    let origins: Vec<_> = log.all().iter().filter_map(|e| e.origin()).collect();
    assert_eq!(origins, vec![Origin::Primary, Origin::Secondary]);

    let demoted = log
        .all()
        .into_iter()
        .find(|e| e.event_type() == "primary_demoted")
        .unwrap();
    assert_eq!(demoted.operation(), None);
    assert_eq!(demoted.origin(), None);
}

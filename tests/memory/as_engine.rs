//! Memory backends as fallback engines.

use bytes::Bytes;
use cache_fallback::{ConfigError, FallbackConnection, Key, Origin};
use cache_fallback_memory::{MemoryBackend, MemoryOptions};
use std::time::Duration;

#[tokio::test]
async fn test_engines_built_from_options() {
    let conn = FallbackConnection::builder()
        .primary_engine(MemoryBackend::with_options, MemoryOptions::new().max_entries(100))
        .secondary_engine(MemoryBackend::with_options, MemoryOptions::new())
        .debug(true)
        .build()
        .unwrap();
    conn.start().await.unwrap();

    let key = Key::new("s", "a");
    conn.set(&key, Bytes::from_static(b"v"), Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(conn.primary().len(), 1);
    assert!(conn.secondary().is_empty());
    assert_eq!(
        conn.get(&key).await.unwrap().unwrap().origin,
        Some(Origin::Primary)
    );
}

#[test]
fn test_rejected_engine_options() {
    let err = FallbackConnection::<MemoryBackend, MemoryBackend>::builder()
        .primary_engine(MemoryBackend::with_options, MemoryOptions::new().max_entries(0))
        .secondary(MemoryBackend::new())
        .build()
        .unwrap_err();

    assert!(matches!(
        err,
        ConfigError::Engine {
            role: Origin::Primary,
            ..
        }
    ));
    assert!(err.to_string().starts_with("primary engine rejected its options"));
}

#[tokio::test]
async fn test_stop_clears_both_engines() {
    let conn = FallbackConnection::builder()
        .primary(MemoryBackend::new())
        .secondary(MemoryBackend::new())
        .build()
        .unwrap();
    conn.start().await.unwrap();

    let key = Key::new("s", "a");
    conn.set(&key, Bytes::from_static(b"v"), Duration::from_secs(60))
        .await
        .unwrap();

    conn.stop().await.unwrap();
    conn.start().await.unwrap();
    assert_eq!(conn.get(&key).await.unwrap(), None);
}

//! The cache backend contract.

use crate::error::{BackendError, SegmentNameError};
use bytes::Bytes;
use std::fmt;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// Identifies a cached item.
///
/// `segment` groups related items (a namespace); `id` is unique within a
/// segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    /// The namespace the item belongs to.
    pub segment: String,
    /// The item identifier within the segment.
    pub id: String,
}

impl Key {
    /// Creates a key from a segment and an id.
    pub fn new(segment: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.segment, self.id)
    }
}

/// Which backend served a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// The preferred backend.
    Primary,
    /// The fallback backend.
    Secondary,
}

impl Origin {
    /// Returns `"primary"` or `"secondary"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Primary => "primary",
            Origin::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A data operation of the [`CacheBackend`] contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`CacheBackend::get`]
    Get,
    /// [`CacheBackend::set`]
    Set,
    /// [`CacheBackend::delete`]
    Delete,
}

impl Operation {
    /// Returns the lowercase operation name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Set => "set",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value returned by [`CacheBackend::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// The opaque payload.
    pub item: Bytes,
    /// When the payload was stored.
    pub stored: SystemTime,
    /// The time-to-live the payload was stored with.
    pub ttl: Duration,
    /// The backend that served the record, set only when origin tagging is on.
    pub origin: Option<Origin>,
}

impl CacheRecord {
    /// Creates an untagged record.
    pub fn new(item: impl Into<Bytes>, stored: SystemTime, ttl: Duration) -> Self {
        Self {
            item: item.into(),
            stored,
            ttl,
            origin: None,
        }
    }

    /// Returns the record tagged with the backend that served it.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// Checks a segment name: it must be non-empty and free of `\0`.
///
/// # Examples
///
/// ```
/// use cache_fallback_core::{validate_segment_name, SegmentNameError};
///
/// assert!(validate_segment_name("sessions").is_ok());
/// assert_eq!(validate_segment_name(""), Err(SegmentNameError::Empty));
/// assert_eq!(validate_segment_name("a\0b"), Err(SegmentNameError::NullCharacter));
/// ```
pub fn validate_segment_name(name: &str) -> Result<(), SegmentNameError> {
    if name.is_empty() {
        return Err(SegmentNameError::Empty);
    }
    if name.contains('\0') {
        return Err(SegmentNameError::NullCharacter);
    }
    Ok(())
}

/// A cache storage engine.
///
/// Implementations persist opaque payloads by [`Key`]. Lifecycle calls are
/// idempotent. Any error is treated by callers as "backend unavailable".
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use cache_fallback_core::{BackendError, CacheBackend, CacheRecord, Key};
/// use std::time::Duration;
///
/// struct Blackhole;
///
/// impl CacheBackend for Blackhole {
///     async fn start(&self) -> Result<(), BackendError> { Ok(()) }
///     async fn stop(&self) -> Result<(), BackendError> { Ok(()) }
///     fn is_ready(&self) -> bool { true }
///     async fn get(&self, _key: &Key) -> Result<Option<CacheRecord>, BackendError> { Ok(None) }
///     async fn set(&self, _key: &Key, _value: Bytes, _ttl: Duration) -> Result<(), BackendError> { Ok(()) }
///     async fn delete(&self, _key: &Key) -> Result<(), BackendError> { Ok(()) }
/// }
/// ```
pub trait CacheBackend: Send + Sync + 'static {
    /// Connects or initializes the engine.
    fn start(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Disconnects the engine.
    fn stop(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Fast, non-blocking readiness check.
    fn is_ready(&self) -> bool;

    /// Rejects segment names the engine cannot store.
    fn validate_segment_name(&self, name: &str) -> Result<(), SegmentNameError> {
        validate_segment_name(name)
    }

    /// Fetches a record, or `None` when the key is absent or expired.
    fn get(
        &self,
        key: &Key,
    ) -> impl Future<Output = Result<Option<CacheRecord>, BackendError>> + Send;

    /// Stores `value` under `key` for `ttl`.
    fn set(
        &self,
        key: &Key,
        value: Bytes,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &Key) -> impl Future<Output = Result<(), BackendError>> + Send;
}

//! Error types for the fallback connection.

use cache_fallback_core::{BackendError, Origin, SegmentNameError};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while building a [`FallbackConnection`](crate::FallbackConnection).
///
/// These are fatal and never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No primary engine was configured.
    #[error("must set a primary engine")]
    MissingPrimary,

    /// No secondary engine was configured.
    #[error("must set a secondary engine")]
    MissingSecondary,

    /// An engine factory rejected its options.
    #[error("{role} engine rejected its options: {source}")]
    Engine {
        /// Which engine failed.
        role: Origin,
        /// The factory's error.
        #[source]
        source: BackendError,
    },

    /// The primary timeout was zero.
    #[error("primary timeout must be greater than zero")]
    ZeroTimeout,

    /// The recovery delay was zero.
    #[error("recovery delay must be greater than zero")]
    ZeroRecoveryDelay,
}

/// Errors returned by [`FallbackConnection`](crate::FallbackConnection) operations.
///
/// Callers of `get`, `set` and `delete` only ever see [`Validation`](Self::Validation)
/// or [`Disconnected`](Self::Disconnected): primary timeouts and primary
/// backend errors are absorbed by falling back to the secondary, and are
/// reported through events instead.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The connection could not be configured.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The key's segment name was rejected before any backend was called.
    #[error("invalid segment name: {0}")]
    Validation(#[from] SegmentNameError),

    /// The primary exceeded its configured timeout.
    #[error("primary timed out after {timeout:?}")]
    Timeout {
        /// The configured bound.
        timeout: Duration,
    },

    /// A backend rejected an operation.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A backend failed to start or stop.
    #[error("failed to {action} {role} backend: {source}")]
    Lifecycle {
        /// Which backend failed.
        role: Origin,
        /// `"start"` or `"stop"`.
        action: &'static str,
        /// The backend's error.
        #[source]
        source: BackendError,
    },

    /// No backend could serve the operation.
    ///
    /// The source is the secondary's error, verbatim, or
    /// [`BackendError::NotStarted`] when the connection itself is not started.
    #[error("disconnected: no cache backend available")]
    Disconnected {
        /// The secondary's error, or `NotStarted`.
        #[source]
        source: BackendError,
    },
}

impl CacheError {
    /// Returns true if both backends were unavailable.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }

    /// Returns true if the key was rejected by validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a primary timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

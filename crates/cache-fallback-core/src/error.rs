//! Error types shared by cache backends.

use thiserror::Error;

/// Boxed error type carried by [`BackendError::Other`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by a [`CacheBackend`](crate::CacheBackend).
///
/// The fallback connection treats every variant the same way: the backend is
/// considered unavailable for the operation that produced it.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend was used before `start` or after `stop`.
    #[error("backend not started")]
    NotStarted,

    /// The backend refused the operation.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected its construction options.
    #[error("invalid backend options: {0}")]
    InvalidOptions(String),

    /// Any other engine-specific failure.
    #[error(transparent)]
    Other(#[from] BoxError),
}

impl BackendError {
    /// Creates an [`Unavailable`](Self::Unavailable) error from a message.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Wraps an arbitrary error.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(error))
    }

    /// Returns true if the backend was not started.
    pub fn is_not_started(&self) -> bool {
        matches!(self, Self::NotStarted)
    }
}

/// Reasons a segment name is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SegmentNameError {
    /// The name is the empty string.
    #[error("empty string")]
    Empty,

    /// The name contains a `\0` character.
    #[error("includes null character")]
    NullCharacter,
}

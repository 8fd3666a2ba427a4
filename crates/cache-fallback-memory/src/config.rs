//! Options for the in-memory backend.

use cache_fallback_core::BackendError;
use std::num::NonZeroUsize;

/// Construction options for [`MemoryBackend`](crate::MemoryBackend).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryOptions {
    /// Upper bound on stored entries. `None` means unbounded.
    ///
    /// When the bound is reached the least recently used entry is evicted.
    pub max_entries: Option<usize>,
}

impl MemoryOptions {
    /// Unbounded storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the store to `max_entries`.
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub(crate) fn capacity(&self) -> Result<Option<NonZeroUsize>, BackendError> {
        match self.max_entries {
            None => Ok(None),
            Some(n) => NonZeroUsize::new(n).map(Some).ok_or_else(|| {
                BackendError::InvalidOptions("max_entries must be greater than zero".to_string())
            }),
        }
    }
}

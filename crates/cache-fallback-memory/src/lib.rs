//! In-process cache backend.
//!
//! [`MemoryBackend`] keeps payloads in a map keyed by segment and id, expires
//! them lazily after their TTL, and can be bounded with least-recently-used
//! eviction. It is the usual secondary behind a networked primary, and the
//! backend the test suites run against.
//!
//! # Examples
//!
//! ```rust
//! use bytes::Bytes;
//! use cache_fallback_core::{CacheBackend, Key};
//! use cache_fallback_memory::{MemoryBackend, MemoryOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = MemoryBackend::with_options(MemoryOptions::new().max_entries(1_000))?;
//! backend.start().await?;
//!
//! let key = Key::new("sessions", "abc");
//! backend.set(&key, Bytes::from_static(b"payload"), Duration::from_secs(30)).await?;
//! assert!(backend.get(&key).await?.is_some());
//! # Ok(())
//! # }
//! ```

mod config;
mod store;

pub use config::MemoryOptions;

use bytes::Bytes;
use cache_fallback_core::{BackendError, CacheBackend, CacheRecord, Key};
use parking_lot::Mutex;
use std::time::Duration;
use store::MemoryStore;

#[cfg(feature = "tracing")]
use tracing::debug;

/// A cache backend that stores everything in process memory.
///
/// Not ready until [`start`](CacheBackend::start) is called; `stop` discards
/// every entry.
pub struct MemoryBackend {
    options: MemoryOptions,
    store: Mutex<Option<MemoryStore>>,
}

impl MemoryBackend {
    /// Creates an unbounded backend.
    pub fn new() -> Self {
        Self {
            options: MemoryOptions::default(),
            store: Mutex::new(None),
        }
    }

    /// Creates a backend from options, rejecting a zero entry bound.
    ///
    /// The signature fits the engine factory slots of the fallback connection
    /// builder.
    pub fn with_options(options: MemoryOptions) -> Result<Self, BackendError> {
        options.capacity()?;
        Ok(Self {
            options,
            store: Mutex::new(None),
        })
    }

    /// Number of stored entries, including expired ones not yet collected.
    pub fn len(&self) -> usize {
        self.store.lock().as_ref().map(MemoryStore::len).unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_store<T>(
        &self,
        f: impl FnOnce(&mut MemoryStore) -> T,
    ) -> Result<T, BackendError> {
        let mut guard = self.store.lock();
        let store = guard.as_mut().ok_or(BackendError::NotStarted)?;
        Ok(f(store))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("options", &self.options)
            .field("ready", &self.is_ready())
            .field("len", &self.len())
            .finish()
    }
}

impl CacheBackend for MemoryBackend {
    async fn start(&self) -> Result<(), BackendError> {
        let mut guard = self.store.lock();
        if guard.is_none() {
            *guard = Some(MemoryStore::new(self.options.capacity()?));

            #[cfg(feature = "tracing")]
            debug!(max_entries = ?self.options.max_entries, "Memory backend started");
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), BackendError> {
        if self.store.lock().take().is_some() {
            #[cfg(feature = "tracing")]
            debug!("Memory backend stopped");
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.store.lock().is_some()
    }

    async fn get(&self, key: &Key) -> Result<Option<CacheRecord>, BackendError> {
        self.with_store(|store| store.get(key))
    }

    async fn set(&self, key: &Key, value: Bytes, ttl: Duration) -> Result<(), BackendError> {
        let _evicted = self.with_store(|store| store.insert(key.clone(), value, ttl))?;

        #[cfg(feature = "tracing")]
        {
            if let Some(evicted) = &_evicted {
                debug!(key = %evicted, "Evicted least recently used entry");
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &Key) -> Result<(), BackendError> {
        self.with_store(|store| store.remove(key))
    }
}

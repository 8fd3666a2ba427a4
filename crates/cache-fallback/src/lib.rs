//! Resilient cache connection over a primary and a secondary backend.
//!
//! A [`FallbackConnection`] fronts two interchangeable [`CacheBackend`]s and
//! routes every operation to whichever one is believed reachable, so callers
//! see a single cache with degraded-but-available behavior instead of hard
//! failures.
//!
//! # Overview
//!
//! - While the primary is healthy, `get`, `set` and `delete` go to the primary,
//!   optionally bounded by a timeout.
//! - When a primary call fails or times out, the primary is marked unhealthy
//!   and the same operation is retried once on the secondary.
//! - While unhealthy, operations go straight to the secondary.
//! - With a recovery delay, the primary is trusted again once the delay
//!   elapses. Without one, only a `stop`/`start` cycle restores it.
//! - If the secondary fails as well, the caller gets
//!   [`CacheError::Disconnected`].
//!
//! # Examples
//!
//! ```rust
//! use bytes::Bytes;
//! use cache_fallback::{FallbackConnection, Key, Origin};
//! use cache_fallback_memory::MemoryBackend;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connection = FallbackConnection::builder()
//!     .name("sessions")
//!     .primary(MemoryBackend::new())
//!     .secondary(MemoryBackend::new())
//!     .primary_timeout(Duration::from_millis(100))
//!     .recovery_delay(Duration::from_secs(30))
//!     .debug(true)
//!     .build()?;
//!
//! connection.start().await?;
//!
//! let key = Key::new("sessions", "abc");
//! connection.set(&key, Bytes::from_static(b"payload"), Duration::from_secs(60)).await?;
//!
//! let record = connection.get(&key).await?.expect("just stored");
//! assert_eq!(record.origin, Some(Origin::Primary));
//! # Ok(())
//! # }
//! ```
//!
//! # Events
//!
//! Every routing decision emits a [`FallbackEvent`]:
//!
//! - `PrimarySucceeded`: the primary served the operation
//! - `PrimaryFailed`: the primary errored or timed out
//! - `PrimaryBypassed`: the primary was skipped because it is unhealthy
//! - `FallbackApplied`: the secondary served the operation
//! - `FallbackFailed`: the secondary failed too
//! - `PrimaryDemoted` / `PrimaryRestored`: health transitions
//!
//! # Feature flags
//!
//! - `tracing`: log routing decisions and health transitions
//! - `metrics`: export call, failure and health metrics
//! - `serde`: deserialize [`FallbackOptions`] from configuration files

mod config;
mod error;
mod events;
mod executor;
mod health;
mod service;

pub use cache_fallback_core::{
    BackendError, CacheBackend, CacheRecord, Event, Key, Origin, SegmentNameError,
};
pub use config::{FallbackConfig, FallbackConnectionBuilder, FallbackOptions, PrimaryOptions};
pub use error::{CacheError, ConfigError};
pub use events::{FailureKind, FallbackEvent, Operation};
pub use health::HealthSnapshot;
pub use service::{CacheRequest, CacheResponse};

use bytes::Bytes;
use cache_fallback_core::validate_segment_name;
use executor::GuardedExecutor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

/// A cache connection that falls back from a primary to a secondary backend.
///
/// Cloning is cheap and clones share backends, health and lifecycle state.
///
/// See the [module-level documentation](crate) for an overview.
pub struct FallbackConnection<P, S> {
    primary: Arc<P>,
    secondary: Arc<S>,
    config: Arc<FallbackConfig>,
    executor: GuardedExecutor,
    started: Arc<AtomicBool>,
}

impl<P, S> FallbackConnection<P, S>
where
    P: CacheBackend,
    S: CacheBackend,
{
    /// Creates a builder.
    pub fn builder() -> FallbackConnectionBuilder<P, S> {
        FallbackConnectionBuilder::new()
    }

    pub(crate) fn new(primary: P, secondary: S, config: FallbackConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "cache_fallback_calls_total",
                "Total number of cache operations by serving backend"
            );
            describe_counter!(
                "cache_fallback_primary_failures_total",
                "Primary failures that triggered a fallback, by kind"
            );
            describe_counter!(
                "cache_fallback_recoveries_total",
                "Times the recovery delay restored the primary"
            );
            describe_gauge!(
                "cache_fallback_primary_healthy",
                "Whether operations are routed to the primary (1) or not (0)"
            );
        });

        let config = Arc::new(config);
        Self {
            primary: Arc::new(primary),
            secondary: Arc::new(secondary),
            executor: GuardedExecutor::new(Arc::clone(&config)),
            config,
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The connection's settings.
    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// The preferred backend.
    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// The fallback backend.
    pub fn secondary(&self) -> &S {
        &self.secondary
    }

    /// Current belief about the primary.
    pub fn health(&self) -> HealthSnapshot {
        self.executor.health().snapshot()
    }

    /// Starts both backends concurrently and trusts the primary again.
    ///
    /// The connection is not started while this runs. On failure it stays
    /// not started, and whichever backend did start is stopped again.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Lifecycle`] if the secondary fails to start, or if
    /// the primary fails to start and `primary_optional_at_start` is off. With
    /// that option on, a primary start failure demotes the primary instead.
    pub async fn start(&self) -> Result<(), CacheError> {
        self.started.store(false, Ordering::Release);
        self.executor.health().reset();

        let (primary, secondary) =
            futures::future::join(self.primary.start(), self.secondary.start()).await;
        let primary_started = primary.is_ok();
        let secondary_started = secondary.is_ok();

        let failure = match (primary, secondary) {
            (Err(source), _) if !self.config.primary_optional_at_start => Some(CacheError::Lifecycle {
                role: Origin::Primary,
                action: "start",
                source,
            }),
            (_, Err(source)) => Some(CacheError::Lifecycle {
                role: Origin::Secondary,
                action: "start",
                source,
            }),
            (Err(_source), Ok(())) => {
                #[cfg(feature = "tracing")]
                warn!(
                    connection = %self.config.name,
                    error = %_source,
                    "Primary failed to start, starting on secondary"
                );

                self.executor.health().mark_unhealthy();
                None
            }
            (Ok(()), Ok(())) => None,
        };

        if let Some(error) = failure {
            #[cfg(feature = "tracing")]
            warn!(connection = %self.config.name, error = %error, "Fallback connection failed to start");

            self.roll_back(primary_started, secondary_started).await;
            return Err(error);
        }

        self.started.store(true, Ordering::Release);

        #[cfg(feature = "tracing")]
        info!(connection = %self.config.name, "Fallback connection started");

        Ok(())
    }

    /// Stops the backends that started during a failed `start`.
    async fn roll_back(&self, primary_started: bool, secondary_started: bool) {
        let primary = async {
            if primary_started {
                self.primary.stop().await
            } else {
                Ok(())
            }
        };
        let secondary = async {
            if secondary_started {
                self.secondary.stop().await
            } else {
                Ok(())
            }
        };

        let (_primary, _secondary) = futures::future::join(primary, secondary).await;

        #[cfg(feature = "tracing")]
        {
            for (role, result) in [(Origin::Primary, &_primary), (Origin::Secondary, &_secondary)] {
                if let Err(error) = result {
                    warn!(
                        connection = %self.config.name,
                        role = role.as_str(),
                        error = %error,
                        "Backend failed to stop after aborted start"
                    );
                }
            }
        }
    }

    /// Stops both backends. `is_ready` reports false until the next `start`.
    ///
    /// Any pending recovery timer is cancelled.
    pub async fn stop(&self) -> Result<(), CacheError> {
        self.started.store(false, Ordering::Release);
        self.executor.health().cancel_recovery();

        let (primary, secondary) =
            futures::future::join(self.primary.stop(), self.secondary.stop()).await;

        #[cfg(feature = "tracing")]
        info!(connection = %self.config.name, "Fallback connection stopped");

        primary.map_err(|source| CacheError::Lifecycle {
            role: Origin::Primary,
            action: "stop",
            source,
        })?;
        secondary.map_err(|source| CacheError::Lifecycle {
            role: Origin::Secondary,
            action: "stop",
            source,
        })
    }

    /// Whether the connection can serve operations.
    ///
    /// True when `always_ready` is set. Otherwise the connection must be
    /// started and either the secondary is ready, or the primary is both
    /// ready and healthy.
    pub fn is_ready(&self) -> bool {
        if self.config.always_ready {
            return true;
        }
        if !self.started.load(Ordering::Acquire) {
            return false;
        }
        self.secondary.is_ready()
            || (self.primary.is_ready() && self.executor.health().is_healthy())
    }

    /// Rejects empty segment names and names containing `\0`.
    pub fn validate_segment_name(&self, name: &str) -> Result<(), CacheError> {
        Ok(validate_segment_name(name)?)
    }

    /// Validates `key` and refuses operations outside `start`..`stop`.
    ///
    /// A refused operation reaches neither backend and leaves health as is.
    fn admit(&self, key: &Key) -> Result<(), CacheError> {
        self.validate_segment_name(&key.segment)?;
        if !self.started.load(Ordering::Acquire) {
            #[cfg(feature = "tracing")]
            debug!(connection = %self.config.name, "Operation refused, connection not started");

            return Err(CacheError::Disconnected {
                source: BackendError::NotStarted,
            });
        }
        Ok(())
    }

    /// Fetches a record.
    ///
    /// Every data operation fails with [`CacheError::Disconnected`] while the
    /// connection is not started.
    ///
    /// With `debug` on, a found record is tagged with the backend that served
    /// it; a miss is returned as `None` either way.
    pub async fn get(&self, key: &Key) -> Result<Option<CacheRecord>, CacheError> {
        self.admit(key)?;

        let primary = {
            let backend = Arc::clone(&self.primary);
            let key = key.clone();
            async move { backend.get(&key).await }
        };

        let (record, origin) = self
            .executor
            .run(Operation::Get, primary, self.secondary.get(key))
            .await?;

        Ok(self.config.tagging.apply(origin, record))
    }

    /// Stores `value` under `key` for `ttl`.
    pub async fn set(&self, key: &Key, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        self.admit(key)?;

        let primary = {
            let backend = Arc::clone(&self.primary);
            let key = key.clone();
            let value = value.clone();
            async move { backend.set(&key, value, ttl).await }
        };

        self.executor
            .run(Operation::Set, primary, self.secondary.set(key, value, ttl))
            .await?;
        Ok(())
    }

    /// Removes `key`. Removing an absent key succeeds.
    pub async fn delete(&self, key: &Key) -> Result<(), CacheError> {
        self.admit(key)?;

        let primary = {
            let backend = Arc::clone(&self.primary);
            let key = key.clone();
            async move { backend.delete(&key).await }
        };

        self.executor
            .run(Operation::Delete, primary, self.secondary.delete(key))
            .await?;
        Ok(())
    }
}

impl<P, S> Clone for FallbackConnection<P, S> {
    fn clone(&self) -> Self {
        Self {
            primary: Arc::clone(&self.primary),
            secondary: Arc::clone(&self.secondary),
            config: Arc::clone(&self.config),
            executor: self.executor.clone(),
            started: Arc::clone(&self.started),
        }
    }
}

impl<P, S> std::fmt::Debug for FallbackConnection<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackConnection")
            .field("name", &self.config.name)
            .field("started", &self.started.load(Ordering::Acquire))
            .field("health", self.executor.health())
            .finish()
    }
}

/// A fallback connection is itself a backend, so connections can be nested.
///
/// Errors are wrapped in [`BackendError::Other`].
impl<P, S> CacheBackend for FallbackConnection<P, S>
where
    P: CacheBackend,
    S: CacheBackend,
{
    async fn start(&self) -> Result<(), BackendError> {
        Self::start(self).await.map_err(BackendError::other)
    }

    async fn stop(&self) -> Result<(), BackendError> {
        Self::stop(self).await.map_err(BackendError::other)
    }

    fn is_ready(&self) -> bool {
        Self::is_ready(self)
    }

    fn validate_segment_name(&self, name: &str) -> Result<(), SegmentNameError> {
        validate_segment_name(name)
    }

    async fn get(&self, key: &Key) -> Result<Option<CacheRecord>, BackendError> {
        Self::get(self, key).await.map_err(BackendError::other)
    }

    async fn set(&self, key: &Key, value: Bytes, ttl: Duration) -> Result<(), BackendError> {
        Self::set(self, key, value, ttl)
            .await
            .map_err(BackendError::other)
    }

    async fn delete(&self, key: &Key) -> Result<(), BackendError> {
        Self::delete(self, key).await.map_err(BackendError::other)
    }
}

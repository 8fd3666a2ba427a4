//! Configuration for the fallback connection.

use crate::error::ConfigError;
use crate::events::{FallbackEvent, Operation};
use crate::FallbackConnection;
use cache_fallback_core::{BackendError, CacheRecord, EventListeners, FnListener, Origin};
use std::time::Duration;

/// How results are returned to the caller, decided once from the `debug` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResultTagging {
    /// Records are returned as the backend produced them.
    Passthrough,
    /// Records are tagged with the backend that served them.
    Origin,
}

impl ResultTagging {
    pub(crate) fn apply(self, origin: Origin, record: Option<CacheRecord>) -> Option<CacheRecord> {
        match self {
            ResultTagging::Passthrough => record,
            ResultTagging::Origin => record.map(|record| record.with_origin(origin)),
        }
    }
}

/// Immutable settings of a [`FallbackConnection`].
pub struct FallbackConfig {
    pub(crate) name: String,
    pub(crate) timeout: Option<Duration>,
    pub(crate) recovery_delay: Option<Duration>,
    pub(crate) tagging: ResultTagging,
    pub(crate) always_ready: bool,
    pub(crate) cancel_running_future: bool,
    pub(crate) primary_optional_at_start: bool,
    pub(crate) event_listeners: EventListeners<FallbackEvent>,
}

impl FallbackConfig {
    /// The connection name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upper bound on each primary call, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Delay before an unhealthy primary is trusted again, if any.
    pub fn recovery_delay(&self) -> Option<Duration> {
        self.recovery_delay
    }

    /// Whether results are tagged with their origin.
    pub fn debug(&self) -> bool {
        self.tagging == ResultTagging::Origin
    }

    /// Whether `is_ready` is forced to `true`.
    pub fn always_ready(&self) -> bool {
        self.always_ready
    }

    /// Whether a timed-out primary call is dropped rather than abandoned.
    pub fn cancel_running_future(&self) -> bool {
        self.cancel_running_future
    }

    /// Whether a primary start failure is tolerated.
    pub fn primary_optional_at_start(&self) -> bool {
        self.primary_optional_at_start
    }
}

impl std::fmt::Debug for FallbackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackConfig")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("recovery_delay", &self.recovery_delay)
            .field("tagging", &self.tagging)
            .field("always_ready", &self.always_ready)
            .field("cancel_running_future", &self.cancel_running_future)
            .field("primary_optional_at_start", &self.primary_optional_at_start)
            .finish()
    }
}

/// Plain-data connection options, typically loaded from a configuration file.
///
/// Durations are in milliseconds. With the `serde` feature the field names
/// follow camelCase (`recoveryDelay`, `alwaysReady`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "camelCase")
)]
pub struct FallbackOptions {
    /// Connection name.
    pub name: Option<String>,
    /// Primary call bounds.
    pub primary: PrimaryOptions,
    /// Tag results with their origin. Absent keeps the builder's setting.
    pub debug: Option<bool>,
    /// Force `is_ready` to `true`. Absent keeps the builder's setting.
    pub always_ready: Option<bool>,
}

/// Timing options for the primary backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "camelCase")
)]
pub struct PrimaryOptions {
    /// Milliseconds before a primary call is abandoned. Absent means unbounded.
    pub timeout: Option<u64>,
    /// Milliseconds before a failed primary is retried. Absent means never.
    pub recovery_delay: Option<u64>,
}

enum EngineSlot<B> {
    Missing,
    Ready(B),
    Rejected(BackendError),
}

impl<B> EngineSlot<B> {
    fn from_factory<O, F>(factory: F, options: O) -> Self
    where
        F: FnOnce(O) -> Result<B, BackendError>,
    {
        match factory(options) {
            Ok(backend) => EngineSlot::Ready(backend),
            Err(error) => EngineSlot::Rejected(error),
        }
    }

    fn resolve(self, role: Origin) -> Result<B, ConfigError> {
        match self {
            EngineSlot::Ready(backend) => Ok(backend),
            EngineSlot::Rejected(source) => Err(ConfigError::Engine { role, source }),
            EngineSlot::Missing => Err(match role {
                Origin::Primary => ConfigError::MissingPrimary,
                Origin::Secondary => ConfigError::MissingSecondary,
            }),
        }
    }
}

/// Builder for a [`FallbackConnection`].
pub struct FallbackConnectionBuilder<P, S> {
    primary: EngineSlot<P>,
    secondary: EngineSlot<S>,
    name: String,
    timeout: Option<Duration>,
    recovery_delay: Option<Duration>,
    debug: bool,
    always_ready: bool,
    cancel_running_future: bool,
    primary_optional_at_start: bool,
    event_listeners: EventListeners<FallbackEvent>,
}

impl<P, S> Default for FallbackConnectionBuilder<P, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, S> FallbackConnectionBuilder<P, S> {
    /// Creates a builder with no engines and default settings.
    pub fn new() -> Self {
        Self {
            primary: EngineSlot::Missing,
            secondary: EngineSlot::Missing,
            name: "fallback".to_string(),
            timeout: None,
            recovery_delay: None,
            debug: false,
            always_ready: false,
            cancel_running_future: false,
            primary_optional_at_start: false,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the connection name (used in events, logs and metrics).
    ///
    /// Default: `"fallback"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the preferred backend.
    pub fn primary(mut self, backend: P) -> Self {
        self.primary = EngineSlot::Ready(backend);
        self
    }

    /// Sets the fallback backend.
    pub fn secondary(mut self, backend: S) -> Self {
        self.secondary = EngineSlot::Ready(backend);
        self
    }

    /// Builds the primary from an engine factory and its options.
    ///
    /// A factory error is reported by [`build`](Self::build) as
    /// [`ConfigError::Engine`].
    pub fn primary_engine<O, F>(mut self, factory: F, options: O) -> Self
    where
        F: FnOnce(O) -> Result<P, BackendError>,
    {
        self.primary = EngineSlot::from_factory(factory, options);
        self
    }

    /// Builds the secondary from an engine factory and its options.
    pub fn secondary_engine<O, F>(mut self, factory: F, options: O) -> Self
    where
        F: FnOnce(O) -> Result<S, BackendError>,
    {
        self.secondary = EngineSlot::from_factory(factory, options);
        self
    }

    /// Bounds every primary call. Calls that exceed it fall back to the
    /// secondary.
    ///
    /// Default: unbounded
    pub fn primary_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// After a primary failure, trust the primary again once `delay` elapses.
    ///
    /// Default: never; only a `stop`/`start` cycle restores the primary.
    pub fn recovery_delay(mut self, delay: Duration) -> Self {
        self.recovery_delay = Some(delay);
        self
    }

    /// Tags every record returned by `get` with the backend that served it.
    ///
    /// Default: false
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Forces `is_ready` to report `true` regardless of backend state.
    ///
    /// Default: false
    pub fn always_ready(mut self, always_ready: bool) -> Self {
        self.always_ready = always_ready;
        self
    }

    /// Controls what happens to a primary call that exceeds the timeout.
    ///
    /// When false, the call keeps running in the background and its result is
    /// discarded. When true, the call's future is dropped, cancelling whatever
    /// I/O it was doing.
    ///
    /// Default: false
    pub fn cancel_running_future(mut self, cancel: bool) -> Self {
        self.cancel_running_future = cancel;
        self
    }

    /// Tolerates a primary that fails to start.
    ///
    /// When true, a primary start failure demotes the primary (arming recovery
    /// if configured) and `start` succeeds as long as the secondary started.
    /// When false, any start failure fails `start`.
    ///
    /// Default: false
    pub fn primary_optional_at_start(mut self, optional: bool) -> Self {
        self.primary_optional_at_start = optional;
        self
    }

    /// Applies plain-data options on top of the current settings.
    ///
    /// Only fields present in `options` override what the builder already
    /// holds.
    pub fn options(mut self, options: FallbackOptions) -> Self {
        if let Some(name) = options.name {
            self.name = name;
        }
        if let Some(ms) = options.primary.timeout {
            self.timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = options.primary.recovery_delay {
            self.recovery_delay = Some(Duration::from_millis(ms));
        }
        if let Some(debug) = options.debug {
            self.debug = debug;
        }
        if let Some(always_ready) = options.always_ready {
            self.always_ready = always_ready;
        }
        self
    }

    /// Adds an event listener.
    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&FallbackEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(listener));
        self
    }

    /// Registers a callback invoked whenever the secondary serves an operation.
    pub fn on_fallback<F>(mut self, f: F) -> Self
    where
        F: Fn(Operation) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &FallbackEvent| {
                if let FallbackEvent::FallbackApplied { operation, .. } = event {
                    f(*operation);
                }
            }));
        self
    }

    /// Registers a callback invoked when the recovery delay restores the primary.
    pub fn on_recovery<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &FallbackEvent| {
                if matches!(event, FallbackEvent::PrimaryRestored { .. }) {
                    f();
                }
            }));
        self
    }

    /// Validates the settings and builds the connection.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if an engine is missing or was rejected by its
    /// factory, or if a duration is zero.
    pub fn build(self) -> Result<FallbackConnection<P, S>, ConfigError>
    where
        P: cache_fallback_core::CacheBackend,
        S: cache_fallback_core::CacheBackend,
    {
        let primary = self.primary.resolve(Origin::Primary)?;
        let secondary = self.secondary.resolve(Origin::Secondary)?;

        if self.timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.recovery_delay == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroRecoveryDelay);
        }

        let config = FallbackConfig {
            name: self.name,
            timeout: self.timeout,
            recovery_delay: self.recovery_delay,
            tagging: if self.debug {
                ResultTagging::Origin
            } else {
                ResultTagging::Passthrough
            },
            always_ready: self.always_ready,
            cancel_running_future: self.cancel_running_future,
            primary_optional_at_start: self.primary_optional_at_start,
            event_listeners: self.event_listeners,
        };

        Ok(FallbackConnection::new(primary, secondary, config))
    }
}

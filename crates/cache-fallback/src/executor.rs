//! Timeout-bounded primary execution with a single fallback attempt.

use crate::config::FallbackConfig;
use crate::error::CacheError;
use crate::events::{FailureKind, FallbackEvent, Operation};
use crate::health::HealthTracker;
use cache_fallback_core::{BackendError, Origin};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::counter;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

/// Routes one operation to the primary or the secondary.
#[derive(Clone)]
pub(crate) struct GuardedExecutor {
    config: Arc<FallbackConfig>,
    health: HealthTracker,
}

impl GuardedExecutor {
    pub(crate) fn new(config: Arc<FallbackConfig>) -> Self {
        let health = HealthTracker::new(Arc::clone(&config));
        Self { config, health }
    }

    pub(crate) fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Runs `primary` unless the primary is unhealthy, falling back to
    /// `secondary` exactly once on failure or timeout.
    ///
    /// Neither future is polled unless it is chosen. Returns the value with
    /// the backend that produced it.
    pub(crate) async fn run<T, PF, SF>(
        &self,
        operation: Operation,
        primary: PF,
        secondary: SF,
    ) -> Result<(T, Origin), CacheError>
    where
        T: Send + 'static,
        PF: Future<Output = Result<T, BackendError>> + Send + 'static,
        SF: Future<Output = Result<T, BackendError>>,
    {
        if !self.health.is_healthy() {
            #[cfg(feature = "tracing")]
            debug!(
                connection = %self.config.name,
                operation = operation.as_str(),
                "Primary unhealthy, routing to secondary"
            );

            self.emit(|| FallbackEvent::PrimaryBypassed {
                connection: self.config.name.clone(),
                timestamp: Instant::now(),
                operation,
            });

            return self.run_secondary(operation, secondary).await;
        }

        let start = Instant::now();
        match self.attempt_primary(primary).await {
            Ok(value) => {
                let duration = start.elapsed();

                #[cfg(feature = "metrics")]
                counter!(
                    "cache_fallback_calls_total",
                    "connection" => self.config.name.clone(),
                    "operation" => operation.as_str(),
                    "result" => "primary"
                )
                .increment(1);

                self.emit(|| FallbackEvent::PrimarySucceeded {
                    connection: self.config.name.clone(),
                    timestamp: Instant::now(),
                    operation,
                    duration,
                });

                Ok((value, Origin::Primary))
            }
            Err(error) => {
                let duration = start.elapsed();
                let kind = if error.is_timeout() {
                    FailureKind::Timeout
                } else {
                    FailureKind::Error
                };

                #[cfg(feature = "tracing")]
                warn!(
                    connection = %self.config.name,
                    operation = operation.as_str(),
                    kind = kind.as_str(),
                    error = %error,
                    "Primary failed, falling back to secondary"
                );

                #[cfg(feature = "metrics")]
                counter!(
                    "cache_fallback_primary_failures_total",
                    "connection" => self.config.name.clone(),
                    "kind" => kind.as_str()
                )
                .increment(1);

                self.emit(|| FallbackEvent::PrimaryFailed {
                    connection: self.config.name.clone(),
                    timestamp: Instant::now(),
                    operation,
                    kind,
                    duration,
                });

                self.health.mark_unhealthy();
                self.run_secondary(operation, secondary).await
            }
        }
    }

    /// Runs the primary, racing it against the timeout when one is set.
    async fn attempt_primary<T, F>(&self, primary: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, BackendError>> + Send + 'static,
    {
        let Some(limit) = self.config.timeout else {
            return primary.await.map_err(CacheError::Backend);
        };

        if self.config.cancel_running_future {
            return match tokio::time::timeout(limit, primary).await {
                Ok(result) => result.map_err(CacheError::Backend),
                Err(_elapsed) => Err(timed_out(limit)),
            };
        }

        // Dropping the handle on timeout detaches the task; whatever it
        // eventually returns is discarded.
        let handle = tokio::spawn(primary);
        match tokio::time::timeout(limit, handle).await {
            Ok(Ok(result)) => result.map_err(CacheError::Backend),
            Ok(Err(join_error)) => Err(CacheError::Backend(BackendError::unavailable(format!(
                "primary task failed: {join_error}"
            )))),
            Err(_elapsed) => Err(timed_out(limit)),
        }
    }

    async fn run_secondary<T, F>(&self, operation: Operation, secondary: F) -> Result<(T, Origin), CacheError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        match secondary.await {
            Ok(value) => {
                #[cfg(feature = "metrics")]
                counter!(
                    "cache_fallback_calls_total",
                    "connection" => self.config.name.clone(),
                    "operation" => operation.as_str(),
                    "result" => "secondary"
                )
                .increment(1);

                self.emit(|| FallbackEvent::FallbackApplied {
                    connection: self.config.name.clone(),
                    timestamp: Instant::now(),
                    operation,
                });

                Ok((value, Origin::Secondary))
            }
            Err(source) => {
                #[cfg(feature = "tracing")]
                warn!(
                    connection = %self.config.name,
                    operation = operation.as_str(),
                    error = %source,
                    "Secondary also failed"
                );

                #[cfg(feature = "metrics")]
                counter!(
                    "cache_fallback_calls_total",
                    "connection" => self.config.name.clone(),
                    "operation" => operation.as_str(),
                    "result" => "disconnected"
                )
                .increment(1);

                self.emit(|| FallbackEvent::FallbackFailed {
                    connection: self.config.name.clone(),
                    timestamp: Instant::now(),
                    operation,
                });

                Err(CacheError::Disconnected { source })
            }
        }
    }

    fn emit<F>(&self, make: F)
    where
        F: FnOnce() -> FallbackEvent,
    {
        self.config.event_listeners.emit_with(make);
    }
}

fn timed_out(timeout: Duration) -> CacheError {
    CacheError::Timeout { timeout }
}

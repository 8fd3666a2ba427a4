//! Health tracking for the primary backend.
//!
//! The tracker owns the "primary healthy" belief and at most one pending
//! recovery timer. All transitions happen under one lock; reads of the
//! healthy flag are lock-free.

use crate::config::FallbackConfig;
use crate::events::FallbackEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::task::JoinHandle;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

#[cfg(feature = "tracing")]
use tracing::{info, warn};

/// Point-in-time view of a connection's primary health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    /// Whether operations are currently routed to the primary.
    pub healthy: bool,
    /// Whether a recovery timer is pending.
    pub recovery_armed: bool,
}

/// Outcome of [`HealthTracker::mark_unhealthy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Demotion {
    /// The primary was healthy before this call.
    pub(crate) transitioned: bool,
    /// This call armed the recovery timer.
    pub(crate) recovery_armed: bool,
}

#[derive(Default)]
struct Recovery {
    armed: bool,
    // Bumped on every reset so a timer that already woke cannot restore health.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct HealthInner {
    healthy: AtomicBool,
    recovery: Mutex<Recovery>,
    config: Arc<FallbackConfig>,
}

impl HealthInner {
    fn restore(&self, generation: u64) -> bool {
        {
            let mut recovery = self.recovery.lock();
            if !recovery.armed || recovery.generation != generation {
                return false;
            }
            recovery.armed = false;
            recovery.timer = None;
            self.healthy.store(true, Ordering::Release);
        }

        #[cfg(feature = "tracing")]
        info!(connection = %self.config.name, "Recovery delay elapsed, routing back to primary");

        #[cfg(feature = "metrics")]
        {
            gauge!("cache_fallback_primary_healthy", "connection" => self.config.name.clone())
                .set(1.0);
            counter!("cache_fallback_recoveries_total", "connection" => self.config.name.clone())
                .increment(1);
        }

        self.config
            .event_listeners
            .emit_with(|| FallbackEvent::PrimaryRestored {
                connection: self.config.name.clone(),
                timestamp: Instant::now(),
            });
        true
    }
}

impl Drop for HealthInner {
    fn drop(&mut self) {
        if let Some(timer) = self.recovery.get_mut().timer.take() {
            timer.abort();
        }
    }
}

/// Shared health state of one connection's primary.
#[derive(Clone)]
pub(crate) struct HealthTracker {
    inner: Arc<HealthInner>,
}

impl HealthTracker {
    pub(crate) fn new(config: Arc<FallbackConfig>) -> Self {
        Self {
            inner: Arc::new(HealthInner {
                healthy: AtomicBool::new(true),
                recovery: Mutex::new(Recovery::default()),
                config,
            }),
        }
    }

    /// Returns whether the primary should currently be tried.
    pub(crate) fn is_healthy(&self) -> bool {
        self.inner.healthy.load(Ordering::Acquire)
    }

    pub(crate) fn snapshot(&self) -> HealthSnapshot {
        let recovery = self.inner.recovery.lock();
        HealthSnapshot {
            healthy: self.inner.healthy.load(Ordering::Acquire),
            recovery_armed: recovery.armed,
        }
    }

    /// Marks the primary unhealthy and arms the recovery timer if one is
    /// configured and none is pending.
    ///
    /// Must be called from within a Tokio runtime when a recovery delay is
    /// configured.
    pub(crate) fn mark_unhealthy(&self) -> Demotion {
        let config = &self.inner.config;

        let demotion = {
            let mut recovery = self.inner.recovery.lock();
            let transitioned = self.inner.healthy.swap(false, Ordering::AcqRel);

            let mut recovery_armed = false;
            if let Some(delay) = config.recovery_delay {
                if !recovery.armed {
                    recovery.armed = true;
                    recovery_armed = true;

                    let generation = recovery.generation;
                    let weak: Weak<HealthInner> = Arc::downgrade(&self.inner);
                    recovery.timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Some(inner) = weak.upgrade() {
                            inner.restore(generation);
                        }
                    }));
                }
            }

            Demotion {
                transitioned,
                recovery_armed,
            }
        };

        if demotion.transitioned {
            #[cfg(feature = "tracing")]
            warn!(
                connection = %config.name,
                recovery_delay_ms = config.recovery_delay.map(|d| d.as_millis() as u64),
                "Primary marked unhealthy, routing to secondary"
            );

            #[cfg(feature = "metrics")]
            gauge!("cache_fallback_primary_healthy", "connection" => config.name.clone()).set(0.0);

            config.event_listeners.emit_with(|| FallbackEvent::PrimaryDemoted {
                connection: config.name.clone(),
                timestamp: Instant::now(),
                recovery_armed: demotion.recovery_armed,
            });
        }

        demotion
    }

    /// Cancels any pending recovery timer without touching the healthy flag.
    pub(crate) fn cancel_recovery(&self) {
        let mut recovery = self.inner.recovery.lock();
        recovery.generation = recovery.generation.wrapping_add(1);
        recovery.armed = false;
        if let Some(timer) = recovery.timer.take() {
            timer.abort();
        }
    }

    /// Cancels any pending recovery timer and trusts the primary again.
    pub(crate) fn reset(&self) {
        let mut recovery = self.inner.recovery.lock();
        recovery.generation = recovery.generation.wrapping_add(1);
        recovery.armed = false;
        if let Some(timer) = recovery.timer.take() {
            timer.abort();
        }
        self.inner.healthy.store(true, Ordering::Release);

        #[cfg(feature = "metrics")]
        gauge!("cache_fallback_primary_healthy", "connection" => self.inner.config.name.clone())
            .set(1.0);
    }
}

impl std::fmt::Debug for HealthTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("HealthTracker")
            .field("healthy", &snapshot.healthy)
            .field("recovery_armed", &snapshot.recovery_armed)
            .finish()
    }
}

//! Events emitted by the fallback connection.

pub use cache_fallback_core::Operation;

use cache_fallback_core::{Event, Origin};
use std::time::{Duration, Instant};

/// Why a primary attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The primary returned an error.
    Error,
    /// The primary did not answer within the configured timeout.
    Timeout,
}

impl FailureKind {
    /// Returns `"error"` or `"timeout"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Error => "error",
            FailureKind::Timeout => "timeout",
        }
    }
}

/// Events emitted by a [`FallbackConnection`](crate::FallbackConnection).
#[derive(Debug, Clone)]
pub enum FallbackEvent {
    /// The primary served the operation.
    PrimarySucceeded {
        /// Name of the connection.
        connection: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The operation served.
        operation: Operation,
        /// How long the primary took.
        duration: Duration,
    },

    /// The primary failed or timed out; the secondary will be tried.
    PrimaryFailed {
        /// Name of the connection.
        connection: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The operation attempted.
        operation: Operation,
        /// Error or timeout.
        kind: FailureKind,
        /// Time spent on the primary before giving up.
        duration: Duration,
    },

    /// The primary was skipped because it is marked unhealthy.
    PrimaryBypassed {
        /// Name of the connection.
        connection: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The operation routed to the secondary.
        operation: Operation,
    },

    /// The secondary served the operation.
    FallbackApplied {
        /// Name of the connection.
        connection: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The operation served.
        operation: Operation,
    },

    /// The secondary failed too; the caller gets a disconnected error.
    FallbackFailed {
        /// Name of the connection.
        connection: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The operation that failed.
        operation: Operation,
    },

    /// The primary went from healthy to unhealthy.
    PrimaryDemoted {
        /// Name of the connection.
        connection: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Whether a recovery timer was armed by this demotion.
        recovery_armed: bool,
    },

    /// The recovery delay elapsed and the primary is trusted again.
    PrimaryRestored {
        /// Name of the connection.
        connection: String,
        /// When the event occurred.
        timestamp: Instant,
    },
}

impl Event for FallbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::PrimarySucceeded { .. } => "primary_succeeded",
            Self::PrimaryFailed { .. } => "primary_failed",
            Self::PrimaryBypassed { .. } => "primary_bypassed",
            Self::FallbackApplied { .. } => "fallback_applied",
            Self::FallbackFailed { .. } => "fallback_failed",
            Self::PrimaryDemoted { .. } => "primary_demoted",
            Self::PrimaryRestored { .. } => "primary_restored",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::PrimarySucceeded { timestamp, .. }
            | Self::PrimaryFailed { timestamp, .. }
            | Self::PrimaryBypassed { timestamp, .. }
            | Self::FallbackApplied { timestamp, .. }
            | Self::FallbackFailed { timestamp, .. }
            | Self::PrimaryDemoted { timestamp, .. }
            | Self::PrimaryRestored { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            Self::PrimarySucceeded { connection, .. }
            | Self::PrimaryFailed { connection, .. }
            | Self::PrimaryBypassed { connection, .. }
            | Self::FallbackApplied { connection, .. }
            | Self::FallbackFailed { connection, .. }
            | Self::PrimaryDemoted { connection, .. }
            | Self::PrimaryRestored { connection, .. } => connection,
        }
    }

    fn operation(&self) -> Option<Operation> {
        match self {
            Self::PrimarySucceeded { operation, .. }
            | Self::PrimaryFailed { operation, .. }
            | Self::PrimaryBypassed { operation, .. }
            | Self::FallbackApplied { operation, .. }
            | Self::FallbackFailed { operation, .. } => Some(*operation),
            Self::PrimaryDemoted { .. } | Self::PrimaryRestored { .. } => None,
        }
    }

    fn origin(&self) -> Option<Origin> {
        match self {
            Self::PrimarySucceeded { .. } => Some(Origin::Primary),
            Self::FallbackApplied { .. } => Some(Origin::Secondary),
            _ => None,
        }
    }
}

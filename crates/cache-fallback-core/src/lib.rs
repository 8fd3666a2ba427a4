//! Core infrastructure for cache-fallback.
//!
//! This crate holds the pieces every cache-fallback crate agrees on:
//! - The [`CacheBackend`] contract that storage engines implement and that the
//!   fallback connection both consumes and exposes
//! - Key, record, origin and operation types passed across that contract
//! - Backend and segment-name error types
//! - The event system used for observability

pub mod backend;
pub mod error;
pub mod events;

pub use backend::{validate_segment_name, CacheBackend, CacheRecord, Key, Operation, Origin};
pub use error::{BackendError, SegmentNameError};
pub use events::{Event, EventListener, EventListeners, FnListener};

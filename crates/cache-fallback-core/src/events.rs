//! Routing events for cache connections.
//!
//! A connection reports every routing decision it makes (primary served,
//! primary failed, secondary served, health changed) as a typed event.
//! Listeners see the operation and the origin of the answer without
//! matching on the concrete event type.

use crate::backend::{Operation, Origin};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by a cache connection.
pub trait Event: Send + Sync + fmt::Debug {
    /// Short snake_case name of the event (e.g. `"fallback_applied"`).
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;

    /// Name of the connection that emitted the event.
    fn source_name(&self) -> &str;

    /// The data operation the event belongs to. `None` for health changes.
    fn operation(&self) -> Option<Operation> {
        None
    }

    /// The backend that answered, for events that report a served operation.
    fn origin(&self) -> Option<Origin> {
        None
    }
}

/// Receives events of type `E`.
pub trait EventListener<E: Event>: Send + Sync {
    /// Called once per emitted event.
    fn on_event(&self, event: &E);
}

/// The listeners registered on one connection.
pub struct EventListeners<E: Event> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: Event> EventListeners<E> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Delivers `event` to every listener in registration order.
    ///
    /// A panicking listener does not stop delivery to the ones after it.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    /// Builds the event with `make` and delivers it, unless nobody listens.
    ///
    /// Routing code calls this on every operation; with no listener the
    /// connection name is never cloned.
    pub fn emit_with<F>(&self, make: F)
    where
        F: FnOnce() -> E,
    {
        if self.listeners.is_empty() {
            return;
        }
        self.emit(&make());
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: Event> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: Event> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F> {
    f: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: Event,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

//! Typed publish/subscribe registry for [`EventEnvelope`]s.
//!
//! [`EventDispatcher`] maps an [`EventFilter`] (one event type, or every
//! type) to the handlers registered for it. It is designed to be shared
//! via `Arc<EventDispatcher>`; the realtime connection owns one and feeds
//! it every decoded frame.
//!
//! Handlers are synchronous callbacks. The registry lock is released
//! before any handler runs, so a handler may subscribe or unsubscribe
//! from inside a dispatch pass. A panicking handler is logged and the
//! remaining handlers still run.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use pulse_core::EventType;

use crate::envelope::EventEnvelope;

/// A registered event callback.
///
/// Handlers are compared by reference: pass a clone of the same `Arc` to
/// [`EventDispatcher::unsubscribe`] to remove it.
pub type Handler = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

/// Which envelopes a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventFilter {
    /// Envelopes of exactly this type.
    Type(EventType),
    /// Every dispatched envelope, after the type-specific handlers.
    Any,
}

impl From<EventType> for EventFilter {
    fn from(event_type: EventType) -> Self {
        Self::Type(event_type)
    }
}

struct Registration {
    id: u64,
    handler: Handler,
}

/// In-process fan-out of decoded events to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Mutex<HashMap<EventFilter, Vec<Registration>>>,
    next_id: AtomicU64,
}

/// Disposer returned by [`EventDispatcher::subscribe`].
///
/// Dropping it leaves the handler registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
pub struct Subscription {
    id: u64,
    filter: EventFilter,
    dispatcher: Weak<EventDispatcher>,
}

impl Subscription {
    /// The filter this subscription was registered under.
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Remove the handler. A no-op if it is already gone or the
    /// dispatcher has been dropped.
    pub fn unsubscribe(self) {
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.remove(&self.filter, |reg| reg.id == self.id);
        }
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for envelopes matching `filter`.
    pub fn subscribe(
        self: &Arc<Self>,
        filter: impl Into<EventFilter>,
        handler: Handler,
    ) -> Subscription {
        let filter = filter.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.lock()
            .entry(filter.clone())
            .or_default()
            .push(Registration { id, handler });

        tracing::trace!(?filter, id, "Handler subscribed");

        Subscription {
            id,
            filter,
            dispatcher: Arc::downgrade(self),
        }
    }

    /// Remove every registration of `handler` under `filter`.
    pub fn unsubscribe(&self, filter: impl Into<EventFilter>, handler: &Handler) {
        self.remove(&filter.into(), |reg| Arc::ptr_eq(&reg.handler, handler));
    }

    /// Remove every handler for every filter.
    pub fn unsubscribe_all(&self) {
        self.lock().clear();
    }

    /// Total number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    /// Deliver `envelope` to the handlers for its type, then to the
    /// wildcard handlers.
    ///
    /// `pong` envelopes are never delivered.
    pub fn dispatch(&self, envelope: &EventEnvelope) {
        if envelope.event_type.is_heartbeat_reply() {
            tracing::trace!(event_type = %envelope.event_type, "Heartbeat reply not dispatched");
            return;
        }

        let handlers: Vec<Handler> = {
            let map = self.lock();
            let specific = map.get(&EventFilter::Type(envelope.event_type.clone()));
            let any = map.get(&EventFilter::Any);
            specific
                .into_iter()
                .chain(any)
                .flatten()
                .map(|reg| Arc::clone(&reg.handler))
                .collect()
        };

        for handler in handlers {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| handler(envelope))) {
                tracing::error!(
                    event_type = %envelope.event_type,
                    panic = %panic_message(panic.as_ref()),
                    "Event handler panicked",
                );
            }
        }
    }

    // ---- private helpers ----

    fn remove(&self, filter: &EventFilter, matches: impl Fn(&Registration) -> bool) {
        let mut map = self.lock();
        if let Some(regs) = map.get_mut(filter) {
            regs.retain(|reg| !matches(reg));
            if regs.is_empty() {
                map.remove(filter);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventFilter, Vec<Registration>>> {
        // Handlers never run under this lock, so poisoning only follows a
        // panic inside the registry itself; the map is still consistent.
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

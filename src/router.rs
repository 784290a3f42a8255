//! Per-kind dispatch of inbound server events.
//!
//! [`EventRouter`] maps each [`EventKind`] to at most one active handler.
//! Re-subscribing a kind replaces the previous handler, so repeated wiring
//! cycles can never leak handlers or double-deliver. Dispatch is synchronous
//! and strictly in arrival order; the router performs no reordering or
//! batching. A router is owned by exactly one sync loop and dropped with it,
//! which is what guarantees a torn-down consumer receives nothing further.

use std::collections::HashMap;

use tracing::debug;

use crate::protocol::{EventKind, ServerEvent};

/// A subscribed event handler.
pub type Handler = Box<dyn FnMut(ServerEvent) + Send>;

/// Routing table from event kind to its single active handler.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<EventKind, Handler>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `kind`, removing any previous one first.
    pub fn subscribe(&mut self, kind: EventKind, handler: Handler) {
        if self.handlers.insert(kind, handler).is_some() {
            debug!("replaced existing handler for {kind}");
        }
    }

    /// Remove the handler for `kind`. Returns whether one was registered.
    pub fn unsubscribe(&mut self, kind: EventKind) -> bool {
        self.handlers.remove(&kind).is_some()
    }

    /// Remove every handler.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for the event's kind. Returns whether a handler was
    /// registered; unrouted events are logged and dropped.
    pub fn dispatch(&mut self, event: ServerEvent) -> bool {
        let kind = event.kind();
        match self.handlers.get_mut(&kind) {
            Some(handler) => {
                handler(event);
                true
            }
            None => {
                debug!("no handler for {kind}, dropping event");
                false
            }
        }
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("subscribed", &self.handlers.len())
            .finish()
    }
}

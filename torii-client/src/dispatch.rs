//! Update dispatcher.
//!
//! Push notifications arrive on whatever thread the backend invokes its
//! callbacks on. Each registration picks a [`Delivery`]:
//!
//! - [`Delivery::Inline`] runs the handler right there, on the native thread.
//! - [`Delivery::Queued`] pushes the event onto a [`MainThreadQueue`] owned by
//!   the consumer, which drains it once per tick on its own thread.
//!
//! The queue is a single unbounded MPSC channel, so events keep the order in
//! which the backend produced them. There is no global dispatcher: every
//! client writes to the queue handle it was given.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use torii_types::{FieldElement, Model};
use tracing::debug;

/// Identifies one callback registration on one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl RegistrationId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reg-{}", self.0)
    }
}

/// Hands out registration ids for one backend.
#[derive(Debug, Default)]
pub(crate) struct RegistrationIds {
    next: u64,
}

impl RegistrationIds {
    pub(crate) fn next(&mut self) -> RegistrationId {
        self.next += 1;
        RegistrationId::new(self.next)
    }
}

/// A push notification from the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToriiEvent {
    /// The models attached to `key` changed.
    EntityUpdated { key: FieldElement, models: Vec<Model> },
    /// The synced model set changed.
    SyncModelUpdated,
}

/// An event tagged with the registration that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedEvent {
    pub registration: RegistrationId,
    pub event: ToriiEvent,
}

/// Consumer callback for inline delivery.
pub type EventHandler = Arc<dyn Fn(DispatchedEvent) + Send + Sync>;

/// Where a registration's events go.
#[derive(Clone)]
pub enum Delivery {
    /// Call the handler on the thread the backend invoked the callback on.
    Inline(EventHandler),
    /// Enqueue onto a [`MainThreadQueue`].
    Queued(EventSender),
}

impl Delivery {
    pub fn inline<F>(handler: F) -> Self
    where
        F: Fn(DispatchedEvent) + Send + Sync + 'static,
    {
        Self::Inline(Arc::new(handler))
    }

    pub fn queued(sender: EventSender) -> Self {
        Self::Queued(sender)
    }

    pub(crate) fn deliver(&self, event: DispatchedEvent) {
        match self {
            Self::Inline(handler) => handler(event),
            Self::Queued(sender) => sender.send(event),
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Delivery::Inline"),
            Self::Queued(_) => f.write_str("Delivery::Queued"),
        }
    }
}

/// Producer side of a [`MainThreadQueue`]. Cheap to clone, usable from any thread.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<DispatchedEvent>,
}

impl EventSender {
    /// Enqueues `event`. Dropped with a debug log if the queue is gone.
    pub fn send(&self, event: DispatchedEvent) {
        let registration = event.registration;
        if self.tx.send(event).is_err() {
            debug!(%registration, "main-thread queue dropped, discarding event");
        }
    }

    /// Whether the consumer's queue has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the dispatcher, owned by the main loop.
#[derive(Debug)]
pub struct MainThreadQueue {
    tx: mpsc::UnboundedSender<DispatchedEvent>,
    rx: mpsc::UnboundedReceiver<DispatchedEvent>,
}

impl MainThreadQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A sender that enqueues onto this queue.
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Shorthand for `Delivery::Queued(self.sender())`.
    pub fn delivery(&self) -> Delivery {
        Delivery::Queued(self.sender())
    }

    /// Number of events waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Runs `handler` on every event queued when the drain started, in order.
    ///
    /// Events that arrive while draining wait for the next tick. Returns the
    /// number of events handled.
    pub fn drain_with(&mut self, mut handler: impl FnMut(DispatchedEvent)) -> usize {
        let pending = self.rx.len();
        let mut handled = 0;
        while handled < pending {
            match self.rx.try_recv() {
                Ok(event) => {
                    handler(event);
                    handled += 1;
                }
                Err(_) => break,
            }
        }
        handled
    }

    /// Collects every event queued when the drain started, in order.
    pub fn drain(&mut self) -> Vec<DispatchedEvent> {
        let mut events = Vec::with_capacity(self.rx.len());
        self.drain_with(|event| events.push(event));
        events
    }
}

impl Default for MainThreadQueue {
    fn default() -> Self {
        Self::new()
    }
}

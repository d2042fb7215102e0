//! Event registration and dispatch.
//!
//! Observers subscribe to mutations of a specific element. Mutation paths
//! call `emit`, which is synchronous only up to enqueueing a dispatch
//! record; the callback itself runs later on an emission worker thread.
//! Delivery is in emit order per subscription; nothing is promised across
//! subscriptions.
//!
//! A subscription moves through `LIVE → DESTROY_REQUESTED → RECLAIMABLE`
//! monotonically; the final reference drop retires it for good.

pub(crate) mod emission;
pub(crate) mod registration;

use parking_lot::Mutex;
use semgraph::addr::Addr;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// The closed set of event kinds observers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A connector was threaded into the element's outgoing list.
    AddOutputArc,
    /// A connector was threaded into the element's incoming list.
    AddInputArc,
    /// A connector left the element's outgoing list.
    RemoveOutputArc,
    /// A connector left the element's incoming list.
    RemoveInputArc,
    /// The element itself was erased.
    RemoveElement,
    /// The element's link content changed.
    ContentChanged,
}

/// What a callback receives: the subscribed element, the kind, and the two
/// other participants (connector and opposite endpoint, where applicable).
#[derive(Debug, Clone, Copy)]
pub struct EventNotification {
    /// The subscribed element.
    pub element: Addr,
    /// The kind the subscription matched.
    pub kind: EventKind,
    /// The connector involved, or empty.
    pub connector: Addr,
    /// The opposite endpoint, or empty.
    pub other: Addr,
}

/// Callback invoked on the emission worker threads.
pub type EventCallback = dyn Fn(&EventNotification) + Send + Sync;
/// Callback invoked once when the subscription is destroyed.
pub type DeleteCallback = dyn FnOnce(Addr) + Send;

pub(crate) const STATE_LIVE: u8 = 0;
pub(crate) const STATE_DESTROY_REQUESTED: u8 = 1;
pub(crate) const STATE_RECLAIMABLE: u8 = 2;

/// One queued delivery for a subscription.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DispatchRecord {
    pub connector: Addr,
    pub other: Addr,
}

/// A registered observer of one element.
pub(crate) struct Subscription {
    pub element: Addr,
    pub kind: EventKind,
    pub callback: Box<EventCallback>,
    pub on_delete: Mutex<Option<Box<DeleteCallback>>>,
    /// Monotonic lifecycle state.
    pub state: AtomicU8,
    /// Per-subscription FIFO preserving emit order.
    pub pending: Mutex<VecDeque<DispatchRecord>>,
    /// Whether the subscription currently sits on the manager's work queue
    /// or is being drained; at most one drainer at a time.
    pub scheduled: AtomicBool,
}

impl Subscription {
    pub fn new(
        element: Addr,
        kind: EventKind,
        callback: Box<EventCallback>,
        on_delete: Option<Box<DeleteCallback>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            element,
            kind,
            callback,
            on_delete: Mutex::new(on_delete),
            state: AtomicU8::new(STATE_LIVE),
            pending: Mutex::new(VecDeque::new()),
            scheduled: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_LIVE
    }

    /// Advance the lifecycle state; transitions are monotonic, repeated
    /// requests are no-ops.
    pub fn advance_state(&self, to: u8) -> u8 {
        self.state.fetch_max(to, Ordering::AcqRel)
    }
}

/// Handle returned by `subscribe`, opaque to callers. Dropping the handle
/// does not destroy the subscription; pass it back to `destroy_event`.
pub struct EventHandle(pub(crate) Arc<Subscription>);

impl EventHandle {
    /// The element this subscription observes.
    pub fn element(&self) -> Addr {
        self.0.element
    }

    /// The kind this subscription observes.
    pub fn kind(&self) -> EventKind {
        self.0.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_state_is_monotonic() {
        let sub = Subscription::new(
            Addr::new(1, 1),
            EventKind::AddOutputArc,
            Box::new(|_| {}),
            None,
        );
        assert!(sub.is_live());

        assert_eq!(sub.advance_state(STATE_DESTROY_REQUESTED), STATE_LIVE);
        assert!(!sub.is_live());

        // Repeating the request is a no-op, and the state never goes back.
        assert_eq!(
            sub.advance_state(STATE_DESTROY_REQUESTED),
            STATE_DESTROY_REQUESTED
        );
        sub.advance_state(STATE_RECLAIMABLE);
        assert_eq!(sub.advance_state(STATE_DESTROY_REQUESTED), STATE_RECLAIMABLE);
    }

    #[test]
    fn handle_exposes_subscription_identity() {
        let sub = Subscription::new(
            Addr::new(2, 9),
            EventKind::ContentChanged,
            Box::new(|_| {}),
            None,
        );
        let handle = EventHandle(sub);
        assert_eq!(handle.element(), Addr::new(2, 9));
        assert_eq!(handle.kind(), EventKind::ContentChanged);
    }
}

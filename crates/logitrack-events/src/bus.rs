//! The tracker event bus.
//!
//! A thin domain wrapper around a [`broadcast`] channel. Publishing fans an
//! event out to every live subscription during the `publish` call itself;
//! nothing is deferred and nothing blocks on slow consumers. Each
//! subscription owns an independent cursor into a bounded buffer: a
//! subscriber that falls behind by more than the capacity skips ahead to
//! the newest events (oldest are dropped for that subscriber only, with a
//! logged warning).
//!
//! Subscriptions filter at the receiving end. A console view subscribes
//! with [`SubscriptionFilter::All`] and sees everything; an agent view
//! subscribes with [`SubscriptionFilter::Agent`] and sees only events
//! scoped to its own id. Dropping a [`Subscription`] removes it from the
//! bus; there is no registry to leak.

use logitrack_types::{AgentId, EventScope, TrackerEvent};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

/// Capacity of each subscription's event buffer.
///
/// A subscriber that falls behind by more than this many events skips to
/// the newest event and the gap is logged. Sized for the busiest realistic
/// feed (a full fleet simulating at once publishes well under this per
/// throttle window).
const SUBSCRIPTION_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// What slice of the event stream a subscription wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionFilter {
    /// Every event (console views).
    All,
    /// Only events scoped to one agent (agent views).
    Agent(AgentId),
}

impl SubscriptionFilter {
    /// Whether an event with the given scope passes this filter.
    ///
    /// Global events are console-relevant only; agent-scoped events pass
    /// both the all-events filter and the matching agent filter.
    pub fn matches(&self, scope: EventScope) -> bool {
        match (self, scope) {
            (Self::All, _) => true,
            (Self::Agent(subscribed), EventScope::Agent(scoped)) => *subscribed == scoped,
            (Self::Agent(_), EventScope::Global) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// In-process pub/sub hub for [`TrackerEvent`]s.
///
/// Constructed once in wiring and shared via `Arc`; every component that
/// publishes or subscribes is handed the same instance. There is no global
/// bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TrackerEvent>,
}

impl EventBus {
    /// Create a bus with the default per-subscription buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(SUBSCRIPTION_CAPACITY)
    }

    /// Create a bus with an explicit per-subscription buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Open a filtered subscription.
    ///
    /// The subscription starts receiving events published after this call;
    /// earlier events are never replayed.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            filter,
            rx: self.tx.subscribe(),
        }
    }

    /// Publish an event to every live subscription.
    ///
    /// Returns the number of subscriptions the event was buffered for
    /// (before filtering). Zero subscribers is normal -- publishing is
    /// fire-and-forget and never an error.
    pub fn publish(&self, event: &TrackerEvent) -> usize {
        // send returns Err only when there are zero receivers, which is
        // normal when no views are connected.
        self.tx.send(event.clone()).unwrap_or(0)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// A live, filtered view of the event stream.
///
/// Dropping the subscription unregisters it from the bus.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    filter: SubscriptionFilter,
    rx: broadcast::Receiver<TrackerEvent>,
}

impl Subscription {
    /// Token identifying this subscription in logs.
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The filter this subscription was opened with.
    pub const fn filter(&self) -> SubscriptionFilter {
        self.filter
    }

    /// Wait for the next event that passes the filter.
    ///
    /// Returns `None` once the bus has been dropped and the buffer is
    /// drained. A lagged subscriber logs the gap and continues from the
    /// newest available event.
    pub async fn recv(&mut self) -> Option<TrackerEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.filter.matches(event.scope()) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        subscription = %self.id,
                        skipped,
                        "Subscriber fell behind; dropping oldest events"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next already-buffered event that passes the filter, if any.
    ///
    /// Never waits. Useful for draining in tests and for opportunistic
    /// polling.
    pub fn try_recv(&mut self) -> Option<TrackerEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if self.filter.matches(event.scope()) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(
                        subscription = %self.id,
                        skipped,
                        "Subscriber fell behind; dropping oldest events"
                    );
                }
                Err(
                    broadcast::error::TryRecvError::Empty
                    | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }

    /// Close the subscription explicitly.
    ///
    /// Equivalent to dropping it; provided so call sites can state intent.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

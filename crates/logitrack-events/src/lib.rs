//! In-process event bus for the LogiTrack engine.
//!
//! Position updates, package changes, roster changes, and simulation
//! progress all flow through one [`EventBus`] instance. Views subscribe
//! with a [`SubscriptionFilter`] matching their role: the dispatch console
//! observes everything, an agent observes only itself.
//!
//! The bus is injected where needed (constructed once in server wiring);
//! components never reach for a global.

pub mod bus;

pub use bus::{EventBus, Subscription, SubscriptionFilter};

//! Shared application state for the gateway.

use std::time::Instant;

use logitrack_core::config::IdentityConfig;
use logitrack_core::tracker::Tracker;

use crate::geocode::Geocoder;

/// State injected into every handler via Axum's `State` extractor.
///
/// Wrapped in [`Arc`](std::sync::Arc) by the router. The tracker itself
/// is already cheap to clone; the gateway adds the identity table and
/// the geocode backend.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The engine facade.
    pub tracker: Tracker,
    /// Bearer-token table for authentication.
    pub identity: IdentityConfig,
    /// Address lookup backend.
    pub geocoder: Geocoder,
    /// Process start, for the status endpoint's uptime counter.
    pub started_at: Instant,
}

impl AppState {
    /// Bundle the gateway state.
    pub fn new(tracker: Tracker, identity: IdentityConfig, geocoder: Geocoder) -> Self {
        Self {
            tracker,
            identity,
            geocoder,
            started_at: Instant::now(),
        }
    }
}

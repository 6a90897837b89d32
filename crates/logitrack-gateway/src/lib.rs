//! HTTP + `WebSocket` gateway for the LogiTrack tracking engine.
//!
//! This crate is the only outer surface of the system. It exposes:
//!
//! - **REST endpoints** for position reports, package management,
//!   delivery control, and geocoding
//! - **A `WebSocket` stream** (`/ws/track`) pushing every tracker event
//!   to connected views, filtered by role
//! - **Token authentication** with console and agent scoping, or an
//!   open local-demo mode when no tokens are configured
//!
//! # Modules
//!
//! - [`error`] -- [`GatewayError`] and its HTTP status mapping
//! - [`geocode`] -- address lookups clipped to the service area
//! - [`handlers`] -- REST endpoint handlers
//! - [`identity`] -- token table resolution and role scoping
//! - [`router`] -- route table assembly
//! - [`server`] -- TCP bind and serve loop
//! - [`state`] -- shared [`AppState`]
//! - [`ws`] -- the live event stream
//!
//! [`GatewayError`]: error::GatewayError
//! [`AppState`]: state::AppState

pub mod error;
pub mod geocode;
pub mod handlers;
pub mod identity;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use error::GatewayError;
pub use geocode::{GeocodeError, Geocoder};
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;

//! Shared type definitions for the LogiTrack delivery tracking engine.
//!
//! This crate is the single source of truth for all types used across the
//! LogiTrack workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the console and agent frontends.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe integer wrappers for entity identifiers
//! - [`geo`] -- WGS84 coordinate and position primitives
//! - [`enums`] -- Enumeration types (package status, roles, phases)
//! - [`structs`] -- Core entity structs (agents, packages, routes)
//! - [`events`] -- Bus/WebSocket event types and simulation views

pub mod enums;
pub mod events;
pub mod geo;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{PackageStatus, Role, RouteKind, SimulationPhase};
pub use events::{EventScope, SimulationEvent, SimulationStatus, SimulationView, TrackerEvent};
pub use geo::{Coordinate, LATITUDE_RANGE, LONGITUDE_RANGE, Position};
pub use ids::{AgentId, PackageId, SimulationId};
pub use structs::{AgentRecord, Package, Route, TrackedPosition};

//! Enumeration types for the delivery tracking engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Package status
// ---------------------------------------------------------------------------

/// Delivery lifecycle status of a package.
///
/// The legal walk is `Assigned -> InTransit -> Delivered` or
/// `Assigned -> InTransit -> Returned`. `Delivered` and `Returned` are
/// terminal. Transition legality is enforced by the package lifecycle
/// component; this type only names the states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum PackageStatus {
    /// Assigned to an agent, waiting for the delivery run to start.
    Assigned,
    /// A delivery simulation for this package is (or was) underway.
    InTransit,
    /// Delivered at the destination. Terminal.
    Delivered,
    /// Sent back without completing the delivery. Terminal.
    Returned,
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Role attached to a connection by the identity boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Role {
    /// Dispatch console: observes every agent.
    Console,
    /// Delivery agent: observes only its own events.
    Agent,
}

// ---------------------------------------------------------------------------
// Simulation phases
// ---------------------------------------------------------------------------

/// Phase of a simulation event on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum SimulationPhase {
    /// A new simulation was installed; the event carries the full route.
    Start,
    /// The agent advanced along the route (published every 5th step and on
    /// the final step).
    Update,
    /// The route was walked to the end. Published exactly once per run.
    Complete,
    /// The run was superseded or cancelled before reaching the end.
    Cancelled,
}

// ---------------------------------------------------------------------------
// Route kinds
// ---------------------------------------------------------------------------

/// How a route was synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum RouteKind {
    /// Street-like perturbed path with turns and jitter.
    Street,
    /// Straight-line interpolation (degenerate input fallback).
    Straight,
}

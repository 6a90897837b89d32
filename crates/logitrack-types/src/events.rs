//! Event types fanned out over the in-process bus and the WebSocket feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::SimulationPhase;
use crate::geo::{Coordinate, Position};
use crate::ids::{AgentId, PackageId, SimulationId};
use crate::structs::{Package, Route};

// ---------------------------------------------------------------------------
// Simulation events
// ---------------------------------------------------------------------------

/// One step of a simulation's life, as published on the bus.
///
/// `Start` carries the full route so a subscriber can draw the path once;
/// `Update` carries only the current position and step. This keeps the
/// per-tick broadcast volume bounded regardless of route length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationEvent {
    /// Generation id of the run this event belongs to.
    pub simulation_id: SimulationId,
    /// The agent being animated.
    pub agent_id: AgentId,
    /// The package being delivered.
    pub package_id: PackageId,
    /// What happened.
    pub phase: SimulationPhase,
    /// Current step index into the route.
    pub step: u32,
    /// Total number of route points.
    pub total_steps: u32,
    /// Current synthetic position (`Update` events).
    pub position: Option<Coordinate>,
    /// Full route (`Start` events only).
    pub route: Option<Route>,
    /// Where the run is headed.
    pub destination: Coordinate,
    /// Human-readable destination, when known.
    pub address: Option<String>,
}

/// Snapshot view of a live simulation, as returned by status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationView {
    /// Generation id of the run.
    pub simulation_id: SimulationId,
    /// The agent being animated.
    pub agent_id: AgentId,
    /// The package being delivered.
    pub package_id: PackageId,
    /// Current step index into the route.
    pub step: u32,
    /// Total number of route points.
    pub total_steps: u32,
    /// The route being walked. Included so a view that joined after the
    /// `Start` event can still draw the path.
    pub route: Route,
    /// Where the run is headed.
    pub destination: Coordinate,
    /// Human-readable destination, when known.
    pub address: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

/// Whether an agent currently has a live simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum SimulationStatus {
    /// No live simulation for the agent.
    Idle,
    /// A simulation is underway.
    Running(SimulationView),
}

// ---------------------------------------------------------------------------
// Bus events
// ---------------------------------------------------------------------------

/// Everything that can be published on the tracker bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum TrackerEvent {
    /// An agent reported a new real position.
    PositionChanged {
        /// The reporting agent.
        agent_id: AgentId,
        /// The accepted position.
        position: Position,
    },
    /// The set of active agents changed.
    ActiveAgentsChanged {
        /// The full active id list after the change.
        active: Vec<AgentId>,
    },
    /// A package changed (status, assignment, creation).
    PackageUpdated {
        /// The package after the change.
        package: Package,
    },
    /// A simulation produced a lifecycle or progress event.
    Simulation(SimulationEvent),
}

/// Which subscribers an event is relevant to.
///
/// Used by the bus to match events against subscription filters: agent
/// views receive only events scoped to their own id, while console
/// subscriptions receive everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    /// Relevant to every subscriber with an all-agents filter.
    Global,
    /// Relevant to one agent (and to all-agents subscribers).
    Agent(AgentId),
}

impl TrackerEvent {
    /// The scope the bus uses to match this event against filters.
    pub fn scope(&self) -> EventScope {
        match self {
            Self::PositionChanged { agent_id, .. } => EventScope::Agent(*agent_id),
            Self::ActiveAgentsChanged { .. } => EventScope::Global,
            Self::PackageUpdated { package } => package
                .assigned_agent
                .map_or(EventScope::Global, EventScope::Agent),
            Self::Simulation(event) => EventScope::Agent(event.agent_id),
        }
    }
}

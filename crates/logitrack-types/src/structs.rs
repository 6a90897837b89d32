//! Core entity structs: agents, packages, and routes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{PackageStatus, RouteKind};
use crate::geo::{Coordinate, Position};
use crate::ids::{AgentId, PackageId};

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Roster entry for a delivery agent.
///
/// Agents are created by the backoffice and hydrated at startup; at runtime
/// they are never deleted, only flipped inactive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentRecord {
    /// Stable integer id assigned by the backoffice.
    pub id: AgentId,
    /// Display name shown on console markers.
    pub name: String,
    /// Whether the agent currently has a live session.
    pub active: bool,
}

/// A named, timestamped agent position as shown on the console map.
///
/// This is the display row that overlap resolution operates on; the
/// coordinate here may be nudged away from the stored position so that
/// coincident markers stay individually clickable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TrackedPosition {
    /// The agent this row belongs to.
    pub agent_id: AgentId,
    /// Agent display name.
    pub name: String,
    /// Display coordinate (possibly nudged).
    pub coordinate: Coordinate,
    /// Capture time of the underlying position.
    pub recorded_at: DateTime<Utc>,
}

impl TrackedPosition {
    /// Build a display row from a roster entry and a stored position.
    pub fn from_position(id: AgentId, name: String, position: &Position) -> Self {
        Self {
            agent_id: id,
            name,
            coordinate: position.coordinate,
            recorded_at: position.recorded_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Packages
// ---------------------------------------------------------------------------

/// A package moving through the delivery lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Package {
    /// Stable integer id assigned by the backoffice.
    pub id: PackageId,
    /// Human-readable destination address.
    pub address: String,
    /// Destination coordinate, when already resolved.
    pub destination: Option<Coordinate>,
    /// The agent responsible for the delivery, if assigned.
    pub assigned_agent: Option<AgentId>,
    /// Current lifecycle status.
    pub status: PackageStatus,
    /// When the status last changed.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// An immutable ordered list of route points.
///
/// Routes are produced once by the synthesizer and then only read; the
/// points are deliberately private so no caller can reshape a route the
/// scheduler is walking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Route {
    points: Vec<Coordinate>,
    kind: RouteKind,
}

impl Route {
    /// Build a route from synthesized points.
    pub const fn new(points: Vec<Coordinate>, kind: RouteKind) -> Self {
        Self { points, kind }
    }

    /// The ordered route points.
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    /// Point at `step`, if the route is that long.
    pub fn point_at(&self, step: u32) -> Option<Coordinate> {
        self.points.get(usize::try_from(step).ok()?).copied()
    }

    /// The final point (the destination, modulo jitter).
    pub fn last_point(&self) -> Option<Coordinate> {
        self.points.last().copied()
    }

    /// Number of points as a step count.
    pub fn total_steps(&self) -> u32 {
        u32::try_from(self.points.len()).unwrap_or(u32::MAX)
    }

    /// Whether the route has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// How the route was synthesized.
    pub const fn kind(&self) -> RouteKind {
        self.kind
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn route_accessors() {
        let points = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.5, 0.5),
            Coordinate::new(1.0, 1.0),
        ];
        let route = Route::new(points, RouteKind::Street);
        assert_eq!(route.total_steps(), 3);
        assert!(!route.is_empty());
        assert_eq!(route.point_at(1).unwrap(), Coordinate::new(0.5, 0.5));
        assert!(route.point_at(3).is_none());
        assert_eq!(route.last_point().unwrap(), Coordinate::new(1.0, 1.0));
        assert_eq!(route.kind(), RouteKind::Street);
    }

    #[test]
    fn package_serializes_with_snake_case_fields() {
        let package = Package {
            id: PackageId::new(9),
            address: String::from("Carrer de Mallorca 401"),
            destination: Some(Coordinate::new(41.4036, 2.1744)),
            assigned_agent: Some(AgentId::new(3)),
            status: PackageStatus::Assigned,
            updated_at: DateTime::<Utc>::MIN_UTC,
        };
        let json = serde_json::to_value(&package).unwrap();
        assert_eq!(json.get("assigned_agent").unwrap(), 3);
        assert_eq!(json.get("status").unwrap(), "Assigned");
    }
}

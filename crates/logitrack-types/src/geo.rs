//! Geographic primitives.
//!
//! All coordinates are WGS84 decimal degrees, the same frame the tracking
//! devices and the map frontends use. The engine does no projection; route
//! synthesis and overlap displacement work directly in degree space, which
//! is accurate enough at city scale (1e-3 degrees is roughly 100 m).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Latitude bounds in decimal degrees.
pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);

/// Longitude bounds in decimal degrees.
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

// ---------------------------------------------------------------------------
// Coordinate
// ---------------------------------------------------------------------------

/// A WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Coordinate {
    /// Latitude in decimal degrees, valid range -90 to 90.
    pub latitude: f64,
    /// Longitude in decimal degrees, valid range -180 to 180.
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate from raw degree values. No validation is
    /// performed here; callers that accept external input go through
    /// [`Coordinate::is_in_bounds`] first.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and inside the WGS84 ranges.
    pub const fn is_in_bounds(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= LATITUDE_RANGE.0
            && self.latitude <= LATITUDE_RANGE.1
            && self.longitude >= LONGITUDE_RANGE.0
            && self.longitude <= LONGITUDE_RANGE.1
    }

    /// Clamp both components into the WGS84 ranges.
    ///
    /// Used for synthetic route points, where jitter near a range edge may
    /// push a value slightly out of bounds.
    pub const fn clamped(self) -> Self {
        Self {
            latitude: self.latitude.clamp(LATITUDE_RANGE.0, LATITUDE_RANGE.1),
            longitude: self.longitude.clamp(LONGITUDE_RANGE.0, LONGITUDE_RANGE.1),
        }
    }

    /// Planar distance to another coordinate, in degrees.
    ///
    /// Not a geodesic distance; good enough for overlap separation and
    /// degenerate-route checks at city scale.
    pub fn degree_distance(&self, other: &Self) -> f64 {
        (self.latitude - other.latitude).hypot(self.longitude - other.longitude)
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A recorded agent position: where, and when it was captured.
///
/// Positions are immutable once stored; newer fixes replace them wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// The recorded point.
    pub coordinate: Coordinate,
    /// When the fix was captured (device time for real fixes, engine time
    /// for synthetic route points).
    pub recorded_at: DateTime<Utc>,
}

impl Position {
    /// Create a position from a coordinate and capture time.
    pub const fn new(coordinate: Coordinate, recorded_at: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            recorded_at,
        }
    }
}

//! Error types for position and roster tracking.

use chrono::{DateTime, Utc};
use logitrack_types::AgentId;

/// Errors that can occur while recording positions or flipping sessions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackingError {
    /// The referenced agent is not in the roster.
    #[error("agent {0} is not in the roster")]
    UnknownAgent(AgentId),

    /// A coordinate was non-finite or outside the WGS84 ranges.
    #[error("coordinate ({latitude}, {longitude}) is not a valid WGS84 point")]
    InvalidCoordinate {
        /// The rejected latitude.
        latitude: f64,
        /// The rejected longitude.
        longitude: f64,
    },

    /// An incoming fix was not strictly newer than the stored one.
    #[error("stale fix for agent {agent_id}: {incoming} is not after {stored}")]
    StaleTimestamp {
        /// The agent whose fix was rejected.
        agent_id: AgentId,
        /// Capture time of the rejected fix.
        incoming: DateTime<Utc>,
        /// Capture time of the fix already stored.
        stored: DateTime<Utc>,
    },
}

//! Error types for engine commands.

use logitrack_tracking::TrackingError;
use logitrack_types::{AgentId, PackageId, PackageStatus};

/// Errors surfaced by the engine command surface.
///
/// Tracking errors (unknown agent, bad coordinate, stale fix) pass
/// through unchanged; the variants here cover packages and simulations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    /// A position or roster operation failed.
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    /// The referenced package does not exist.
    #[error("package {0} does not exist")]
    UnknownPackage(PackageId),

    /// A delivery was started for an agent with no recorded position.
    #[error("agent {0} has no recorded position to start from")]
    AgentPositionUnknown(AgentId),

    /// A delivery was started for a package assigned to someone else.
    #[error("package {package_id} is not assigned to agent {agent_id}")]
    NotAssignedToAgent {
        /// The package named in the command.
        package_id: PackageId,
        /// The agent the command was issued for.
        agent_id: AgentId,
        /// Who the package is actually assigned to, if anyone.
        assigned: Option<AgentId>,
    },

    /// A package-status edge that the lifecycle does not allow.
    #[error("package {package_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// The package whose transition was rejected.
        package_id: PackageId,
        /// Status the package is currently in.
        from: PackageStatus,
        /// Status the operation required or targeted.
        to: PackageStatus,
    },

    /// Neither the command nor the package carried a destination.
    #[error("package {0} has no resolved destination")]
    DestinationUnknown(PackageId),
}

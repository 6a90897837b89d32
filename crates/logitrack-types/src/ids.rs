//! Type-safe identifier wrappers around integer ids.
//!
//! Agents and packages are created by the fleet backoffice and arrive with
//! stable integer ids; the engine never generates them. Wrapping the raw
//! `u64` in distinct newtypes prevents accidental mixing of identifiers at
//! compile time (an agent id can never be passed where a package id is
//! expected).
//!
//! [`SimulationId`] is the one engine-generated id: a per-engine generation
//! counter handed out by the scheduler, strictly increasing for the life of
//! the process.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Generates a newtype wrapper around `u64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(#[ts(type = "number")] pub u64);

        impl $name {
            /// Wrap a raw integer id.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Return the inner integer value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a delivery agent.
    AgentId
}

define_id! {
    /// Unique identifier for a package.
    PackageId
}

define_id! {
    /// Generation counter identifying one simulation run.
    ///
    /// Issued by the scheduler when a simulation starts. A new run for the
    /// same agent always carries a larger id than the run it supersedes.
    SimulationId
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let agent = AgentId::new(7);
        let package = PackageId::new(7);
        // Different types -- the compiler enforces no mixing, even when the
        // raw values collide.
        assert_eq!(agent.into_inner(), package.into_inner());
    }

    #[test]
    fn id_roundtrip_serde() {
        let original = AgentId::new(42);
        let json = serde_json::to_string(&original).unwrap();
        // Newtype structs serialize as the bare inner value.
        assert_eq!(json, "42");
        let restored: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn id_display_matches_inner() {
        let id = PackageId::new(1234);
        assert_eq!(id.to_string(), "1234");
    }

    #[test]
    fn simulation_ids_order_by_generation() {
        assert!(SimulationId::new(2) > SimulationId::new(1));
    }
}

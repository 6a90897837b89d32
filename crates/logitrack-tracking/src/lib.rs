//! Position and session tracking for the LogiTrack engine.
//!
//! Two pieces of plain-data state, both publishing on the shared bus:
//!
//! - [`PositionStore`] -- validated, per-agent-monotonic last-known
//!   positions, with a silent synthetic write path for the scheduler
//! - [`ActiveAgentRegistry`] -- the agent roster and live-session set
//!
//! Neither type locks internally; the engine facade owns both behind its
//! own lock and hands out snapshots.

pub mod error;
pub mod registry;
pub mod store;

pub use error::TrackingError;
pub use registry::ActiveAgentRegistry;
pub use store::PositionStore;

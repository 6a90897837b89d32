//! Route synthesis and marker overlap resolution for LogiTrack.
//!
//! Pure geometry, no state and no IO:
//!
//! - [`synth`] -- turn the pair (current position, destination) into a
//!   plausible street-like [`logitrack_types::Route`], deterministic under
//!   an injected RNG
//! - [`overlap`] -- nudge coincident console markers apart for display

pub mod overlap;
pub mod synth;

pub use overlap::resolve_overlaps;
pub use synth::{DEFAULT_TOTAL_STEPS, synthesize};

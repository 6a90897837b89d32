//! Engine core for LogiTrack: configuration, lifecycle, scheduling, and
//! the facade gluing them together.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `logitrack.yaml` into
//!   strongly-typed structs, with env overrides
//! - [`error`] -- The engine-level [`TrackerError`]
//! - [`lifecycle`] -- Package records and their forward-only status walk
//! - [`persist`] -- Pluggable agent/package storage with write-through
//!   semantics
//! - [`scheduler`] -- Tick-driven per-agent route animation
//! - [`tracker`] -- The [`Tracker`] facade and shared engine state
//!
//! [`TrackerError`]: error::TrackerError
//! [`Tracker`]: tracker::Tracker

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod persist;
pub mod scheduler;
pub mod tracker;

pub use config::{ConfigError, TrackerConfig};
pub use error::TrackerError;
pub use lifecycle::PackageLifecycle;
pub use persist::{PersistError, PersistenceProvider};
pub use scheduler::SimulationScheduler;
pub use tracker::{EngineState, SharedState, Tracker, TrackerStats};

//! Error types for the server binary.
//!
//! [`BootError`] is the top-level error type that wraps all possible
//! failure modes during server startup and serving.

/// Top-level error for the server binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: logitrack_core::config::ConfigError,
    },

    /// Stored agents or packages could not be read.
    #[error("hydration error: {source}")]
    Hydrate {
        /// The underlying persistence error.
        #[from]
        source: logitrack_core::persist::PersistError,
    },

    /// Geocoder construction failed.
    #[error("geocoder error: {source}")]
    Geocode {
        /// The underlying geocoder error.
        #[from]
        source: logitrack_gateway::geocode::GeocodeError,
    },

    /// The gateway failed to bind or serve.
    #[error("gateway error: {source}")]
    Gateway {
        /// The underlying server error.
        #[from]
        source: logitrack_gateway::server::ServerError,
    },
}

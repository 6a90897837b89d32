//! Server binary for the LogiTrack delivery tracker.
//!
//! This is the main entry point that wires together the tracking engine,
//! the delivery simulation scheduler, persistence, geocoding, and the
//! HTTP/WebSocket gateway. It loads configuration, hydrates stored
//! state, and serves the API until the process is stopped.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `logitrack.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the persistence provider
//! 4. Build the geocoder
//! 5. Create the event bus and tracker, hydrate stored state
//! 6. Spawn the package lifecycle listener
//! 7. Serve the gateway API

mod error;

use std::path::Path;
use std::sync::Arc;

use logitrack_core::config::{ConfigError, TrackerConfig};
use logitrack_core::persist::PersistenceProvider;
use logitrack_core::tracker::Tracker;
use logitrack_events::EventBus;
use logitrack_gateway::geocode::Geocoder;
use logitrack_gateway::state::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::BootError;

/// Name of the configuration file, resolved against the working directory.
const CONFIG_FILE: &str = "logitrack.yaml";

/// Application entry point for the server.
///
/// Initializes all subsystems and serves the gateway API. Returns an
/// error code on failure.
///
/// # Errors
///
/// Returns an error if any startup step fails or the listener dies.
#[tokio::main]
async fn main() -> Result<(), BootError> {
    // 1. Load configuration. Logging is not up yet, so remember whether
    //    a file was found and report it afterwards.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging. `RUST_LOG` wins over the config
    //    file when both are set.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("logitrack-server starting");
    if from_file {
        info!(path = CONFIG_FILE, "Configuration loaded");
    } else {
        info!("Config file not found, using defaults");
    }
    info!(
        tick_interval_ms = config.simulation.tick_interval_ms,
        route_steps = config.simulation.route_steps,
        broadcast_every = config.simulation.broadcast_every,
        tokens = config.identity.tokens.len(),
        "Engine settings"
    );

    // 3. Build the persistence provider.
    let persistence = PersistenceProvider::from_config(&config.persistence)?;
    info!(provider = persistence.name(), "Persistence provider ready");

    // 4. Build the geocoder.
    let geocoder = Geocoder::from_config(&config.geocode)?;
    info!(
        provider = geocoder.name(),
        center_latitude = config.geocode.center_latitude,
        center_longitude = config.geocode.center_longitude,
        coverage_radius_degrees = config.geocode.coverage_radius_degrees,
        "Geocoder ready"
    );

    // 5. Create the tracker and hydrate stored state.
    let bus = EventBus::new();
    let tracker = Tracker::new(config.simulation.clone(), bus, persistence);
    tracker.hydrate().await?;

    // 6. Spawn the package lifecycle listener so simulation phases fold
    //    into package status.
    let _lifecycle_handle = tracker.spawn_lifecycle_listener();
    info!("Package lifecycle listener started");

    // 7. Serve the gateway API. This blocks until the listener dies.
    let state = Arc::new(AppState::new(tracker, config.identity.clone(), geocoder));
    logitrack_gateway::server::start_server(&config.gateway, state).await?;

    info!("logitrack-server shutdown complete");
    Ok(())
}

/// Load configuration from [`CONFIG_FILE`] in the working directory.
///
/// Returns the parsed config and whether a file was found. A missing
/// file is not an error; the defaults describe a runnable setup.
fn load_config() -> Result<(TrackerConfig, bool), ConfigError> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        Ok((TrackerConfig::from_file(path)?, true))
    } else {
        Ok((TrackerConfig::default(), false))
    }
}

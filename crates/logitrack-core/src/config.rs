//! Configuration loading and typed config structures for the engine.
//!
//! The canonical configuration lives in `logitrack.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads, applies environment
//! overrides, and validates the file. Every section and field has a
//! default, so an empty file (or no file at all) is a runnable setup.

use std::path::Path;

use logitrack_types::{AgentId, Role};
use serde::Deserialize;

/// Valid range for the scheduler tick interval, in milliseconds.
pub const TICK_INTERVAL_RANGE_MS: (u64, u64) = (50, 5_000);

/// Upper bound on synthesized route length, in points.
pub const MAX_ROUTE_STEPS: u32 = 80;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A numeric setting fell outside its allowed range.
    #[error("{field} = {value} is outside the allowed range {allowed}")]
    OutOfRange {
        /// Dotted path of the offending setting.
        field: &'static str,
        /// The rejected value.
        value: u64,
        /// Human-readable description of the allowed range.
        allowed: &'static str,
    },

    /// A setting named a provider this build does not know.
    #[error("unsupported {field}: {value:?} (expected {expected})")]
    Unsupported {
        /// Dotted path of the offending setting.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// The provider names this build accepts.
        expected: &'static str,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `logitrack.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TrackerConfig {
    /// Simulation tick and route settings.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// HTTP/WebSocket gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Geocoding provider settings.
    #[serde(default)]
    pub geocode: GeocodeConfig,

    /// Bearer-token identity table.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Agent/package persistence settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TrackerConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for deployment knobs:
    /// - `LOGITRACK_HOST` overrides `gateway.host`
    /// - `LOGITRACK_PORT` overrides `gateway.port`
    /// - `LOGITRACK_DATA_DIR` overrides `persistence.path`
    /// - `NOMINATIM_URL` overrides `geocode.base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::OutOfRange`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::OutOfRange`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override deployment knobs with environment variables when set.
    ///
    /// This allows containerized deployments to set host, port, and data
    /// paths without modifying the YAML config file. Unparsable numeric
    /// values are ignored in favor of the file value.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LOGITRACK_HOST") {
            self.gateway.host = val;
        }
        if let Ok(val) = std::env::var("LOGITRACK_PORT") {
            if let Ok(port) = val.parse() {
                self.gateway.port = port;
            }
        }
        if let Ok(val) = std::env::var("LOGITRACK_DATA_DIR") {
            self.persistence.path = val;
        }
        if let Ok(val) = std::env::var("NOMINATIM_URL") {
            self.geocode.base_url = val;
        }
    }

    /// Check every numeric setting against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = TICK_INTERVAL_RANGE_MS;
        if !(min..=max).contains(&self.simulation.tick_interval_ms) {
            return Err(ConfigError::OutOfRange {
                field: "simulation.tick_interval_ms",
                value: self.simulation.tick_interval_ms,
                allowed: "50..=5000",
            });
        }
        if self.simulation.broadcast_every == 0 {
            return Err(ConfigError::OutOfRange {
                field: "simulation.broadcast_every",
                value: 0,
                allowed: "1 or more",
            });
        }
        if !(2..=MAX_ROUTE_STEPS).contains(&self.simulation.route_steps) {
            return Err(ConfigError::OutOfRange {
                field: "simulation.route_steps",
                value: u64::from(self.simulation.route_steps),
                allowed: "2..=80",
            });
        }
        if self.geocode.timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "geocode.timeout_ms",
                value: 0,
                allowed: "1 or more",
            });
        }
        Ok(())
    }
}

/// Simulation tick and route settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Real-time milliseconds per scheduler tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Publish an `Update` event every N steps (the final step always
    /// publishes).
    #[serde(default = "default_broadcast_every")]
    pub broadcast_every: u32,

    /// Number of points in a synthesized street route.
    #[serde(default = "default_route_steps")]
    pub route_steps: u32,

    /// Fixed seed for route randomness; unset means a fresh seed per run.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            broadcast_every: default_broadcast_every(),
            route_steps: default_route_steps(),
            seed: None,
        }
    }
}

/// HTTP/WebSocket gateway settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Geocoding provider settings.
///
/// The coverage center and radius describe the service area: a resolved
/// destination outside the box is rejected as undeliverable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeocodeConfig {
    /// Provider name: `nominatim` or `fixture`.
    #[serde(default = "default_geocode_provider")]
    pub provider: String,

    /// Base URL of the Nominatim instance.
    #[serde(default = "default_nominatim_url")]
    pub base_url: String,

    /// User-Agent header sent with every request (Nominatim requires an
    /// identifying one).
    #[serde(default = "default_geocode_user_agent")]
    pub user_agent: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_geocode_timeout_ms")]
    pub timeout_ms: u64,

    /// Latitude of the service-area center.
    #[serde(default = "default_center_latitude")]
    pub center_latitude: f64,

    /// Longitude of the service-area center.
    #[serde(default = "default_center_longitude")]
    pub center_longitude: f64,

    /// Half-width of the service-area box, in degrees.
    #[serde(default = "default_coverage_radius")]
    pub coverage_radius_degrees: f64,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            provider: default_geocode_provider(),
            base_url: default_nominatim_url(),
            user_agent: default_geocode_user_agent(),
            timeout_ms: default_geocode_timeout_ms(),
            center_latitude: default_center_latitude(),
            center_longitude: default_center_longitude(),
            coverage_radius_degrees: default_coverage_radius(),
        }
    }
}

/// One bearer token and the identity it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenConfig {
    /// The literal bearer token value.
    pub token: String,

    /// Role granted to connections presenting this token.
    pub role: Role,

    /// Agent identity bound to the token (agent-role tokens).
    #[serde(default)]
    pub agent_id: Option<AgentId>,
}

/// Bearer-token identity table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdentityConfig {
    /// Static tokens. An empty table disables token checks and trusts
    /// caller-supplied role and agent id parameters.
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

/// Agent/package persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    /// Provider name: `memory` or `json-file`.
    #[serde(default = "default_persistence_provider")]
    pub provider: String,

    /// Data directory for the `json-file` provider.
    #[serde(default = "default_persistence_path")]
    pub path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            provider: default_persistence_provider(),
            path: default_persistence_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset (trace, debug, info,
    /// warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_tick_interval_ms() -> u64 {
    200
}

const fn default_broadcast_every() -> u32 {
    5
}

const fn default_route_steps() -> u32 {
    80
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

fn default_geocode_provider() -> String {
    "nominatim".to_owned()
}

fn default_nominatim_url() -> String {
    "https://nominatim.openstreetmap.org".to_owned()
}

fn default_geocode_user_agent() -> String {
    "logitrack/0.1".to_owned()
}

const fn default_geocode_timeout_ms() -> u64 {
    3_000
}

const fn default_center_latitude() -> f64 {
    41.3874
}

const fn default_center_longitude() -> f64 {
    2.1686
}

const fn default_coverage_radius() -> f64 {
    0.18
}

fn default_persistence_provider() -> String {
    "memory".to_owned()
}

fn default_persistence_path() -> String {
    "data".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TrackerConfig::default();
        assert_eq!(config.simulation.tick_interval_ms, 200);
        assert_eq!(config.simulation.broadcast_every, 5);
        assert_eq!(config.simulation.route_steps, 80);
        assert_eq!(config.gateway.port, 8080);
        assert!(config.identity.tokens.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
simulation:
  tick_interval_ms: 100
  broadcast_every: 2
  route_steps: 40
  seed: 7

gateway:
  host: "127.0.0.1"
  port: 9090

geocode:
  provider: "fixture"
  base_url: "http://localhost:7070"
  user_agent: "logitrack-test"
  timeout_ms: 500
  center_latitude: 41.39
  center_longitude: 2.17
  coverage_radius_degrees: 0.25

identity:
  tokens:
    - token: "console-secret"
      role: Console
    - token: "agent-3-secret"
      role: Agent
      agent_id: 3

persistence:
  provider: "json-file"
  path: "demo-data"

logging:
  level: "debug"
"#;
        let config = TrackerConfig::parse(yaml).unwrap();

        assert_eq!(config.simulation.tick_interval_ms, 100);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.gateway.port, 9090);
        assert_eq!(config.geocode.provider, "fixture");
        assert_eq!(config.identity.tokens.len(), 2);
        let agent_token = config.identity.tokens.get(1).unwrap();
        assert_eq!(agent_token.role, Role::Agent);
        assert_eq!(agent_token.agent_id, Some(AgentId::new(3)));
        assert_eq!(config.persistence.provider, "json-file");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "simulation:\n  tick_interval_ms: 500\n";
        let config = TrackerConfig::parse(yaml).unwrap();

        // The one value is overridden, everything else uses defaults.
        assert_eq!(config.simulation.tick_interval_ms, 500);
        assert_eq!(config.simulation.broadcast_every, 5);
        assert_eq!(config.persistence.provider, "memory");
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(TrackerConfig::parse("").is_ok());
    }

    #[test]
    fn reject_out_of_range_tick_interval() {
        let too_fast = TrackerConfig::parse("simulation:\n  tick_interval_ms: 10\n");
        assert!(matches!(
            too_fast,
            Err(ConfigError::OutOfRange {
                field: "simulation.tick_interval_ms",
                ..
            })
        ));

        let too_slow = TrackerConfig::parse("simulation:\n  tick_interval_ms: 60000\n");
        assert!(matches!(too_slow, Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn reject_zero_broadcast_interval() {
        let config = TrackerConfig::parse("simulation:\n  broadcast_every: 0\n");
        assert!(matches!(
            config,
            Err(ConfigError::OutOfRange {
                field: "simulation.broadcast_every",
                ..
            })
        ));
    }

    #[test]
    fn reject_oversized_routes() {
        let config = TrackerConfig::parse("simulation:\n  route_steps: 200\n");
        assert!(matches!(config, Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("logitrack.yaml");
        if path.exists() {
            let config = TrackerConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}

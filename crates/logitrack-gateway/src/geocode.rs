//! Address lookup with a bounded service area.
//!
//! Deliveries only make sense inside the served city, so every lookup is
//! clipped to a square box around the configured center: a search hit
//! outside the box is treated as no hit, and reverse lookups outside it
//! answer without a network round trip.
//!
//! Two backends sit behind the [`Geocoder`] enum. `nominatim` talks to a
//! live Nominatim instance (the public one by default, so lookups are
//! rate-limited and need a real `user_agent`). `fixture` derives a
//! stable in-area coordinate from the address text itself and is what
//! tests and offline demos run against.

use std::time::Duration;

use logitrack_core::config::GeocodeConfig;
use logitrack_types::Coordinate;
use serde::Deserialize;
use tracing::debug;

/// Errors from building or querying a geocode backend.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    /// The configured provider name is not recognized.
    #[error("unsupported geocode provider {0:?}, expected nominatim or fixture")]
    UnknownProvider(String),

    /// The HTTP client could not be constructed.
    #[error("geocoder HTTP client could not be built: {0}")]
    Client(#[source] reqwest::Error),

    /// The upstream service answered with a non-success status.
    #[error("geocoder returned HTTP {status}")]
    Upstream {
        /// The HTTP status code received.
        status: u16,
    },

    /// The request could not be sent or the body could not be read.
    #[error("geocoder request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Service area
// ---------------------------------------------------------------------------

/// The served area: a square degree box around the configured center.
#[derive(Debug, Clone, Copy)]
pub struct ServiceArea {
    center: Coordinate,
    radius_degrees: f64,
}

impl ServiceArea {
    /// Build the area from configuration.
    pub const fn from_config(config: &GeocodeConfig) -> Self {
        Self {
            center: Coordinate::new(config.center_latitude, config.center_longitude),
            radius_degrees: config.coverage_radius_degrees,
        }
    }

    /// Whether a coordinate falls inside the served box.
    pub const fn contains(&self, coordinate: Coordinate) -> bool {
        (coordinate.latitude - self.center.latitude).abs() <= self.radius_degrees
            && (coordinate.longitude - self.center.longitude).abs() <= self.radius_degrees
    }

    /// The box center.
    pub const fn center(&self) -> Coordinate {
        self.center
    }
}

// ---------------------------------------------------------------------------
// Backend dispatch
// ---------------------------------------------------------------------------

/// Address lookup backend, selected by `geocode.provider`.
#[derive(Debug, Clone)]
pub enum Geocoder {
    /// Live lookups against a Nominatim instance.
    Nominatim(NominatimGeocoder),
    /// Deterministic offline lookups inside the service area.
    Fixture(FixtureGeocoder),
}

impl Geocoder {
    /// Build the configured backend.
    pub fn from_config(config: &GeocodeConfig) -> Result<Self, GeocodeError> {
        let area = ServiceArea::from_config(config);
        match config.provider.as_str() {
            "nominatim" => Ok(Self::Nominatim(NominatimGeocoder::new(config, area)?)),
            "fixture" => Ok(Self::Fixture(FixtureGeocoder::new(area))),
            other => Err(GeocodeError::UnknownProvider(other.to_owned())),
        }
    }

    /// Backend name for logs and the status endpoint.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Nominatim(_) => "nominatim",
            Self::Fixture(_) => "fixture",
        }
    }

    /// The served area.
    pub const fn area(&self) -> ServiceArea {
        match self {
            Self::Nominatim(backend) => backend.area,
            Self::Fixture(backend) => backend.area,
        }
    }

    /// Resolve a free-form address to a coordinate.
    ///
    /// Returns `None` when nothing matches or when the best match lies
    /// outside the served area.
    pub async fn search(&self, query: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let found = match self {
            Self::Nominatim(backend) => backend.search(query).await?,
            Self::Fixture(backend) => Some(backend.coordinate_for(query)),
        };
        Ok(found.filter(|coordinate| {
            let inside = self.area().contains(*coordinate);
            if !inside {
                debug!(query, "Geocode hit outside the service area");
            }
            inside
        }))
    }

    /// Resolve a coordinate back to a display address.
    ///
    /// Coordinates outside the served area resolve to `None` locally.
    pub async fn reverse(&self, coordinate: Coordinate) -> Result<Option<String>, GeocodeError> {
        if !self.area().contains(coordinate) {
            return Ok(None);
        }
        match self {
            Self::Nominatim(backend) => backend.reverse(coordinate).await,
            Self::Fixture(backend) => Ok(Some(backend.address_for(coordinate))),
        }
    }
}

// ---------------------------------------------------------------------------
// Nominatim backend
// ---------------------------------------------------------------------------

/// Response row from the Nominatim search endpoint.
///
/// Nominatim encodes coordinates as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimPlace {
    fn coordinate(&self) -> Option<Coordinate> {
        let latitude = self.lat.parse().ok()?;
        let longitude = self.lon.parse().ok()?;
        Some(Coordinate::new(latitude, longitude))
    }
}

/// Response body from the Nominatim reverse endpoint.
///
/// An unresolvable coordinate comes back as `{"error": ...}` with HTTP
/// 200, so `display_name` stays optional.
#[derive(Debug, Deserialize)]
struct NominatimReverse {
    display_name: Option<String>,
}

/// Live Nominatim client.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    area: ServiceArea,
}

impl NominatimGeocoder {
    fn new(config: &GeocodeConfig, area: ServiceArea) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(GeocodeError::Client)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            area,
        })
    }

    async fn search(&self, query: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GeocodeError::Upstream {
                status: response.status().as_u16(),
            });
        }
        let places: Vec<NominatimPlace> = response.json().await?;
        Ok(places.first().and_then(NominatimPlace::coordinate))
    }

    async fn reverse(&self, coordinate: Coordinate) -> Result<Option<String>, GeocodeError> {
        let latitude = coordinate.latitude.to_string();
        let longitude = coordinate.longitude.to_string();
        let response = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("lat", latitude.as_str()),
                ("lon", longitude.as_str()),
                ("format", "jsonv2"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GeocodeError::Upstream {
                status: response.status().as_u16(),
            });
        }
        let place: NominatimReverse = response.json().await?;
        Ok(place.display_name)
    }
}

// ---------------------------------------------------------------------------
// Fixture backend
// ---------------------------------------------------------------------------

/// Deterministic offline backend.
///
/// Hashes the address text into a stable offset inside the service
/// area, so the same address always resolves to the same spot and no
/// network is touched.
#[derive(Debug, Clone, Copy)]
pub struct FixtureGeocoder {
    area: ServiceArea,
}

impl FixtureGeocoder {
    const fn new(area: ServiceArea) -> Self {
        Self { area }
    }

    /// Stable in-area coordinate for an address string.
    pub fn coordinate_for(&self, query: &str) -> Coordinate {
        let hash = fold_address(query);
        let lat_bits = u16::try_from(hash & 0xFFFF).unwrap_or(u16::MAX);
        let lon_bits = u16::try_from((hash >> 16) & 0xFFFF).unwrap_or(u16::MAX);
        let spread = self.area.radius_degrees;
        let latitude = self.area.center.latitude
            + (f64::from(lat_bits) / 65_535.0).mul_add(2.0 * spread, -spread);
        let longitude = self.area.center.longitude
            + (f64::from(lon_bits) / 65_535.0).mul_add(2.0 * spread, -spread);
        Coordinate::new(latitude, longitude)
    }

    /// Synthetic display label for a coordinate.
    pub fn address_for(&self, coordinate: Coordinate) -> String {
        format!(
            "Carrer simulat {:.4}, {:.4}",
            coordinate.latitude, coordinate.longitude
        )
    }
}

/// FNV-1a over the normalized address text.
fn fold_address(query: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for byte in query.trim().to_lowercase().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}

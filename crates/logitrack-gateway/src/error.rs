//! Error types for the gateway API.
//!
//! [`GatewayError`] unifies every failure mode the HTTP layer can hit
//! and converts into an Axum response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Engine
//! errors keep their own messages; only the status code is decided here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use logitrack_core::error::TrackerError;
use logitrack_tracking::TrackingError;

use crate::geocode::GeocodeError;

/// Errors that can occur in the gateway API layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The token is missing or not in the table.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The authenticated identity may not touch this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Request parameters were malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An engine operation was rejected.
    #[error(transparent)]
    Engine(#[from] TrackerError),

    /// The geocoder answered but found no coordinate for an address.
    #[error("no coordinate found for {0:?}")]
    AddressNotFound(String),

    /// An address lookup failed.
    #[error("geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),

    /// A serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Engine(error) => engine_status(error),
            Self::AddressNotFound(_) => StatusCode::NOT_FOUND,
            Self::Geocode(_) => StatusCode::BAD_GATEWAY,
            Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map an engine rejection to an HTTP status.
///
/// Missing entities are 404; state conflicts (illegal transitions,
/// stale reports, unassigned packages) are 409; rejected coordinate
/// values are 422.
const fn engine_status(error: &TrackerError) -> StatusCode {
    match error {
        TrackerError::UnknownPackage(_)
        | TrackerError::Tracking(TrackingError::UnknownAgent(_)) => StatusCode::NOT_FOUND,
        TrackerError::Tracking(TrackingError::InvalidCoordinate { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TrackerError::Tracking(TrackingError::StaleTimestamp { .. })
        | TrackerError::AgentPositionUnknown(_)
        | TrackerError::NotAssignedToAgent { .. }
        | TrackerError::InvalidTransition { .. }
        | TrackerError::DestinationUnknown(_) => StatusCode::CONFLICT,
    }
}

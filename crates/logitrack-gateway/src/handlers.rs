//! REST endpoint handlers for the gateway.
//!
//! Every handler authenticates against the shared token table first,
//! then delegates to the [`Tracker`](logitrack_core::tracker::Tracker)
//! facade. Role scoping is uniform: consoles see and steer everything,
//! agent tokens only themselves.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/status` | Service health and engine counters |
//! | `GET` | `/api/agents` | Agent roster (agents see themselves) |
//! | `GET` | `/api/positions` | Overlap-resolved live position snapshot |
//! | `POST` | `/api/agents/:id/position` | Report a position |
//! | `PUT` | `/api/agents/:id/active` | Flip session activity |
//! | `GET` | `/api/agents/:id/simulation` | Live simulation status |
//! | `POST` | `/api/agents/:id/delivery` | Start a delivery run |
//! | `DELETE` | `/api/agents/:id/delivery` | Cancel the live run |
//! | `GET` | `/api/packages` | Package list (agents see their own) |
//! | `POST` | `/api/packages` | Create a package (console) |
//! | `GET` | `/api/packages/:id` | Single package |
//! | `POST` | `/api/packages/:id/assign` | Assign to an agent (console) |
//! | `POST` | `/api/packages/:id/return` | Mark returned (console) |
//! | `GET` | `/api/geocode` | Address to coordinate |
//! | `GET` | `/api/geocode/reverse` | Coordinate to address |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use logitrack_types::{AgentId, Coordinate, Package, PackageId, Role};
use tracing::warn;

use crate::error::GatewayError;
use crate::identity::{self, Identity};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / query types
// ---------------------------------------------------------------------------

/// Body for `POST /api/agents/:id/position`.
#[derive(Debug, serde::Deserialize)]
pub struct ReportPositionRequest {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Client-side capture time; defaults to the server clock.
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Body for `PUT /api/agents/:id/active`.
#[derive(Debug, serde::Deserialize)]
pub struct SetActiveRequest {
    /// Desired session flag.
    pub active: bool,
}

/// Body for `POST /api/agents/:id/delivery`.
#[derive(Debug, serde::Deserialize)]
pub struct StartDeliveryRequest {
    /// The package to deliver.
    pub package_id: PackageId,
    /// Destination override for this run.
    pub destination: Option<Coordinate>,
    /// Display address override for this run.
    pub address: Option<String>,
}

/// Body for `POST /api/packages`.
#[derive(Debug, serde::Deserialize)]
pub struct CreatePackageRequest {
    /// Free-form delivery address.
    pub address: String,
    /// Destination override; omitted destinations are geocoded from the
    /// address.
    pub destination: Option<Coordinate>,
    /// Agent to assign the package to on creation.
    pub assigned_agent: Option<AgentId>,
}

/// Body for `POST /api/packages/:id/assign`.
#[derive(Debug, serde::Deserialize)]
pub struct AssignPackageRequest {
    /// The agent taking the package.
    pub agent_id: AgentId,
}

/// Query for `GET /api/geocode`.
#[derive(Debug, serde::Deserialize)]
pub struct GeocodeQuery {
    /// Free-form address text.
    pub q: String,
}

/// Query for `GET /api/geocode/reverse`.
#[derive(Debug, serde::Deserialize)]
pub struct ReverseQuery {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// Authenticate a REST caller from its `Authorization` header.
fn identify(state: &AppState, headers: &HeaderMap) -> Result<Identity, GatewayError> {
    identity::authenticate(&state.identity, identity::bearer_token(headers))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Service health, build version, and engine counters.
///
/// Unauthenticated so load balancers and dashboards can probe it.
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.tracker.stats().await;
    Json(serde_json::json!({
        "service": "logitrack-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "persistence": state.tracker.persistence_name(),
        "geocoder": state.geocoder.name(),
        "stats": stats,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/agents
// ---------------------------------------------------------------------------

/// The agent roster with activity flags.
///
/// Agent tokens see a roster of one: themselves.
pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let identity = identify(&state, &headers)?;
    let mut agents = state.tracker.list_agents().await;
    if let (Role::Agent, Some(own)) = (identity.role, identity.agent_id) {
        agents.retain(|agent| agent.id == own);
    }
    Ok(Json(serde_json::json!({
        "count": agents.len(),
        "agents": agents,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/positions
// ---------------------------------------------------------------------------

/// Overlap-resolved positions of every active agent, for the console map.
pub async fn list_positions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    identify(&state, &headers)?.require_console()?;
    let positions = state.tracker.snapshot_positions().await;
    Ok(Json(serde_json::json!({
        "count": positions.len(),
        "positions": positions,
    })))
}

// ---------------------------------------------------------------------------
// POST /api/agents/:id/position
// ---------------------------------------------------------------------------

/// Accept a position report for an agent.
pub async fn report_position(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<ReportPositionRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let agent_id = AgentId::new(id);
    identify(&state, &headers)?.allow_agent(agent_id)?;
    let recorded_at = body.recorded_at.unwrap_or_else(Utc::now);
    let position = state
        .tracker
        .record_position(
            agent_id,
            Coordinate::new(body.latitude, body.longitude),
            recorded_at,
        )
        .await?;
    Ok(Json(serde_json::json!({
        "agent_id": agent_id,
        "position": position,
    })))
}

// ---------------------------------------------------------------------------
// PUT /api/agents/:id/active
// ---------------------------------------------------------------------------

/// Flip an agent's session activity flag.
pub async fn set_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let agent_id = AgentId::new(id);
    identify(&state, &headers)?.allow_agent(agent_id)?;
    let previous = state.tracker.set_active(agent_id, body.active).await?;
    Ok(Json(serde_json::json!({
        "agent_id": agent_id,
        "active": body.active,
        "previous": previous,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/agents/:id/simulation
// ---------------------------------------------------------------------------

/// The agent's live simulation, or `Idle`.
pub async fn simulation_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let agent_id = AgentId::new(id);
    identify(&state, &headers)?.allow_agent(agent_id)?;
    Ok(Json(state.tracker.simulation_status(agent_id).await))
}

// ---------------------------------------------------------------------------
// POST /api/agents/:id/delivery
// ---------------------------------------------------------------------------

/// Start a delivery run for a package assigned to this agent.
///
/// Destination resolution order: an explicit override in the body, a
/// fresh geocode of the package address, then the package's stored
/// destination when the lookup transport fails. A caller that supplies
/// only a coordinate gets the address reverse-geocoded so the start
/// event still carries something readable.
pub async fn start_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<StartDeliveryRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let agent_id = AgentId::new(id);
    identify(&state, &headers)?.allow_agent(agent_id)?;
    let package = state.tracker.package(body.package_id).await?;

    let destination = match body.destination {
        Some(coordinate) => Some(coordinate),
        None => resolve_destination(&state, &package).await?,
    };
    let address = match (body.address, body.destination) {
        (Some(address), _) => Some(address),
        (None, Some(coordinate)) => state.geocoder.reverse(coordinate).await.ok().flatten(),
        (None, None) => None,
    };

    let view = state
        .tracker
        .start_delivery(agent_id, body.package_id, destination, address)
        .await?;
    Ok(Json(view))
}

/// Geocode the package address, falling back to the stored destination
/// when the lookup transport fails. An address the geocoder answers
/// "nothing there" for is a hard miss regardless of stored coordinates.
async fn resolve_destination(
    state: &AppState,
    package: &Package,
) -> Result<Option<Coordinate>, GatewayError> {
    match state.geocoder.search(&package.address).await {
        Ok(Some(coordinate)) => Ok(Some(coordinate)),
        Ok(None) => Err(GatewayError::AddressNotFound(package.address.clone())),
        Err(error) => match package.destination {
            Some(stored) => {
                warn!(
                    error = %error,
                    package_id = %package.id,
                    "Geocoder unreachable, using the stored destination"
                );
                Ok(Some(stored))
            }
            None => Err(error.into()),
        },
    }
}

// ---------------------------------------------------------------------------
// DELETE /api/agents/:id/delivery
// ---------------------------------------------------------------------------

/// Cancel the agent's live run, if any. Idempotent.
pub async fn cancel_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let agent_id = AgentId::new(id);
    identify(&state, &headers)?.allow_agent(agent_id)?;
    let cancelled = state.tracker.cancel_delivery(agent_id).await;
    Ok(Json(serde_json::json!({
        "agent_id": agent_id,
        "cancelled": cancelled,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/packages
// ---------------------------------------------------------------------------

/// List packages. Agent tokens get only their own assignments.
pub async fn list_packages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let identity = identify(&state, &headers)?;
    let packages = match (identity.role, identity.agent_id) {
        (Role::Agent, Some(own)) => state.tracker.packages_for(own).await,
        _ => state.tracker.list_packages().await,
    };
    Ok(Json(serde_json::json!({
        "count": packages.len(),
        "packages": packages,
    })))
}

// ---------------------------------------------------------------------------
// POST /api/packages
// ---------------------------------------------------------------------------

/// Create a package.
///
/// When no destination is given the address is geocoded; an address the
/// geocoder cannot place inside the service area leaves the package
/// without a destination (a later delivery start must then name one).
pub async fn create_package(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreatePackageRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    identify(&state, &headers)?.require_console()?;
    let destination = match body.destination {
        Some(coordinate) => Some(coordinate),
        None => state.geocoder.search(&body.address).await?,
    };
    let package = state
        .tracker
        .create_package(body.address, destination, body.assigned_agent)
        .await?;
    Ok((StatusCode::CREATED, Json(package)))
}

// ---------------------------------------------------------------------------
// GET /api/packages/:id
// ---------------------------------------------------------------------------

/// A single package record.
pub async fn get_package(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let identity = identify(&state, &headers)?;
    let package = state.tracker.package(PackageId::new(id)).await?;
    if identity.role == Role::Agent && package.assigned_agent != identity.agent_id {
        return Err(GatewayError::Forbidden(String::from(
            "package is not assigned to this token",
        )));
    }
    Ok(Json(package))
}

// ---------------------------------------------------------------------------
// POST /api/packages/:id/assign
// ---------------------------------------------------------------------------

/// Assign a waiting package to an agent.
pub async fn assign_package(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<AssignPackageRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    identify(&state, &headers)?.require_console()?;
    let package = state
        .tracker
        .assign_package(PackageId::new(id), body.agent_id)
        .await?;
    Ok(Json(package))
}

// ---------------------------------------------------------------------------
// POST /api/packages/:id/return
// ---------------------------------------------------------------------------

/// Mark an in-transit package as returned, stopping its run.
pub async fn return_package(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    identify(&state, &headers)?.require_console()?;
    let package = state.tracker.mark_returned(PackageId::new(id)).await?;
    Ok(Json(package))
}

// ---------------------------------------------------------------------------
// GET /api/geocode
// ---------------------------------------------------------------------------

/// Resolve an address to a coordinate inside the service area.
pub async fn geocode_search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<GeocodeQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    identify(&state, &headers)?;
    let coordinate = state.geocoder.search(&params.q).await?;
    Ok(Json(serde_json::json!({
        "query": params.q,
        "coordinate": coordinate,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/geocode/reverse
// ---------------------------------------------------------------------------

/// Resolve a coordinate to a display address.
///
/// Coordinates outside the service area answer with a null address.
pub async fn geocode_reverse(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ReverseQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    identify(&state, &headers)?;
    let coordinate = Coordinate::new(params.latitude, params.longitude);
    let address = state.geocoder.reverse(coordinate).await?;
    Ok(Json(serde_json::json!({
        "coordinate": coordinate,
        "address": address,
    })))
}

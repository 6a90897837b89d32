//! Axum router construction for the gateway.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled so the console and agent frontends can
//! call from other origins.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the gateway.
///
/// The route list mirrors the table in [`crate::handlers`], plus
/// `GET /ws/track` for the event stream.
///
/// CORS is configured to allow any origin for development. In
/// production this should be restricted.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and live stream
        .route("/api/status", get(handlers::status))
        .route("/ws/track", get(ws::ws_track))
        // Agents
        .route("/api/agents", get(handlers::list_agents))
        .route("/api/positions", get(handlers::list_positions))
        .route("/api/agents/{id}/position", post(handlers::report_position))
        .route("/api/agents/{id}/active", put(handlers::set_active))
        .route(
            "/api/agents/{id}/simulation",
            get(handlers::simulation_status),
        )
        .route(
            "/api/agents/{id}/delivery",
            post(handlers::start_delivery).delete(handlers::cancel_delivery),
        )
        // Packages
        .route(
            "/api/packages",
            get(handlers::list_packages).post(handlers::create_package),
        )
        .route("/api/packages/{id}", get(handlers::get_package))
        .route("/api/packages/{id}/assign", post(handlers::assign_package))
        .route("/api/packages/{id}/return", post(handlers::return_package))
        // Geocoding
        .route("/api/geocode", get(handlers::geocode_search))
        .route("/api/geocode/reverse", get(handlers::geocode_reverse))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Gateway HTTP server lifecycle management.
//!
//! Provides [`start_server`] which binds the configured TCP address and
//! runs the Axum server until the process is terminated.

use std::net::SocketAddr;
use std::sync::Arc;

use logitrack_core::config::GatewayConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur when starting or running the gateway server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Start the gateway HTTP server.
///
/// Binds to the configured address, builds the router, and serves
/// requests until the process is terminated.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server(config: &GatewayConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|error| ServerError::Bind(format!("invalid address: {error}")))?;

    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|error| ServerError::Bind(format!("bind failed on {addr}: {error}")))?;

    info!(%addr, "Gateway listening");

    axum::serve(listener, router)
        .await
        .map_err(|error| ServerError::Serve(format!("serve error: {error}")))?;

    Ok(())
}

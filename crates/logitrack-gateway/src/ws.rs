//! `WebSocket` endpoint streaming tracker events to connected views.
//!
//! Clients connect to `GET /ws/track` and receive every bus event that
//! passes their subscription filter as a JSON text frame: consoles get
//! the full stream, agent-bound sessions only their own slice.
//!
//! An agent-bound connection doubles as the presence signal -- the agent
//! is flagged active on connect and inactive again when the socket
//! closes, however it closes. Bound sessions may also push position
//! reports as inbound frames; malformed frames are logged and dropped
//! without tearing the stream down.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use logitrack_events::{Subscription, SubscriptionFilter};
use logitrack_types::{AgentId, Coordinate, Role};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::identity;
use crate::state::AppState;

/// Query parameters for `GET /ws/track`.
///
/// Browsers cannot set headers on `WebSocket` requests, so the token
/// travels as a query parameter here.
#[derive(Debug, serde::Deserialize)]
pub struct TrackQuery {
    /// Bearer token, when a token table is configured.
    pub token: Option<String>,
    /// Agent to bind the session to. Honored only in open mode; agent
    /// tokens carry their own binding.
    pub agent_id: Option<u64>,
}

/// Inbound command frames accepted on an agent-bound session.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TrackCommand {
    /// Live position report.
    Position {
        latitude: f64,
        longitude: f64,
        recorded_at: Option<DateTime<Utc>>,
    },
}

/// Upgrade to a `WebSocket` and begin streaming tracker events.
///
/// # Route
///
/// `GET /ws/track?token=...&agent_id=...`
pub async fn ws_track(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrackQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let identity = identity::authenticate(&state.identity, params.token.as_deref())?;
    let bound_agent = if identity.role == Role::Agent {
        identity.agent_id
    } else if state.identity.tokens.is_empty() {
        params.agent_id.map(AgentId::new)
    } else {
        None
    };
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, bound_agent)))
}

/// Run one connection: mark presence, stream, clean up.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, bound_agent: Option<AgentId>) {
    let filter = bound_agent.map_or(SubscriptionFilter::All, SubscriptionFilter::Agent);
    let mut subscription = state.tracker.bus().subscribe(filter);
    debug!(subscription = %subscription.id(), ?bound_agent, "Track stream connected");

    if let Some(agent_id) = bound_agent {
        if let Err(error) = state.tracker.set_active(agent_id, true).await {
            warn!(%agent_id, %error, "Rejecting track stream for unknown agent");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    }

    stream_events(&mut socket, &mut subscription, &state, bound_agent).await;

    if let Some(agent_id) = bound_agent {
        if let Err(error) = state.tracker.set_active(agent_id, false).await {
            warn!(%agent_id, %error, "Could not mark agent inactive on disconnect");
        }
    }
    debug!(subscription = %subscription.id(), "Track stream closed");
}

/// Forward bus events out and fold inbound frames in until either side
/// hangs up.
async fn stream_events(
    socket: &mut WebSocket,
    subscription: &mut Subscription,
    state: &AppState,
    bound_agent: Option<AgentId>,
) {
    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { return };
                let frame = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(error) => {
                        warn!(%error, "Dropping unserializable event");
                        continue;
                    }
                };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    return;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(frame))) => {
                        handle_frame(state, bound_agent, frame.as_str()).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Err(error)) => {
                        debug!(%error, "Track stream errored");
                        return;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Apply one inbound frame. Bad frames never kill the stream.
async fn handle_frame(state: &AppState, bound_agent: Option<AgentId>, frame: &str) {
    let command: TrackCommand = match serde_json::from_str(frame) {
        Ok(command) => command,
        Err(error) => {
            warn!(%error, "Dropping malformed track frame");
            return;
        }
    };
    let Some(agent_id) = bound_agent else {
        warn!("Dropping track frame from a session with no agent binding");
        return;
    };
    match command {
        TrackCommand::Position {
            latitude,
            longitude,
            recorded_at,
        } => {
            let recorded_at = recorded_at.unwrap_or_else(Utc::now);
            if let Err(error) = state
                .tracker
                .record_position(agent_id, Coordinate::new(latitude, longitude), recorded_at)
                .await
            {
                warn!(%agent_id, %error, "Rejected streamed position");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn position_frames_parse() {
        let frame = r#"{"type": "position", "latitude": 41.39, "longitude": 2.17}"#;
        let command: TrackCommand = serde_json::from_str(frame).unwrap();
        let TrackCommand::Position {
            latitude,
            longitude,
            recorded_at,
        } = command;
        assert!((latitude - 41.39).abs() < 1e-9);
        assert!((longitude - 2.17).abs() < 1e-9);
        assert!(recorded_at.is_none());
    }

    #[test]
    fn unknown_frames_are_rejected() {
        let frame = r#"{"type": "teleport", "latitude": 0.0}"#;
        assert!(serde_json::from_str::<TrackCommand>(frame).is_err());
    }
}

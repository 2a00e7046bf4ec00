//! WebSocket handler: bidirectional event relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a session id, registers an outbound queue with the
//! hub and enters a `select!` loop:
//! - Incoming client text frames → parse → forward to the hub
//! - Events queued for this session by the hub → forward to the client
//!
//! The connection task holds no board state. Everything it knows about its
//! board lives in the hub, keyed by the session id.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → hub sends `connected` with `sessionId`
//! 2. Client sends events → hub handles and queues deliveries
//! 3. Close → hub disconnect (presence removal, owner hand-off)

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::protocol::{ClientEvent, E_INVALID_MESSAGE, ServerEvent};
use crate::state::{AppState, SessionId};

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let session = SessionId::new();

    // Per-connection queue the hub delivers into.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(state.config.client_queue_capacity);
    if state.hub.connect(session, client_tx).await.is_err() {
        warn!(%session, "ws: hub unavailable, closing connection");
        return;
    }

    info!(%session, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        if !forward_inbound(&mut socket, &state, session, text.as_str()).await {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            event = client_rx.recv() => {
                let Some(event) = event else { break };
                if send_event(&mut socket, session, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    if state.hub.disconnect(session).await.is_err() {
        debug!(%session, "ws: hub already stopped at disconnect");
    }
    info!(%session, "ws: client disconnected");
}

// =============================================================================
// EVENT RELAY
// =============================================================================

/// Parse one inbound frame and hand it to the hub. Malformed frames are
/// answered directly with an error; the connection stays open. Returns
/// `false` when the connection should close.
async fn forward_inbound(socket: &mut WebSocket, state: &AppState, session: SessionId, text: &str) -> bool {
    let event = match ClientEvent::parse(text) {
        Ok(event) => event,
        Err(e) => {
            let reply = ServerEvent::error(E_INVALID_MESSAGE, format!("invalid message: {e}"));
            return send_event(socket, session, &reply).await.is_ok();
        }
    };

    if !matches!(event, ClientEvent::CursorMove { .. }) {
        debug!(%session, event = event.name(), board_id = %event.board_id(), "ws: recv event");
    }
    state.hub.dispatch(session, event).await.is_ok()
}

async fn send_event(socket: &mut WebSocket, session: SessionId, event: &ServerEvent) -> Result<(), ()> {
    let json = match event.to_text() {
        Ok(j) => j,
        Err(e) => {
            warn!(%session, event = event.name(), error = %e, "ws: failed to serialize event");
            return Err(());
        }
    };
    match event {
        ServerEvent::CursorUpdate { .. } => {}
        ServerEvent::Error { code, message } => {
            warn!(%session, code = %code, message = %message, "ws: send error event");
        }
        _ => debug!(%session, event = event.name(), "ws: send event"),
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use cart_shared::scan::{
    EVENT_SCAN, EVENT_SCAN_DONE_KO, EVENT_SCAN_STOP, ScanRequest, SocketMessage,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::auth::claims::Claims;
use crate::scanner::ScanError;
use crate::util::app_state::AppState;

/// `/ws`: the scan socket. Clients send `scan` / `scan:stop` envelopes
/// and receive progress events broadcast by the running scan.
pub async fn scan_socket(
    claims: Claims,
    State(state): State<AppState>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| handle_socket(socket, claims, state))
}

async fn handle_socket(socket: WebSocket, claims: Claims, state: AppState) {
    info!("Scan socket opened by {}", claims.username);
    let (mut sink, mut stream) = socket.split();
    let mut events = state.scan_queue.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Ok(event) = event else {
                    // Lagged or closed; either way this subscriber is done.
                    break;
                };
                let Ok(raw) = serde_json::to_string(&event) else {
                    continue;
                };
                if sink.send(Message::Text(raw.into())).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                let Some(Ok(message)) = incoming else {
                    break;
                };
                let Message::Text(raw) = message else {
                    continue;
                };
                match serde_json::from_str::<SocketMessage>(&raw) {
                    Ok(envelope) => {
                        if let Some(reply) = handle_message(&claims, &state, envelope) {
                            if let Ok(raw) = serde_json::to_string(&reply) {
                                if sink.send(Message::Text(raw.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => debug!("Ignoring malformed socket message: {}", e),
                }
            }
        }
    }
    info!("Scan socket closed for {}", claims.username);
}

/// Handles one client envelope. A returned message is an error reply for
/// the sender; scan progress itself arrives via the broadcast channel.
fn handle_message(
    claims: &Claims,
    state: &AppState,
    envelope: SocketMessage,
) -> Option<SocketMessage> {
    match envelope.event.as_str() {
        EVENT_SCAN => {
            if claims.require_scope("roms.write").is_err() {
                warn!("{} tried to start a scan without roms.write", claims.username);
                return Some(SocketMessage::new(
                    EVENT_SCAN_DONE_KO,
                    "Insufficient scope to scan",
                ));
            }
            let request: ScanRequest = match serde_json::from_value(envelope.data) {
                Ok(request) => request,
                Err(e) => {
                    return Some(SocketMessage::new(
                        EVENT_SCAN_DONE_KO,
                        format!("Invalid scan request: {}", e),
                    ));
                }
            };
            match state.scan_queue.submit(request) {
                Ok(()) => None,
                Err(ScanError::AlreadyRunning) => Some(SocketMessage::new(
                    EVENT_SCAN_DONE_KO,
                    "A scan is already running",
                )),
                Err(e) => Some(SocketMessage::new(EVENT_SCAN_DONE_KO, e.to_string())),
            }
        }
        EVENT_SCAN_STOP => {
            if claims.require_scope("roms.write").is_err() {
                return Some(SocketMessage::new(
                    EVENT_SCAN_DONE_KO,
                    "Insufficient scope to stop a scan",
                ));
            }
            state.scan_queue.stop();
            None
        }
        other => {
            debug!("Ignoring unknown socket event {}", other);
            None
        }
    }
}

// WebSocket stream of outbound messages for the chat gateway.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};

use super::{AppState, GatewayAuth};
use crate::metrics;

/// WebSocket upgrade handler for the announcement stream.
pub async fn ws_announcements(
    _auth: GatewayAuth,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: AppState) {
    let mut rx = state.sink.subscribe();
    metrics::CONNECTED_GATEWAYS.inc();
    tracing::info!("Gateway connected to announcement stream");

    // Forward every outbound message to the gateway until either side closes.
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if socket.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        break;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Gateway lagged, skipped {n} announcements");
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    metrics::CONNECTED_GATEWAYS.dec();
    tracing::info!("Gateway disconnected from announcement stream");
}

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    http::StatusCode,
    response::Response,
};
use chat_realtime::{presence, RealtimeEvent};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing;
use uuid::Uuid;

use crate::auth;
use crate::server::ApiState;

#[derive(Deserialize)]
pub struct WsQuery {
    token: String,
}

/// Typing frames sent by clients over the socket. Anything that fails to
/// parse is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    TypingStart { recipient_id: Uuid },
    #[serde(rename_all = "camelCase")]
    TypingStop { recipient_id: Uuid },
}

/// The upgrade carries its JWT in the query string since browsers cannot
/// set headers on WebSocket requests. Verification happens before the
/// upgrade so bad tokens get a plain 401.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    Extension(state): Extension<ApiState>,
) -> Result<Response, StatusCode> {
    let user = auth::verify_token(&query.token, &state.ctx.config.server.jwt_secret)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user, state)))
}

async fn handle_socket(socket: WebSocket, user: Uuid, state: ApiState) {
    tracing::info!("WebSocket connection established for user: {}", user);

    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4().to_string();

    if let Err(e) = presence::register_connection(&state.ctx.db_pool, user, &connection_id).await {
        tracing::warn!("Failed to register WebSocket connection: {}", e);
    }

    // Forward the user's room to this socket. Each connection holds its own
    // cursor, so every device of the user sees every event.
    let mut feed = state.hub.open_feed(user);
    let mut send_task = tokio::spawn(async move {
        loop {
            match feed.next_batch().await {
                Ok(payloads) => {
                    for payload in payloads {
                        if sender.send(Message::Text(payload)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Realtime feed read error: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                }
            }
        }
    });

    let state_recv = state.clone();
    let connection_id_recv = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    handle_client_frame(&state_recv, user, &text).await;
                }
                Ok(Message::Ping(_)) => {
                    if let Err(e) =
                        presence::touch_heartbeat(&state_recv.ctx.db_pool, &connection_id_recv)
                            .await
                    {
                        tracing::debug!("Heartbeat update failed: {}", e);
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {}
        _ = &mut recv_task => {}
    }
    send_task.abort();
    recv_task.abort();

    if let Err(e) = presence::mark_disconnected(&state.ctx.db_pool, &connection_id).await {
        tracing::warn!("Failed to mark WebSocket connection as closed: {}", e);
    }

    tracing::info!("WebSocket connection closed for user: {}", user);
}

async fn handle_client_frame(state: &ApiState, sender: Uuid, raw: &str) {
    let frame: ClientFrame = match serde_json::from_str(raw) {
        Ok(f) => f,
        Err(_) => {
            tracing::debug!("Ignoring unrecognized client frame");
            return;
        }
    };

    let (recipient, is_typing) = match frame {
        ClientFrame::TypingStart { recipient_id } => (recipient_id, true),
        ClientFrame::TypingStop { recipient_id } => (recipient_id, false),
    };

    let event = RealtimeEvent::Typing {
        sender_id: sender,
        is_typing,
    };
    if let Err(e) = state.hub.emit_to_user(recipient, &event).await {
        tracing::warn!("Failed to emit typing event: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_frames_parse() {
        let raw = r#"{"type":"typing_start","recipientId":"b9481d8c-4f12-4c43-8bf3-29c9e0f6e2ab"}"#;
        let frame: ClientFrame = serde_json::from_str(raw).unwrap();
        assert!(matches!(frame, ClientFrame::TypingStart { .. }));

        let raw = r#"{"type":"typing_stop","recipientId":"b9481d8c-4f12-4c43-8bf3-29c9e0f6e2ab"}"#;
        let frame: ClientFrame = serde_json::from_str(raw).unwrap();
        assert!(matches!(frame, ClientFrame::TypingStop { .. }));
    }

    #[test]
    fn unknown_frames_fail_to_parse() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"hello"}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>("not json").is_err());
    }
}

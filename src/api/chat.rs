use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::header,
    response::{Html, IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error};

use super::{AppState, views};
use crate::models::chat::ClientEvent;
use crate::models::user::{CurrentUser, SessionUser};
use crate::services::{ChatConnection, ChatError};

/// GET /chat
pub async fn chat_page(Extension(user): Extension<CurrentUser>) -> Html<String> {
    views::chat(&user)
}

/// GET /chat.js
pub async fn chat_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        views::CHAT_SCRIPT,
    )
}

/// GET /chat/ws
///
/// Only reachable through `require_user`, so the handshake is already
/// authenticated when the upgrade is accepted.
pub async fn chat_socket(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Extension(session): Extension<SessionUser>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, user, session, socket))
}

async fn handle_socket(
    state: Arc<AppState>,
    user: CurrentUser,
    session: SessionUser,
    socket: WebSocket,
) {
    let hub = state.chat().clone();

    let ChatConnection {
        id,
        user,
        session,
        mut events,
    } = match hub.join(user, session).await {
        Ok(connection) => connection,
        Err(e) => {
            error!(error = %e, "Failed to join chat");
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(error = %e, "Failed to encode chat event");
                    continue;
                }
            };

            if sender.send(Message::Text(payload.into())).await.is_err() {
                return;
            }
        }

        // The hub dropped this connection.
        let _ = sender.send(Message::Close(None)).await;
    });

    let publisher = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                    Ok(ClientEvent::Message(inbound)) => {
                        match publisher.publish(session, &inbound.text).await {
                            Ok(_) => {}
                            Err(ChatError::SessionEnded) => break,
                            Err(e) => {
                                error!(user_id = user.id, error = %e, "Failed to publish chat message");
                            }
                        }
                    }
                    Err(_) => debug!(connection_id = id, "Ignoring malformed chat frame"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => {
            // Evicted connections flush their queue and send a close frame.
            if hub.is_connected(id) {
                send_task.abort();
            } else {
                let _ = send_task.await;
            }
        }
    }

    hub.leave(id);
}

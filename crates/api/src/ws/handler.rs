use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use doshboard_core::error::CoreError;
use doshboard_core::widget::Identity;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::bearer_token;
use crate::state::AppState;
use crate::ws::hub::SubscriptionHub;
use crate::ws::protocol::{ClientMessage, ServerMessage};

/// Browsers cannot set headers on a WebSocket handshake, so the token may
/// also arrive as `?access_token=`.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub access_token: Option<String>,
}

/// HTTP handler that authenticates and upgrades the connection to WebSocket.
///
/// The identity is resolved once here and fixed for the connection's
/// lifetime. A missing or invalid token is rejected with 401 before the
/// upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let token = match query.access_token {
        Some(token) => token,
        None => bearer_token(&headers)?
            .map(str::to_string)
            .ok_or_else(|| CoreError::Unauthorized("Missing access token".into()))?,
    };

    let identity = state.auth.validate(&token).await?;
    let hub = Arc::clone(&state.hub);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, hub, identity)))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with the hub.
///   2. Spawns a writer task draining the connection's outbound queue.
///   3. Spawns a reader task dispatching client frames.
///   4. Cleans up when either side finishes. The writer finishes when the
///      hub drops the connection (overflow or shutdown).
async fn handle_socket(socket: WebSocket, hub: Arc<SubscriptionHub>, identity: Identity) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let user_id = identity.user_id;
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket connected");

    let mut rx = hub.connect(conn_id.clone(), identity);
    let (mut sink, mut stream) = socket.split();

    let writer_conn_id = conn_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %writer_conn_id, "WebSocket sink closed");
                return;
            }
        }
        let _ = sink.close().await;
    });

    let reader_hub = Arc::clone(&hub);
    let reader_conn_id = conn_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    dispatch(&reader_hub, &reader_conn_id, text.as_str()).await;
                }
                Ok(Message::Close(_)) => break,
                Ok(Message::Pong(_)) => {
                    tracing::trace!(conn_id = %reader_conn_id, "Pong received");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(conn_id = %reader_conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.disconnect(&conn_id);
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket disconnected");
}

/// Handle one client frame. Failures are reported to the client as `error`
/// frames and never close the connection.
async fn dispatch(hub: &SubscriptionHub, conn_id: &str, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            hub.send(
                conn_id,
                &ServerMessage::error(None, "BAD_REQUEST", format!("Malformed message: {e}")),
            );
            return;
        }
    };

    match message {
        ClientMessage::Subscribe { widget_id } => {
            if let Err(e) = hub.subscribe(conn_id, widget_id).await {
                if let crate::ws::HubError::Store(store_err) = &e {
                    tracing::error!(conn_id, widget_id, error = %store_err, "Subscription lookup failed");
                }
                hub.send(
                    conn_id,
                    &ServerMessage::error(Some(widget_id), e.code(), e.to_string()),
                );
            }
        }
        ClientMessage::Unsubscribe { widget_id } => {
            if let Err(e) = hub.unsubscribe(conn_id, widget_id) {
                tracing::debug!(conn_id, widget_id, error = %e, "Unsubscribe failed");
            }
        }
    }
}

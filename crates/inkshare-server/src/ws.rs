//! HTTP routes and the per-connection WebSocket task.

use crate::engine::{JoinError, SyncEngine};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::ConnectionHandle;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

pub fn router(engine: Arc<SyncEngine>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Index page
async fn index() -> &'static str {
    "InkShare Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(engine): State<Arc<SyncEngine>>,
) -> impl IntoResponse {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    ws.on_upgrade(move |socket| handle_socket(socket, engine, authorization))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, engine: Arc<SyncEngine>, authorization: Option<String>) {
    let (conn, mut outbox) = ConnectionHandle::new();
    info!("New connection: {}", conn.id());

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::JoinCanvas { canvas_id }) => {
                                if let Err(e) = engine.join(&conn, &canvas_id, authorization.as_deref()).await {
                                    match &e {
                                        JoinError::Unexpected(cause) => {
                                            error!("Error joining session {}: {}", canvas_id, cause)
                                        }
                                        _ => info!("Join of {} by {} refused: {}", canvas_id, conn.id(), e),
                                    }
                                    conn.send(e.to_message());
                                }
                            }
                            Ok(ClientMessage::DrawingUpdate { canvas_id, elements }) => {
                                // Persistence runs detached and reports its own failures
                                let _ = engine.update(&conn, &canvas_id, elements);
                            }
                            Err(e) => {
                                warn!("Invalid message from {}: {}", conn.id(), e);
                                conn.send(ServerMessage::error(format!("Invalid message: {}", e)));
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary and ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", conn.id(), e);
                        break;
                    }
                }
            }

            // The client stopped reading and its outbox filled up
            _ = conn.overflowed() => {
                warn!("Closing connection {}: outbox full", conn.id());
                let _ = sender.send(Message::Close(None)).await;
                break;
            }

            // Forward queued messages to the client
            Some(server_msg) = outbox.recv() => {
                if sender.send(Message::Text(server_msg.to_json().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Cleanup on disconnect
    engine.disconnect(&conn);
    info!("Connection closed: {}", conn.id());
}

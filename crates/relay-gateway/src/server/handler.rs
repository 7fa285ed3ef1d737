//! WebSocket handler
//!
//! Accepts upgrades, pumps frames in and out, and runs teardown when the
//! transport goes away. The receive loop is the per-connection FIFO event
//! stream: events from one connection are applied in arrival order, while
//! streams from different connections interleave freely.

use crate::connection::{Connection, ConnectionManager};
use crate::protocol::{ClientEvent, ServerEvent};
use crate::relay::RelayDispatcher;
use crate::server::RelayState;
use axum::{
    extract::{ws::Message, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Channel buffer size for outgoing events
///
/// Fan-out uses `try_send`, so this is also the slack a slow client gets
/// before deliveries to it are dropped.
const EVENT_BUFFER_SIZE: usize = 256;

/// WebSocket upgrade handler
pub async fn socket_handler(
    State(state): State<RelayState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(state, socket))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: RelayState, socket: axum::extract::ws::WebSocket) {
    let connection_id = Connection::generate_id();

    // Channel for outgoing events
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(EVENT_BUFFER_SIZE);

    // Register connection
    let connection = state.manager().add_connection(connection_id.clone(), tx);

    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    // Split the WebSocket
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Clones for the receive task
    let manager_recv = Arc::clone(state.manager());
    let connection_recv = connection.clone();
    let connection_id_recv = connection_id.clone();

    // Receive loop: parse and dispatch inbound frames in arrival order
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    handle_text_frame(&manager_recv, &connection_recv, &text).await;
                }
                Ok(Message::Binary(_)) => {
                    // Not part of the protocol; ignored, never fatal
                    tracing::debug!(
                        connection_id = %connection_id_recv,
                        "Dropping binary frame"
                    );
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    tracing::trace!(connection_id = %connection_id_recv, "Ping/pong");
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(
                        connection_id = %connection_id_recv,
                        "Client closed connection"
                    );
                    break;
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id_recv,
                        error = %e,
                        "WebSocket error"
                    );
                    break;
                }
            }
        }
    });

    // Clone for the send task
    let connection_id_send = connection_id.clone();

    // Send loop: drain the outbound channel into the socket
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event.to_json() {
                Ok(json) => {
                    if ws_sink.send(Message::Text(json.into())).await.is_err() {
                        tracing::debug!(
                            connection_id = %connection_id_send,
                            "Failed to write to WebSocket"
                        );
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection_id_send,
                        error = %e,
                        "Failed to serialize outbound event"
                    );
                }
            }
        }

        // Close the WebSocket when the channel is closed
        let _ = ws_sink.close().await;
    });

    // Either direction ending means the transport is gone
    tokio::select! {
        _ = recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task ended");
        }
        _ = send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task ended");
        }
    }

    // Teardown: unbind presence and leave every room, exactly once
    state.manager().remove_connection(&connection_id).await;

    tracing::info!(connection_id = %connection_id, "Connection torn down");
}

/// Parse and dispatch a text frame
///
/// Frames that don't parse into a known event are dropped with a debug
/// log; the sender never observes an error and the connection stays open.
async fn handle_text_frame(
    manager: &Arc<ConnectionManager>,
    connection: &Arc<Connection>,
    text: &str,
) {
    match ClientEvent::from_json(text) {
        Ok(event) => {
            RelayDispatcher::dispatch(manager, connection, event).await;
        }
        Err(e) => {
            tracing::debug!(
                connection_id = %connection.connection_id(),
                error = %e,
                "Dropping unparseable frame"
            );
        }
    }
}

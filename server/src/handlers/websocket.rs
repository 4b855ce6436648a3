//! WebSocket handler for plugin sessions.
//!
//! Reads packet frames from a plugin, feeds them through its
//! [`PluginLink`], and routes the resulting host events through the
//! connection manager.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use floro_sync_engine::HostEvent;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::store::HostStore;
use crate::websocket::{decode_frame, encode_frames, ConnectionManager};

use super::{Dispatch, PluginLink};

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Registers the connection with the manager
/// 2. Spawns a task that packetizes outgoing host events
/// 3. Processes incoming packet frames in a loop
/// 4. Cleans up on disconnect
pub async fn handle_websocket_connection(
    socket: WebSocket,
    store: Arc<HostStore>,
    conn_manager: Arc<ConnectionManager>,
    plugin: String,
    chunk_size: usize,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<HostEvent>();
    let (conn_id, last_id) = conn_manager.register(&plugin, tx);
    let mut link = PluginLink::new(plugin.clone(), last_id.clone());

    tracing::info!(conn_id = %conn_id, plugin = %plugin, "Plugin connected");

    // Events are stamped with the id of the last processed plugin message
    // at the time they are written, not when they were queued.
    let send_plugin = plugin.clone();
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let id = last_id.load(Ordering::SeqCst);
            let frames = match encode_frames(id, &send_plugin, &event, chunk_size) {
                Ok(frames) => frames,
                Err(e) => {
                    tracing::error!("Failed to encode host event: {}", e);
                    continue;
                }
            };
            for frame in frames {
                if let Err(e) = ws_sender.send(Message::Text(frame.into())).await {
                    tracing::warn!("Failed to send WebSocket message: {}", e);
                    return;
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let dispatches = decode_frame(&text).and_then(|packet| link.accept(&store, packet));
                match dispatches {
                    Ok(dispatches) => route(&conn_manager, &conn_id, link.plugin(), dispatches),
                    Err(e) => tracing::warn!(conn_id = %conn_id, "Rejected plugin message: {}", e),
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
            }
            Ok(Message::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(conn_id = %conn_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    conn_manager.unregister(&conn_id);
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        plugin = %plugin,
        active_connections = conn_manager.connection_count(),
        "Plugin disconnected"
    );
}

/// Deliver host events produced by one connection's command.
pub fn route(conn_manager: &ConnectionManager, conn_id: &str, plugin: &str, dispatches: Vec<Dispatch>) {
    for dispatch in dispatches {
        match dispatch {
            Dispatch::Reply(event) => {
                conn_manager.send_to(conn_id, event);
            }
            Dispatch::Others(event) => {
                conn_manager.broadcast(plugin, Some(conn_id), event);
            }
            Dispatch::All(event) => {
                conn_manager.broadcast(plugin, None, event);
            }
        }
    }
}

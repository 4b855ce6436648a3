//! Plugin state and session routes.

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Json, Router,
};
use floro_sync_engine::{HostEvent, PluginState};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::handlers::handle_websocket_connection;
use crate::AppState;

/// Response for a state replacement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutStateResponse {
    /// Connections that received the `update`
    pub notified: usize,
}

/// Create plugin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ws/{plugin}", get(ws_handler))
        .route("/plugins/{plugin}/state", get(get_state).put(put_state))
}

/// GET /ws/{plugin} - Mount a plugin session over WebSocket.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(plugin): Path<String>,
) -> Response {
    let chunk_size = state.config.chunk_size;
    ws.on_upgrade(move |socket| {
        handle_websocket_connection(socket, state.store, state.conn_manager, plugin, chunk_size)
    })
}

/// GET /plugins/{plugin}/state - Current host state of a plugin.
pub async fn get_state(
    State(state): State<AppState>,
    Path(plugin): Path<String>,
) -> Result<Json<PluginState>> {
    state
        .store
        .get(&plugin)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("plugin {}", plugin)))
}

/// PUT /plugins/{plugin}/state - Replace a plugin's state and push an
/// `update` to every mounted session.
pub async fn put_state(
    State(state): State<AppState>,
    Path(plugin): Path<String>,
    Json(plugin_state): Json<PluginState>,
) -> Result<Json<PutStateResponse>> {
    state.store.put(&plugin, plugin_state.clone());
    let notified = state
        .conn_manager
        .broadcast(&plugin, None, HostEvent::Update(plugin_state));
    tracing::info!(plugin = %plugin, notified, "Replaced plugin state");
    Ok(Json(PutStateResponse { notified }))
}

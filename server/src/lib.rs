//! Floro Host - reference host bridge for floro plugin sessions.
//!
//! Holds the source-of-truth state of every plugin and speaks the packetized
//! plugin protocol over WebSocket: `ready` is answered with `load`, `save`
//! is applied and answered with `ack`, and state replaced over HTTP is pushed
//! to every mounted session as an `update`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod store;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::store::HostStore;
use crate::websocket::ConnectionManager;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<HostStore>,
    pub config: Arc<Config>,
    pub conn_manager: Arc<ConnectionManager>,
}

impl AppState {
    pub fn new(config: Config, store: HostStore) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
            conn_manager: ConnectionManager::new_shared(),
        }
    }
}

/// Build the application router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

//! HTTP route definitions.

pub mod health;
pub mod plugins;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(plugins::routes())
}

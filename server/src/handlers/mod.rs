//! Request handlers for plugin sessions.

mod bridge;
mod websocket;

pub use bridge::*;
pub use websocket::*;

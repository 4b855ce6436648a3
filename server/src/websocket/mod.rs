//! WebSocket transport between the host and plugin sessions.
//!
//! Each connection is mounted for one plugin. Frames carry packetized
//! plugin commands inbound and packetized host events outbound.

mod manager;
mod protocol;

pub use manager::{Connection, ConnectionManager, EventSender};
pub use protocol::{decode_frame, encode_frames};

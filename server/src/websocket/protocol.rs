//! WebSocket frame protocol.
//!
//! Every text frame carries one JSON-encoded [`Packet`]. Plugin commands and
//! host events are packetized exactly as they would be over a `postMessage`
//! channel, so a frame never exceeds the configured chunk size.

use floro_sync_engine::{encode_message, HostEvent, Packet};

use crate::error::Result;

/// Parse an inbound text frame.
pub fn decode_frame(text: &str) -> Result<Packet> {
    Ok(serde_json::from_str(text).map_err(floro_sync_engine::Error::from)?)
}

/// Packetize a host event into outbound text frames.
pub fn encode_frames(id: u64, plugin: &str, event: &HostEvent, chunk_size: usize) -> Result<Vec<String>> {
    let packets = encode_message(id, Some(plugin), event, chunk_size)?;
    let frames = packets
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(floro_sync_engine::Error::from)?;
    Ok(frames)
}

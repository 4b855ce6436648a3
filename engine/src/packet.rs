//! Chunked message transport.
//!
//! The message channel between a plugin and its host carries strings of
//! bounded size, so every JSON payload is split into [`Packet`]s of at most
//! `chunk_size` UTF-16 code units and reassembled on the other side.
//!
//! `total_packets` carries the index of the final packet: a message split
//! into three chunks has `total_packets == 2`, and the receiver completes a
//! message once it holds `total_packets + 1` chunks.

use crate::config::MIN_CHUNK_SIZE;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One fragment of a serialized message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Packet {
    /// Message id shared by every fragment
    pub id: u64,
    /// Slice of the serialized payload
    pub chunk: String,
    /// Position of this fragment
    pub index: usize,
    /// Index of the final fragment
    pub total_packets: usize,
    /// Plugin the message belongs to
    pub plugin_name: Option<String>,
}

/// Split `payload` into chunks of at most `chunk_size` UTF-16 code units.
///
/// Surrogate pairs are never split, so a chunk may be one unit short of the
/// limit. Sizes below [`MIN_CHUNK_SIZE`] are raised to it. An empty payload
/// yields a single empty chunk.
pub fn chunk_utf16(payload: &str, chunk_size: usize) -> Vec<&str> {
    let chunk_size = chunk_size.max(MIN_CHUNK_SIZE);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut units = 0;
    for (offset, ch) in payload.char_indices() {
        let width = ch.len_utf16();
        if units + width > chunk_size && offset > start {
            chunks.push(&payload[start..offset]);
            start = offset;
            units = 0;
        }
        units += width;
    }
    if start < payload.len() || chunks.is_empty() {
        chunks.push(&payload[start..]);
    }
    chunks
}

/// Split a serialized payload into packets sharing `id`.
pub fn packetize(
    id: u64,
    plugin_name: Option<&str>,
    payload: &str,
    chunk_size: usize,
) -> Vec<Packet> {
    let chunks = chunk_utf16(payload, chunk_size);
    let total_packets = chunks.len() - 1;
    tracing::trace!(id, packets = chunks.len(), "packetized message");
    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| Packet {
            id,
            chunk: chunk.to_string(),
            index,
            total_packets,
            plugin_name: plugin_name.map(str::to_string),
        })
        .collect()
}

/// Serialize `message` and split it into packets.
pub fn encode_message<T: Serialize>(
    id: u64,
    plugin_name: Option<&str>,
    message: &T,
    chunk_size: usize,
) -> Result<Vec<Packet>> {
    let payload = serde_json::to_string(message)?;
    Ok(packetize(id, plugin_name, &payload, chunk_size))
}

/// Parse a reassembled payload.
pub fn decode_message<T: DeserializeOwned>(payload: &str) -> Result<T> {
    Ok(serde_json::from_str(payload)?)
}

#[derive(Debug)]
struct PendingMessage {
    total_packets: usize,
    chunks: BTreeMap<usize, String>,
}

/// Buffers packets per message id until every fragment has arrived.
///
/// Fragments of one message may arrive in any order. Messages that never
/// complete stay buffered until [`Reassembler::evict_before`] drops them.
#[derive(Debug, Default)]
pub struct Reassembler {
    pending: HashMap<u64, PendingMessage>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a packet. Returns the full payload once its message completes.
    pub fn accept(&mut self, packet: Packet) -> Result<Option<String>> {
        if packet.index > packet.total_packets {
            return Err(Error::InvalidPacket(format!(
                "index {} exceeds final index {} for message {}",
                packet.index, packet.total_packets, packet.id
            )));
        }

        let message = self
            .pending
            .entry(packet.id)
            .or_insert_with(|| PendingMessage {
                total_packets: packet.total_packets,
                chunks: BTreeMap::new(),
            });

        if message.total_packets != packet.total_packets {
            let expected = message.total_packets;
            self.pending.remove(&packet.id);
            return Err(Error::InvalidPacket(format!(
                "message {} announced {} and {} as final index",
                packet.id, expected, packet.total_packets
            )));
        }

        message.chunks.insert(packet.index, packet.chunk);
        // `total_packets` is untrusted; never add to it.
        if message.chunks.len() <= message.total_packets {
            return Ok(None);
        }

        let complete = self.pending.remove(&packet.id).map(|message| {
            message.chunks.into_values().collect::<String>()
        });
        tracing::trace!(id = packet.id, "reassembled message");
        Ok(complete)
    }

    /// Drop every partially buffered message with an id below `id`.
    pub fn evict_before(&mut self, id: u64) -> usize {
        let before = self.pending.len();
        self.pending.retain(|message_id, _| *message_id >= id);
        let dropped = before - self.pending.len();
        if dropped > 0 {
            tracing::warn!(dropped, high_water = id, "evicted stale packet buffers");
        }
        dropped
    }

    /// Number of messages still waiting for fragments.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_of_25000_units_uses_three_packets() {
        let payload = "x".repeat(25_000);
        let packets = packetize(7, Some("icons"), &payload, 10_000);

        assert_eq!(packets.len(), 3);
        assert_eq!(
            packets.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(packets.iter().all(|p| p.total_packets == 2 && p.id == 7));
        assert_eq!(packets[0].chunk.len(), 10_000);
        assert_eq!(packets[2].chunk.len(), 5_000);
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_packet() {
        let payload = "y".repeat(20_000);
        let packets = packetize(1, None, &payload, 10_000);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].total_packets, 1);
    }

    #[test]
    fn empty_payload_is_one_packet() {
        let packets = packetize(1, None, "", 10);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].total_packets, 0);

        let mut reassembler = Reassembler::new();
        let payload = reassembler.accept(packets[0].clone()).unwrap();
        assert_eq!(payload.as_deref(), Some(""));
    }

    #[test]
    fn chunks_count_utf16_units_and_keep_pairs() {
        // Each emoji is two UTF-16 units.
        let payload = "🎉🎉🎉";
        let chunks = chunk_utf16(payload, 3);
        assert_eq!(chunks, vec!["🎉", "🎉", "🎉"]);

        let chunks = chunk_utf16("héllo", 2);
        assert_eq!(chunks, vec!["hé", "ll", "o"]);
    }

    #[test]
    fn tiny_chunk_size_still_fits_pairs() {
        for size in [0, 1] {
            let chunks = chunk_utf16("a🎉b", size);
            assert_eq!(chunks, vec!["a", "🎉", "b"]);
            assert!(chunks
                .iter()
                .all(|c| c.encode_utf16().count() <= MIN_CHUNK_SIZE));
        }
    }

    #[test]
    fn reassemble_out_of_order() {
        let payload = serde_json::to_string(&json!({"event": "load", "data": {"n": "z".repeat(50)}}))
            .unwrap();
        let mut packets = packetize(3, Some("icons"), &payload, 16);
        packets.reverse();

        let mut reassembler = Reassembler::new();
        let mut result = None;
        for packet in packets {
            result = reassembler.accept(packet).unwrap();
        }
        assert_eq!(result, Some(payload));
        assert_eq!(reassembler.pending_count(), 0);
    }

    #[test]
    fn interleaved_messages() {
        let a = packetize(1, None, "aaaaaa", 2);
        let b = packetize(2, None, "bbbb", 2);

        let mut reassembler = Reassembler::new();
        assert_eq!(reassembler.accept(a[0].clone()).unwrap(), None);
        assert_eq!(reassembler.accept(b[1].clone()).unwrap(), None);
        assert_eq!(reassembler.accept(b[0].clone()).unwrap().as_deref(), Some("bbbb"));
        assert_eq!(reassembler.accept(a[2].clone()).unwrap(), None);
        assert_eq!(
            reassembler.accept(a[1].clone()).unwrap().as_deref(),
            Some("aaaaaa")
        );
    }

    #[test]
    fn invalid_packets_are_rejected() {
        let mut reassembler = Reassembler::new();
        let bad = Packet {
            id: 1,
            chunk: String::new(),
            index: 4,
            total_packets: 2,
            plugin_name: None,
        };
        assert!(matches!(
            reassembler.accept(bad),
            Err(Error::InvalidPacket(_))
        ));

        let first = Packet {
            id: 2,
            chunk: "a".into(),
            index: 0,
            total_packets: 2,
            plugin_name: None,
        };
        let conflicting = Packet {
            total_packets: 3,
            index: 1,
            ..first.clone()
        };
        assert_eq!(reassembler.accept(first).unwrap(), None);
        assert!(reassembler.accept(conflicting).is_err());
        assert_eq!(reassembler.pending_count(), 0);
    }

    #[test]
    fn huge_final_index_never_completes_early() {
        let mut reassembler = Reassembler::new();
        let first = Packet {
            id: 5,
            chunk: "{\"command\":".into(),
            index: 0,
            total_packets: usize::MAX,
            plugin_name: Some("icons".into()),
        };
        assert_eq!(reassembler.accept(first.clone()).unwrap(), None);
        assert_eq!(reassembler.pending_count(), 1);

        let last = Packet {
            index: usize::MAX,
            chunk: "\"ready\"}".into(),
            ..first
        };
        assert_eq!(reassembler.accept(last).unwrap(), None);
        assert_eq!(reassembler.pending_count(), 1);
        assert_eq!(reassembler.evict_before(6), 1);
    }

    #[test]
    fn eviction_drops_only_older_ids() {
        let mut reassembler = Reassembler::new();
        for id in 1..=4 {
            let packets = packetize(id, None, "abcd", 2);
            reassembler.accept(packets[0].clone()).unwrap();
        }
        assert_eq!(reassembler.evict_before(3), 2);
        assert_eq!(reassembler.pending_count(), 2);
    }

    #[test]
    fn packet_wire_format() {
        let packet = packetize(9, Some("icons"), "{}", 10).remove(0);
        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(
            json,
            json!({"id": 9, "chunk": "{}", "index": 0, "totalPackets": 0, "pluginName": "icons"})
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_reassembly_under_permutation(
                payload in "\\PC{0,400}",
                chunk_size in 2usize..64,
                seed in any::<u64>(),
            ) {
                let mut packets = packetize(1, None, &payload, chunk_size);
                prop_assert!(packets.iter().all(|p| p.chunk.encode_utf16().count() <= chunk_size));

                // Deterministic shuffle from the seed.
                let mut state = seed;
                for i in (1..packets.len()).rev() {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    let j = (state >> 33) as usize % (i + 1);
                    packets.swap(i, j);
                }

                let mut reassembler = Reassembler::new();
                let mut result = None;
                for packet in packets {
                    if let Some(done) = reassembler.accept(packet).unwrap() {
                        result = Some(done);
                    }
                }
                prop_assert_eq!(result, Some(payload));
            }
        }
    }
}

//! Pluggable outbound channel for packets.
//!
//! A session only needs to post packets; how they reach the other side (a
//! WebSocket, an in-process channel, a test buffer) is up to the transport.

use crate::error::{Error, Result};
use crate::packet::Packet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Something packets can be posted to.
pub trait Transport {
    /// Post one packet. Delivery is fire-and-forget: there is no
    /// acknowledgement and no retry.
    fn post(&self, packet: Packet) -> Result<()>;
}

/// Transport backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: mpsc::UnboundedSender<Packet>,
}

impl ChannelTransport {
    /// Create a transport and the receiver that drains it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Packet>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn from_sender(sender: mpsc::UnboundedSender<Packet>) -> Self {
        Self { sender }
    }
}

impl Transport for ChannelTransport {
    fn post(&self, packet: Packet) -> Result<()> {
        self.sender
            .send(packet)
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

/// In-memory transport that records every posted packet.
///
/// Clones share the same buffer, so a test can keep one handle while a
/// session owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    outbox: Arc<Mutex<Vec<Packet>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every packet posted so far.
    pub fn drain(&self) -> Vec<Packet> {
        self.outbox
            .lock()
            .map(|mut outbox| std::mem::take(&mut *outbox))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.outbox.lock().map(|outbox| outbox.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for MemoryTransport {
    fn post(&self, packet: Packet) -> Result<()> {
        self.outbox
            .lock()
            .map_err(|e| Error::Transport(e.to_string()))?
            .push(packet);
        Ok(())
    }
}

//! WebSocket connection manager.
//!
//! Tracks active plugin connections and fans host events out to every
//! connection mounted for the same plugin.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use dashmap::DashMap;
use floro_sync_engine::HostEvent;
use tokio::sync::mpsc;

/// Sender for host events bound for one connection.
pub type EventSender = mpsc::UnboundedSender<HostEvent>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: String,
    /// Plugin this connection is mounted for
    pub plugin: String,
    /// Channel to send events to this connection
    pub sender: EventSender,
    /// Id of the last plugin message processed, echoed on outbound events
    pub last_id: Arc<AtomicU64>,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// All active connections, keyed by connection ID.
    connections: DashMap<String, Connection>,
    /// Index of connections by plugin for fan-out.
    by_plugin: DashMap<String, Vec<String>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new connection manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection.
    ///
    /// Returns the connection ID and the shared last-processed id cell.
    pub fn register(&self, plugin: &str, sender: EventSender) -> (String, Arc<AtomicU64>) {
        let conn_id = uuid::Uuid::new_v4().to_string();
        let last_id = Arc::new(AtomicU64::new(0));

        let connection = Connection {
            id: conn_id.clone(),
            plugin: plugin.to_string(),
            sender,
            last_id: last_id.clone(),
        };

        self.connections.insert(conn_id.clone(), connection);
        self.by_plugin
            .entry(plugin.to_string())
            .or_default()
            .push(conn_id.clone());

        tracing::info!(conn_id = %conn_id, plugin = %plugin, "WebSocket connection registered");

        (conn_id, last_id)
    }

    /// Unregister a connection.
    pub fn unregister(&self, conn_id: &str) {
        if let Some((_, conn)) = self.connections.remove(conn_id) {
            if let Some(mut conn_ids) = self.by_plugin.get_mut(&conn.plugin) {
                conn_ids.retain(|id| id != conn_id);
                // Clean up empty entries
                if conn_ids.is_empty() {
                    drop(conn_ids);
                    self.by_plugin.remove(&conn.plugin);
                }
            }

            tracing::info!(conn_id = %conn_id, plugin = %conn.plugin, "WebSocket connection unregistered");
        }
    }

    /// Send an event to every connection of `plugin`, optionally skipping one.
    ///
    /// Returns the number of connections that received the event.
    pub fn broadcast(&self, plugin: &str, except: Option<&str>, event: HostEvent) -> usize {
        let conn_ids = match self.by_plugin.get(plugin) {
            Some(ids) => ids.clone(),
            None => return 0,
        };

        let mut sent_count = 0;
        for conn_id in conn_ids.iter().filter(|id| Some(id.as_str()) != except) {
            if self.send_to(conn_id, event.clone()) {
                sent_count += 1;
            }
        }

        tracing::debug!(
            plugin = %plugin,
            event = event.name(),
            recipients = sent_count,
            "Broadcast host event"
        );

        sent_count
    }

    /// Send an event to a specific connection.
    pub fn send_to(&self, conn_id: &str, event: HostEvent) -> bool {
        match self.connections.get(conn_id) {
            Some(conn) => conn.sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Get the number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of plugins with at least one connection.
    pub fn plugin_count(&self) -> usize {
        self.by_plugin.len()
    }
}

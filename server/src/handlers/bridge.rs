//! Host side of the plugin protocol.
//!
//! A [`PluginLink`] owns the reassembly buffer of one connection and turns
//! each complete plugin command into store mutations and host events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use floro_sync_engine::{decode_message, CompareFrom, HostEvent, Packet, PluginCommand, Reassembler};

use crate::error::{AppError, Result};
use crate::store::HostStore;

/// Where a host event should go.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Only the connection that sent the command.
    Reply(HostEvent),
    /// Every other connection of the same plugin.
    Others(HostEvent),
    /// Every connection of the same plugin, sender included.
    All(HostEvent),
}

/// Per-connection protocol state.
#[derive(Debug)]
pub struct PluginLink {
    plugin: String,
    reassembler: Reassembler,
    last_id: Arc<AtomicU64>,
}

impl PluginLink {
    pub fn new(plugin: impl Into<String>, last_id: Arc<AtomicU64>) -> Self {
        Self {
            plugin: plugin.into(),
            reassembler: Reassembler::new(),
            last_id,
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Id of the last plugin message processed.
    pub fn last_id(&self) -> u64 {
        self.last_id.load(Ordering::SeqCst)
    }

    /// Buffer a packet; process its command once complete.
    pub fn accept(&mut self, store: &HostStore, packet: Packet) -> Result<Vec<Dispatch>> {
        if let Some(target) = packet.plugin_name.as_deref() {
            if target != self.plugin {
                return Err(AppError::BadRequest(format!(
                    "packet for {} on a {} connection",
                    target, self.plugin
                )));
            }
        }

        let dispatches = self.process(store, packet);
        // Sweep even when the packet or its command was rejected.
        self.reassembler.evict_before(self.last_id());
        dispatches
    }

    fn process(&mut self, store: &HostStore, packet: Packet) -> Result<Vec<Dispatch>> {
        let id = packet.id;
        let Some(payload) = self.reassembler.accept(packet)? else {
            return Ok(Vec::new());
        };
        // A complete message consumes its id even if it fails to decode.
        self.last_id.fetch_max(id, Ordering::SeqCst);
        let command: PluginCommand = decode_message(&payload)?;
        self.handle_command(store, command)
    }

    /// Number of messages still waiting for packets.
    pub fn pending_messages(&self) -> usize {
        self.reassembler.pending_count()
    }

    /// Apply one plugin command.
    pub fn handle_command(&self, store: &HostStore, command: PluginCommand) -> Result<Vec<Dispatch>> {
        let plugin = self.plugin.as_str();
        tracing::debug!(plugin = %plugin, id = self.last_id(), command = command_name(&command), "Plugin command");

        let dispatches = match command {
            PluginCommand::Ready => {
                let state = store
                    .get(plugin)
                    .ok_or_else(|| AppError::NotFound(format!("plugin {}", plugin)))?;
                vec![Dispatch::Reply(HostEvent::Load(state))]
            }
            PluginCommand::Save(request) => {
                let state = store.apply_save(plugin, &request)?;
                vec![
                    Dispatch::Reply(HostEvent::Ack(state.clone())),
                    Dispatch::Others(HostEvent::Update(state)),
                ]
            }
            PluginCommand::UpdateClientStorage(storage) => {
                store.set_client_storage(plugin, storage)?;
                Vec::new()
            }
            PluginCommand::ClearClientStorage => {
                store.clear_client_storage(plugin)?;
                Vec::new()
            }
            PluginCommand::UpdateCopy(value) => {
                store.set_copied(plugin, value);
                Vec::new()
            }
            PluginCommand::ToggleCommandMode => {
                vec![Dispatch::All(HostEvent::Update(store.toggle_command_mode(plugin)?))]
            }
            PluginCommand::ToggleCompareMode => {
                vec![Dispatch::All(HostEvent::Update(store.toggle_compare_mode(plugin)?))]
            }
            PluginCommand::ToggleBefore => vec![Dispatch::All(HostEvent::Update(
                store.show_compare_side(plugin, CompareFrom::Before)?,
            ))],
            PluginCommand::ToggleAfter => vec![Dispatch::All(HostEvent::Update(
                store.show_compare_side(plugin, CompareFrom::After)?,
            ))],
            PluginCommand::ToggleVcs | PluginCommand::ToggleBranches => {
                // Host chrome only; nothing to sync.
                Vec::new()
            }
        };
        Ok(dispatches)
    }
}

fn command_name(command: &PluginCommand) -> &'static str {
    match command {
        PluginCommand::Save(_) => "save",
        PluginCommand::UpdateCopy(_) => "update-copy",
        PluginCommand::UpdateClientStorage(_) => "update-client-storage",
        PluginCommand::Ready => "ready",
        PluginCommand::ClearClientStorage => "clear-client-storage",
        PluginCommand::ToggleVcs => "toggle-vcs",
        PluginCommand::ToggleCommandMode => "toggle-command-mode",
        PluginCommand::ToggleBefore => "toggle-before",
        PluginCommand::ToggleAfter => "toggle-after",
        PluginCommand::ToggleCompareMode => "toggle-compare-mode",
        PluginCommand::ToggleBranches => "toggle-branches",
    }
}

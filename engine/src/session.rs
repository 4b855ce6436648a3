//! Plugin session: the store façade application code talks to.
//!
//! A session is created per plugin mount, receives the host's `load`,
//! `ack` and `update` events as packets, and exposes path-addressed reads,
//! writes and membership queries over the latest reconciled state.
//!
//! ## Message ids
//!
//! Every outbound message reserves the next value of `update_counter` as its
//! id. The host echoes the id of the last plugin message it processed, so an
//! inbound message whose id is below the counter predates a local send and
//! is treated as stale by the reconciler.

use crate::config::SessionConfig;
use crate::edit::EditTracker;
use crate::error::{Error, Result};
use crate::packet::{decode_message, encode_message, Packet, Reassembler};
use crate::path::is_path_prefix;
use crate::protocol::{
    CommandMode, CompareFrom, HostEvent, PluginCommand, PluginState, SaveRequest, Shortcut,
};
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::state::{get_object_in_state_map, set_object_in_state_map};
use crate::transport::Transport;
use crate::Timestamp;
use serde_json::Value;
use std::collections::BTreeSet;

/// What an inbound message did to the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// State was (re)created from a `load`.
    Loaded,
    /// An `ack` or `update` was reconciled against local state.
    Reconciled(ReconcileOutcome),
}

/// One mounted plugin's view of the host state.
#[derive(Debug)]
pub struct PluginSession<T: Transport> {
    plugin_name: String,
    transport: T,
    config: SessionConfig,
    state: Option<PluginState>,
    update_counter: u64,
    edits: EditTracker,
    reassembler: Reassembler,
    version: u64,
}

impl<T: Transport> PluginSession<T> {
    pub fn new(plugin_name: impl Into<String>, transport: T, config: SessionConfig) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            transport,
            edits: EditTracker::new(config.settle_delay_ms),
            config,
            state: None,
            update_counter: 0,
            reassembler: Reassembler::new(),
            version: 0,
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn state(&self) -> Option<&PluginState> {
        self.state.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    /// Id of the most recent outbound message.
    pub fn update_counter(&self) -> u64 {
        self.update_counter
    }

    /// Incremented on every committed change to the local state.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Path of the unsettled local edit, if any.
    pub fn last_edit_key(&self) -> Option<&str> {
        self.edits.key()
    }

    pub fn pending_messages(&self) -> usize {
        self.reassembler.pending_count()
    }

    pub fn command_mode(&self) -> CommandMode {
        self.state
            .as_ref()
            .map(|state| state.command_mode)
            .unwrap_or_default()
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Buffer an inbound packet; apply its message once complete.
    ///
    /// Packets addressed to another plugin are ignored.
    pub fn handle_packet(&mut self, packet: Packet, now: Timestamp) -> Result<Option<Applied>> {
        if let Some(target) = packet.plugin_name.as_deref() {
            if target != self.plugin_name {
                tracing::trace!(plugin = %self.plugin_name, target, "ignoring packet for another plugin");
                return Ok(None);
            }
        }

        let id = packet.id;
        let applied = self.reassemble(packet).map(|event| {
            event.map(|event| self.handle_host_message(id, event, now))
        });
        // Sweep even when the packet was rejected.
        self.reassembler.evict_before(self.update_counter);
        applied
    }

    fn reassemble(&mut self, packet: Packet) -> Result<Option<HostEvent>> {
        match self.reassembler.accept(packet)? {
            Some(payload) => Ok(Some(decode_message(&payload)?)),
            None => Ok(None),
        }
    }

    /// Apply a fully reassembled host event sent with message id `id`.
    pub fn handle_host_message(&mut self, id: u64, event: HostEvent, now: Timestamp) -> Applied {
        let is_stale = id < self.update_counter;
        tracing::debug!(
            plugin = %self.plugin_name,
            id,
            event = event.name(),
            is_stale,
            "received host event"
        );

        let is_load = matches!(event, HostEvent::Load(_));
        let current = match self.state.take() {
            Some(current) if !is_load => current,
            _ => {
                self.state = Some(event.into_state());
                self.edits.clear();
                self.version += 1;
                return Applied::Loaded;
            }
        };

        let mut incoming = event.into_state();
        let result = Reconciler::new(&incoming.schema_map).reconcile(
            Some(&current.application_state),
            Some(&incoming.application_state),
            self.edits.key(),
            is_stale,
        );
        incoming.application_state = result.state;

        if incoming != current {
            self.version += 1;
        }
        self.state = Some(incoming);
        self.edits.touch(now);
        Applied::Reconciled(result.outcome)
    }

    // =========================================================================
    // Store façade
    // =========================================================================

    /// Value at `path`, if loaded and present.
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_object_in_state_map(&self.state.as_ref()?.application_state, path)
    }

    /// Write `value` at `path` locally, optionally sending a `save`.
    ///
    /// The local write and its edit record are committed before the save is
    /// sent. If sending fails the error is returned but the write stays in
    /// place and protected as the latest edit; call [`Self::save`] to retry.
    pub fn set(&mut self, path: &str, value: Value, do_save: bool, now: Timestamp) -> Result<()> {
        let state = self.editable_state_mut()?;
        set_object_in_state_map(&mut state.application_state, path, value)?;
        self.edits.record(path, now);
        self.version += 1;
        if do_save {
            self.save(path)?;
        }
        Ok(())
    }

    /// Send the currently held value at `path` to the host.
    pub fn save(&mut self, path: &str) -> Result<u64> {
        let state = self.editable_state_mut()?;
        let value = get_object_in_state_map(&state.application_state, path)
            .cloned()
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        self.send(PluginCommand::Save(SaveRequest {
            path: path.to_string(),
            value,
        }))
    }

    fn editable_state_mut(&mut self) -> Result<&mut PluginState> {
        let state = self.state.as_mut().ok_or(Error::NotLoaded)?;
        match state.command_mode {
            CommandMode::Edit => Ok(state),
            mode => Err(Error::NotEditable(mode)),
        }
    }

    pub fn is_invalid(&self, path: &str, fuzzy: bool) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| contains_path(&state.invalid_paths, path, fuzzy))
    }

    /// Changed in the `after` side of a comparison.
    pub fn was_added(&self, path: &str, fuzzy: bool) -> bool {
        self.in_changeset(CompareFrom::After, path, fuzzy)
    }

    /// Changed in the `before` side of a comparison.
    pub fn was_removed(&self, path: &str, fuzzy: bool) -> bool {
        self.in_changeset(CompareFrom::Before, path, fuzzy)
    }

    /// Changesets only apply while comparing, and only to the side shown.
    fn in_changeset(&self, side: CompareFrom, path: &str, fuzzy: bool) -> bool {
        self.state.as_ref().is_some_and(|state| {
            state.command_mode == CommandMode::Compare
                && state.compare_from == side
                && contains_path(&state.changeset, path, fuzzy)
        })
    }

    pub fn has_conflict(&self, path: &str, fuzzy: bool) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| contains_path(&state.conflicts, path, fuzzy))
    }

    /// Resolve a file reference to its URL.
    pub fn binary_url(&self, file_ref: &str) -> Option<&str> {
        self.state
            .as_ref()?
            .binary_urls
            .get(file_ref)
            .map(String::as_str)
    }

    pub fn client_storage(&self, key: &str) -> Option<&Value> {
        self.state.as_ref()?.client_storage.get(key)
    }

    /// Store a client-only value and send the whole storage map.
    pub fn set_client_storage(&mut self, key: impl Into<String>, value: Value) -> Result<u64> {
        let state = self.state.as_mut().ok_or(Error::NotLoaded)?;
        state.client_storage.insert(key.into(), value);
        let storage = state.client_storage.clone();
        self.version += 1;
        self.send(PluginCommand::UpdateClientStorage(storage))
    }

    pub fn clear_client_storage(&mut self) -> Result<u64> {
        let state = self.state.as_mut().ok_or(Error::NotLoaded)?;
        state.client_storage.clear();
        self.version += 1;
        self.send(PluginCommand::ClearClientStorage)
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Announce the session to the host, which answers with `load`.
    pub fn ready(&mut self) -> Result<u64> {
        self.send(PluginCommand::Ready)
    }

    /// Hand a value to the host clipboard.
    pub fn update_copy(&mut self, value: Value) -> Result<u64> {
        self.send(PluginCommand::UpdateCopy(value))
    }

    pub fn relay(&mut self, shortcut: Shortcut) -> Result<u64> {
        self.send(shortcut.into())
    }

    /// Serialize, packetize and post `command` under a fresh message id.
    pub fn send(&mut self, command: PluginCommand) -> Result<u64> {
        self.update_counter += 1;
        let id = self.update_counter;
        let packets = encode_message(
            id,
            Some(&self.plugin_name),
            &command,
            self.config.effective_chunk_size(),
        )?;
        tracing::debug!(plugin = %self.plugin_name, id, packets = packets.len(), "sending command");
        for packet in packets {
            self.transport.post(packet)?;
        }
        Ok(id)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Settle the local edit once its deadline has passed.
    pub fn tick(&mut self, now: Timestamp) -> bool {
        let settled = self.edits.settle(now);
        if settled {
            tracing::trace!(plugin = %self.plugin_name, "local edit settled");
        }
        settled
    }

    /// Drop all session state, as on unmount.
    pub fn teardown(&mut self) {
        tracing::debug!(
            plugin = %self.plugin_name,
            pending = self.reassembler.pending_count(),
            "tearing down session"
        );
        self.state = None;
        self.edits.clear();
        self.reassembler = Reassembler::new();
    }
}

/// Exact membership, or with `fuzzy` any entry at or below `path`.
fn contains_path(set: &BTreeSet<String>, path: &str, fuzzy: bool) -> bool {
    if fuzzy {
        set.iter().any(|entry| is_path_prefix(path, entry))
    } else {
        set.contains(path)
    }
}

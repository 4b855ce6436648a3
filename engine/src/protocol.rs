//! Typed message envelopes exchanged between a plugin session and its host.
//!
//! Outbound payloads serialize as `{"command": ..., "data": ...}`; inbound
//! payloads as `{"event": "load" | "ack" | "update", "data": PluginState}`.
//! Both travel as packetized JSON strings (see [`crate::packet`]).

use crate::schema::SchemaMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Whether a session may mutate and send state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandMode {
    #[default]
    View,
    Edit,
    Compare,
}

impl fmt::Display for CommandMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandMode::View => write!(f, "view"),
            CommandMode::Edit => write!(f, "edit"),
            CommandMode::Compare => write!(f, "compare"),
        }
    }
}

/// Which side of a comparison the host is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareFrom {
    #[default]
    None,
    Before,
    After,
}

/// Full state of one plugin session as delivered by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginState {
    pub command_mode: CommandMode,
    pub compare_from: CompareFrom,
    /// Application state map: `{ "<plugin>": tree }`
    pub application_state: Value,
    pub schema_map: SchemaMap,
    /// Path prefixes the host considers invalid
    pub invalid_paths: BTreeSet<String>,
    /// Path prefixes changed between the compared sides
    pub changeset: BTreeSet<String>,
    /// Path prefixes with merge conflicts
    pub conflicts: BTreeSet<String>,
    /// File reference to resolvable URL
    pub binary_urls: BTreeMap<String, String>,
    /// File reference to stored binary name
    pub binary_map: BTreeMap<String, String>,
    /// Client-only storage, never part of the application state
    pub client_storage: Map<String, Value>,
}

/// Payload of a `save` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub path: String,
    pub value: Value,
}

/// Commands a plugin sends to its host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "kebab-case")]
pub enum PluginCommand {
    Save(SaveRequest),
    UpdateCopy(Value),
    UpdateClientStorage(Map<String, Value>),
    Ready,
    ClearClientStorage,
    ToggleVcs,
    ToggleCommandMode,
    ToggleBefore,
    ToggleAfter,
    ToggleCompareMode,
    ToggleBranches,
}

/// Keyboard shortcuts relayed from the sandbox to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Vcs,
    CommandMode,
    Before,
    After,
    CompareMode,
    Branches,
}

impl From<Shortcut> for PluginCommand {
    fn from(shortcut: Shortcut) -> Self {
        match shortcut {
            Shortcut::Vcs => PluginCommand::ToggleVcs,
            Shortcut::CommandMode => PluginCommand::ToggleCommandMode,
            Shortcut::Before => PluginCommand::ToggleBefore,
            Shortcut::After => PluginCommand::ToggleAfter,
            Shortcut::CompareMode => PluginCommand::ToggleCompareMode,
            Shortcut::Branches => PluginCommand::ToggleBranches,
        }
    }
}

/// Events a host sends to a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum HostEvent {
    /// Initial state; (re)creates the session state.
    Load(PluginState),
    /// Reply to a save.
    Ack(PluginState),
    /// Host-initiated snapshot.
    Update(PluginState),
}

impl HostEvent {
    pub fn state(&self) -> &PluginState {
        match self {
            HostEvent::Load(state) | HostEvent::Ack(state) | HostEvent::Update(state) => state,
        }
    }

    pub fn into_state(self) -> PluginState {
        match self {
            HostEvent::Load(state) | HostEvent::Ack(state) | HostEvent::Update(state) => state,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::Load(_) => "load",
            HostEvent::Ack(_) => "ack",
            HostEvent::Update(_) => "update",
        }
    }
}

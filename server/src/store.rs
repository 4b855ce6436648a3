//! Host-side source of truth for plugin state.
//!
//! One [`PluginState`] per plugin name. Plugin sessions only ever hold
//! copies; every `save` lands here first and is echoed back from here.

use std::collections::BTreeMap;
use std::path::Path;

use dashmap::DashMap;
use floro_sync_engine::{
    set_object_in_state_map, CommandMode, CompareFrom, PluginState, SaveRequest,
};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// Thread-safe map of plugin name to host state.
#[derive(Debug, Default)]
pub struct HostStore {
    plugins: DashMap<String, PluginState>,
    copied: DashMap<String, Value>,
}

impl HostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a JSON object of plugin name to [`PluginState`].
    pub fn from_seed(seed: BTreeMap<String, PluginState>) -> Self {
        let store = Self::new();
        for (plugin, state) in seed {
            store.plugins.insert(plugin, state);
        }
        store
    }

    /// Read a seed file written as `{ "<plugin>": PluginState, ... }`.
    pub fn load_seed_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Internal(format!("reading {}: {}", path.display(), e)))?;
        let seed: BTreeMap<String, PluginState> = serde_json::from_str(&text)
            .map_err(|e| AppError::BadRequest(format!("invalid seed file: {}", e)))?;
        tracing::info!(plugins = seed.len(), path = %path.display(), "Loaded seed state");
        Ok(Self::from_seed(seed))
    }

    pub fn get(&self, plugin: &str) -> Option<PluginState> {
        self.plugins.get(plugin).map(|state| state.clone())
    }

    /// Replace a plugin's state wholesale.
    pub fn put(&self, plugin: &str, state: PluginState) {
        self.plugins.insert(plugin.to_string(), state);
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Apply a plugin's `save` and return the resulting state.
    pub fn apply_save(&self, plugin: &str, request: &SaveRequest) -> Result<PluginState> {
        self.update(plugin, |state| {
            if state.command_mode != CommandMode::Edit {
                return Err(floro_sync_engine::Error::NotEditable(state.command_mode).into());
            }
            set_object_in_state_map(
                &mut state.application_state,
                &request.path,
                request.value.clone(),
            )?;
            Ok(())
        })
    }

    pub fn set_client_storage(&self, plugin: &str, storage: Map<String, Value>) -> Result<PluginState> {
        self.update(plugin, |state| {
            state.client_storage = storage;
            Ok(())
        })
    }

    pub fn clear_client_storage(&self, plugin: &str) -> Result<PluginState> {
        self.update(plugin, |state| {
            state.client_storage.clear();
            Ok(())
        })
    }

    /// Flip between viewing and editing.
    pub fn toggle_command_mode(&self, plugin: &str) -> Result<PluginState> {
        self.update(plugin, |state| {
            state.command_mode = match state.command_mode {
                CommandMode::Edit => CommandMode::View,
                CommandMode::View | CommandMode::Compare => CommandMode::Edit,
            };
            state.compare_from = CompareFrom::None;
            Ok(())
        })
    }

    /// Enter or leave comparison. Entering shows the `after` side.
    pub fn toggle_compare_mode(&self, plugin: &str) -> Result<PluginState> {
        self.update(plugin, |state| {
            if state.command_mode == CommandMode::Compare {
                state.command_mode = CommandMode::View;
                state.compare_from = CompareFrom::None;
            } else {
                state.command_mode = CommandMode::Compare;
                state.compare_from = CompareFrom::After;
            }
            Ok(())
        })
    }

    /// Show one side of a comparison. Ignored outside compare mode.
    pub fn show_compare_side(&self, plugin: &str, side: CompareFrom) -> Result<PluginState> {
        self.update(plugin, |state| {
            if state.command_mode == CommandMode::Compare {
                state.compare_from = side;
            }
            Ok(())
        })
    }

    /// Remember the last value a plugin asked to copy.
    pub fn set_copied(&self, plugin: &str, value: Value) {
        self.copied.insert(plugin.to_string(), value);
    }

    pub fn copied(&self, plugin: &str) -> Option<Value> {
        self.copied.get(plugin).map(|value| value.clone())
    }

    fn update(
        &self,
        plugin: &str,
        apply: impl FnOnce(&mut PluginState) -> Result<()>,
    ) -> Result<PluginState> {
        let mut state = self
            .plugins
            .get_mut(plugin)
            .ok_or_else(|| AppError::NotFound(format!("plugin {}", plugin)))?;
        apply(&mut *state)?;
        Ok(state.clone())
    }
}

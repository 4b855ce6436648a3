//! Path resolution against raw state trees.
//!
//! Reads are defensive: any missing intermediate node yields `None`, which
//! callers treat as "not available yet". Writes never create intermediate
//! nodes and report [`Error::PathNotFound`] instead.

use crate::error::{Error, Result};
use crate::flatten::key_string;
use crate::path::{decode_schema_path_with_arrays, plugin_name, PathSegment};
use serde_json::Value;

fn root_plugin(segments: &[PathSegment]) -> Option<&str> {
    match segments.first()? {
        PathSegment::Field(name) => plugin_name(name),
        _ => None,
    }
}

fn matches_query(element: &Value, key: &str, value: &str) -> bool {
    element.get(key).is_some() && key_string(element.get(key)) == value
}

fn step<'a>(current: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match segment {
        PathSegment::Field(name) => current.as_object()?.get(name),
        PathSegment::Query { key, value } => current
            .as_array()?
            .iter()
            .find(|element| matches_query(element, key, value)),
        PathSegment::Index(index) => current.as_array()?.get(*index),
    }
}

fn step_mut<'a>(current: &'a mut Value, segment: &PathSegment) -> Option<&'a mut Value> {
    match segment {
        PathSegment::Field(name) => current.as_object_mut()?.get_mut(name),
        PathSegment::Query { key, value } => current
            .as_array_mut()?
            .iter_mut()
            .find(|element| matches_query(element, key, value)),
        PathSegment::Index(index) => current.as_array_mut()?.get_mut(*index),
    }
}

/// Resolve `path` inside the application state map `{ "<plugin>": tree }`.
pub fn get_object_in_state_map<'a>(state: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = decode_schema_path_with_arrays(path);
    let mut current = state.get(root_plugin(&segments)?)?;
    for segment in &segments[1..] {
        current = step(current, segment)?;
    }
    Some(current)
}

/// Mutable variant of [`get_object_in_state_map`].
pub fn get_object_in_state_map_mut<'a>(state: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let segments = decode_schema_path_with_arrays(path);
    let mut current = state.get_mut(root_plugin(&segments)?)?;
    for segment in &segments[1..] {
        current = step_mut(current, segment)?;
    }
    Some(current)
}

/// Write `value` at `path`.
///
/// The parent of the target must already exist. A plain field may be added
/// to an existing object; keyed and positional targets must already exist.
pub fn set_object_in_state_map(state: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = decode_schema_path_with_arrays(path);
    let plugin = root_plugin(&segments)
        .ok_or_else(|| Error::InvalidPath(path.to_string()))?
        .to_string();

    let Some((last, middle)) = segments[1..].split_last() else {
        let map = state
            .as_object_mut()
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        map.insert(plugin, value);
        return Ok(());
    };

    let mut parent = state
        .get_mut(&plugin)
        .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
    for segment in middle {
        parent = step_mut(parent, segment).ok_or_else(|| Error::PathNotFound(path.to_string()))?;
    }

    match last {
        PathSegment::Field(name) => {
            let map = parent
                .as_object_mut()
                .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
            map.insert(name.clone(), value);
        }
        segment => {
            let slot =
                step_mut(parent, segment).ok_or_else(|| Error::PathNotFound(path.to_string()))?;
            *slot = value;
        }
    }
    Ok(())
}

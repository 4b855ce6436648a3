//! Reconciliation of the local application state with host snapshots.
//!
//! This is an optimistic merge restricted to a single in-flight edit path,
//! not a general CRDT. Concurrent edits to different paths are not both
//! preserved; only the edit the local session itself just made is protected.
//!
//! # Algorithm
//!
//! 1. If either side is absent, the other one wins.
//! 2. With an unsettled local edit, locate the innermost flattened record
//!    containing the edit path in both trees. If it sits at the same position
//!    and the same re-indexed slot in both:
//!    - values differ, message stale: keep the local tree
//!    - values differ, message fresh: splice the local value into the remote tree
//!    - otherwise, when both trees flatten identically: keep the local tree
//! 3. Without a decision, diff the flattened trees: keep the local tree if
//!    nothing changed, adopt the remote tree otherwise.
//! 4. Any failure adopts the remote tree unmodified.

use crate::diff::get_diff;
use crate::error::Result;
use crate::flatten::{flatten_state, DiffElement};
use crate::path::{is_path_prefix, split_path};
use crate::reindex::re_index_schema_arrays;
use crate::schema::SchemaMap;
use crate::state::{get_object_in_state_map, set_object_in_state_map};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the next application state was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconcileOutcome {
    /// One side was absent; the other was returned.
    MissingSide,
    /// Nothing changed; the local tree was kept.
    Unchanged,
    /// A stale snapshot contradicted the local edit; the local tree was kept.
    KeptLocal,
    /// The local edit was spliced into the remote tree.
    Spliced,
    /// The remote tree was adopted.
    AdoptedRemote,
    /// Reconciliation failed; the remote tree was adopted.
    FellBack,
}

/// Result of reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileResult {
    pub state: Value,
    pub outcome: ReconcileOutcome,
}

impl ReconcileResult {
    fn new(state: Value, outcome: ReconcileOutcome) -> Self {
        Self { state, outcome }
    }
}

/// Reconciles application states against one schema map.
pub struct Reconciler<'a> {
    schema_map: &'a SchemaMap,
}

impl<'a> Reconciler<'a> {
    pub fn new(schema_map: &'a SchemaMap) -> Self {
        Self { schema_map }
    }

    /// Decide the next application state.
    ///
    /// `last_edit_key` is the path of the most recent unsettled local edit;
    /// `is_stale` is true when the incoming snapshot predates the latest
    /// message this session sent.
    pub fn reconcile(
        &self,
        current: Option<&Value>,
        next: Option<&Value>,
        last_edit_key: Option<&str>,
        is_stale: bool,
    ) -> ReconcileResult {
        let (current, next) = match (present(current), present(next)) {
            (Some(current), Some(next)) => (current, next),
            (Some(current), None) => {
                return ReconcileResult::new(current.clone(), ReconcileOutcome::MissingSide)
            }
            (None, next) => {
                return ReconcileResult::new(
                    next.cloned().unwrap_or(Value::Null),
                    ReconcileOutcome::MissingSide,
                )
            }
        };

        match self.try_reconcile(current, next, last_edit_key, is_stale) {
            Ok(result) => {
                tracing::debug!(outcome = ?result.outcome, is_stale, "reconciled application state");
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "reconciliation failed, adopting remote state");
                ReconcileResult::new(next.clone(), ReconcileOutcome::FellBack)
            }
        }
    }

    fn try_reconcile(
        &self,
        current: &Value,
        next: &Value,
        last_edit_key: Option<&str>,
        is_stale: bool,
    ) -> Result<ReconcileResult> {
        let local_kvs = flatten_state(self.schema_map, current);
        let remote_kvs = flatten_state(self.schema_map, next);

        if let Some(edit_key) = last_edit_key {
            if let Some(result) =
                reconcile_edit(current, next, &local_kvs, &remote_kvs, edit_key, is_stale)?
            {
                return Ok(result);
            }
        }

        if get_diff(&local_kvs, &remote_kvs).is_empty() {
            Ok(ReconcileResult::new(
                current.clone(),
                ReconcileOutcome::Unchanged,
            ))
        } else {
            Ok(ReconcileResult::new(
                next.clone(),
                ReconcileOutcome::AdoptedRemote,
            ))
        }
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Position of the innermost flattened record whose path contains `path`.
fn containing_index(kvs: &[DiffElement], path: &str) -> Option<usize> {
    kvs.iter()
        .enumerate()
        .filter(|(_, kv)| is_path_prefix(&kv.key, path))
        .max_by_key(|(_, kv)| split_path(&kv.key).len())
        .map(|(i, _)| i)
}

fn reconcile_edit(
    current: &Value,
    next: &Value,
    local_kvs: &[DiffElement],
    remote_kvs: &[DiffElement],
    edit_key: &str,
    is_stale: bool,
) -> Result<Option<ReconcileResult>> {
    let (Some(local_index), Some(remote_index)) = (
        containing_index(local_kvs, edit_key),
        containing_index(remote_kvs, edit_key),
    ) else {
        return Ok(None);
    };
    if local_index != remote_index {
        return Ok(None);
    }

    let local_paths = re_index_schema_arrays(local_kvs);
    let remote_paths = re_index_schema_arrays(remote_kvs);
    if local_paths[local_index] != remote_paths[remote_index] {
        return Ok(None);
    }

    let local_value = get_object_in_state_map(current, edit_key);
    let remote_value = get_object_in_state_map(next, edit_key);

    if local_value != remote_value {
        if is_stale {
            return Ok(Some(ReconcileResult::new(
                current.clone(),
                ReconcileOutcome::KeptLocal,
            )));
        }
        let Some(local_value) = local_value else {
            return Ok(None);
        };
        let mut spliced = next.clone();
        set_object_in_state_map(&mut spliced, edit_key, local_value.clone())?;
        return Ok(Some(ReconcileResult::new(
            spliced,
            ReconcileOutcome::Spliced,
        )));
    }

    if !is_stale && local_paths == remote_paths && local_kvs == remote_kvs {
        return Ok(Some(ReconcileResult::new(
            current.clone(),
            ReconcileOutcome::Unchanged,
        )));
    }
    Ok(None)
}

/// Reconcile and return only the chosen state.
pub fn get_next_application_state(
    current: Option<&Value>,
    next: Option<&Value>,
    schema_map: &SchemaMap,
    last_edit_key: Option<&str>,
    is_stale: bool,
) -> Value {
    Reconciler::new(schema_map)
        .reconcile(current, next, last_edit_key, is_stale)
        .state
}

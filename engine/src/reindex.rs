//! Rewrite content-hash array addressing into positional addressing.
//!
//! Two independently flattened trees name the same array slot differently
//! once the element's content changes. Replacing every `(id)<hash>` segment
//! with `[n]`, where `n` counts elements under the same parent path, lets the
//! two be compared by position.

use crate::flatten::DiffElement;
use crate::path::{decode_schema_path, write_path_string_with_arrays, PathSegment};
use std::collections::HashMap;

/// Re-index the paths of a flattened entry list.
///
/// Entries are expected in flattening order: an element's own entry (the path
/// ending in its `(id)` segment) comes before the entries of its children, so
/// it opens a new position and the children reuse it.
pub fn re_index_schema_arrays(kvs: &[DiffElement]) -> Vec<String> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(kvs.len());

    for kv in kvs {
        let decoded = decode_schema_path(&kv.key);
        let last = decoded.len().saturating_sub(1);
        let mut indexed: Vec<PathSegment> = Vec::with_capacity(decoded.len());

        for (i, segment) in decoded.into_iter().enumerate() {
            if !segment.is_id_query() {
                indexed.push(segment);
                continue;
            }
            let parent = write_path_string_with_arrays(&indexed);
            let position = if i == last {
                let next = positions.get(&parent).map_or(0, |p| p + 1);
                positions.insert(parent, next);
                next
            } else {
                *positions.entry(parent).or_insert(0)
            };
            indexed.push(PathSegment::Index(position));
        }

        out.push(write_path_string_with_arrays(&indexed));
    }
    out
}

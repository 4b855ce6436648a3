//! Schema-driven flattening of a state tree into addressable entries.
//!
//! Every object node becomes one [`DiffElement`] holding only its scalar
//! fields (primitives, refs, files and collections of scalars). Nested objects
//! and collections of objects are emitted as their own entries, after their
//! parent, with the path extended:
//!
//! - nested object: `parent.field`
//! - set element: `parent.field.key<value>` using the element's key field
//! - array element: `parent.field.(id)<hash>` using the element's content hash
//!
//! Fields are visited in lexicographic order and collection elements in
//! ascending order of their identity segment, so two structurally equal trees
//! always flatten to the same sequence.

use crate::hash::get_state_id;
use crate::path::{PathSegment, ID_KEY};
use crate::schema::{key_field, SchemaMap, SchemaNode, TypeStruct};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One flattened, addressable unit of state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffElement {
    /// Path of the object this entry describes
    pub key: String,
    /// The object's scalar fields
    pub value: Value,
}

impl DiffElement {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Flatten every plugin tree in `state` that has a schema.
///
/// `state` is the application state map: `{ "<plugin>": <tree>, ... }`.
/// Plugins are visited in name order; trees without a schema are skipped.
pub fn flatten_state(schema_map: &SchemaMap, state: &Value) -> Vec<DiffElement> {
    let mut out = Vec::new();
    for (plugin, fields) in schema_map {
        if let Some(tree) = state.get(plugin) {
            flatten_into(fields, tree, &format!("$({})", plugin), None, &mut out);
        }
    }
    out
}

/// Flatten a single object subtree rooted at `path`.
pub fn flatten_object(fields: &TypeStruct, value: &Value, path: &str) -> Vec<DiffElement> {
    let mut out = Vec::new();
    flatten_into(fields, value, path, None, &mut out);
    out
}

/// Collections whose elements are objects get one entry per element.
fn expands(node: &SchemaNode) -> Option<&TypeStruct> {
    node.collection_values().and_then(SchemaNode::fields)
}

fn flatten_into(
    fields: &TypeStruct,
    value: &Value,
    path: &str,
    identity: Option<&str>,
    out: &mut Vec<DiffElement>,
) {
    let mut record = Map::new();
    if let Some(id) = identity {
        record.insert(ID_KEY.to_string(), Value::String(id.to_string()));
    }
    for (name, node) in fields {
        let is_leaf = match node {
            SchemaNode::Object { .. } => false,
            SchemaNode::Set { .. } | SchemaNode::Array { .. } => expands(node).is_none(),
            _ => true,
        };
        if is_leaf {
            let field = value.get(name).cloned().unwrap_or(Value::Null);
            record.insert(name.clone(), field);
        }
    }
    out.push(DiffElement::new(path, Value::Object(record)));

    for (name, node) in fields {
        let child = value.get(name).unwrap_or(&Value::Null);
        let child_path = format!("{}.{}", path, name);
        match node {
            SchemaNode::Object { fields } => {
                flatten_into(fields, child, &child_path, None, out);
            }
            SchemaNode::Set { .. } | SchemaNode::Array { .. } => {
                if let Some(element_fields) = expands(node) {
                    flatten_collection(node, element_fields, child, &child_path, out);
                }
            }
            _ => {}
        }
    }
}

fn flatten_collection(
    node: &SchemaNode,
    fields: &TypeStruct,
    items: &Value,
    path: &str,
    out: &mut Vec<DiffElement>,
) {
    let Some(items) = items.as_array() else {
        return;
    };
    let declared_key = match node {
        SchemaNode::Set { .. } => key_field(fields),
        _ => None,
    };

    let mut elements: Vec<(PathSegment, &Value)> = items
        .iter()
        .map(|item| {
            let segment = match declared_key {
                Some(key) => PathSegment::query(key, key_string(item.get(key))),
                None => PathSegment::query(ID_KEY, get_state_id(fields, item)),
            };
            (segment, item)
        })
        .collect();
    elements.sort_by(|(a, _), (b, _)| segment_value(a).cmp(segment_value(b)));

    for (segment, item) in elements {
        let element_path = format!("{}.{}", path, segment);
        let identity = match &segment {
            PathSegment::Query { key, value } if key == ID_KEY => Some(value.as_str()),
            _ => None,
        };
        flatten_into(fields, item, &element_path, identity, out);
    }
}

fn segment_value(segment: &PathSegment) -> &str {
    match segment {
        PathSegment::Query { value, .. } | PathSegment::Field(value) => value,
        PathSegment::Index(_) => "",
    }
}

/// Textual form of a key field value as it appears inside `key<...>`.
pub fn key_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

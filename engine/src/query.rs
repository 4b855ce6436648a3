//! Typed path constructors.
//!
//! A query template is a path whose keyed segments hold the `?` wildcard,
//! e.g. `$(icons).groups.id<?>.icons.id<?>`. [`make_query_ref`] fills the
//! wildcards in order and tags the resulting path with the kind of schema
//! node it addresses, so callers dispatch on a [`QueryRef`] variant instead
//! of inspecting strings.

use crate::error::{Error, Result};
use crate::path::{decode_schema_path, replace_ref_vars_with_wildcards, write_path_string, PathSegment, WILDCARD};
use crate::schema::{node_at_path, PrimitiveKind, SchemaLookup, SchemaMap, SchemaNode};
use crate::state::get_object_in_state_map;
use serde_json::Value;

/// A concrete path tagged with the kind of node it addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRef {
    /// A plugin root, `$(plugin)`.
    Root(String),
    Object(String),
    Set(String),
    Array(String),
    Primitive { path: String, kind: PrimitiveKind },
    /// A reference field; its value is a path matching `ref_type`.
    Ref { path: String, ref_type: String },
    File(String),
}

impl QueryRef {
    fn from_lookup(path: String, lookup: SchemaLookup<'_>) -> Self {
        match lookup {
            SchemaLookup::Root(_) => QueryRef::Root(path),
            SchemaLookup::Node(node) => match node {
                SchemaNode::Object { .. } => QueryRef::Object(path),
                SchemaNode::Set { .. } => QueryRef::Set(path),
                SchemaNode::Array { .. } => QueryRef::Array(path),
                SchemaNode::Primitive { kind, .. } => QueryRef::Primitive { path, kind: *kind },
                SchemaNode::Ref { ref_type, .. } => QueryRef::Ref {
                    path,
                    ref_type: ref_type.clone(),
                },
                SchemaNode::File { .. } => QueryRef::File(path),
            },
        }
    }

    pub fn path(&self) -> &str {
        match self {
            QueryRef::Root(path)
            | QueryRef::Object(path)
            | QueryRef::Set(path)
            | QueryRef::Array(path)
            | QueryRef::File(path)
            | QueryRef::Primitive { path, .. }
            | QueryRef::Ref { path, .. } => path,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, QueryRef::Set(_) | QueryRef::Array(_))
    }

    /// Read the addressed value from an application state map.
    pub fn get<'a>(&self, state: &'a Value) -> Option<&'a Value> {
        get_object_in_state_map(state, self.path())
    }

    /// For a reference field, resolve the node its stored path points at.
    ///
    /// Returns `None` for non-reference queries, unset references, and
    /// stored paths whose shape does not match the declared `ref_type`.
    pub fn get_referenced_object<'a>(&self, state: &'a Value) -> Option<&'a Value> {
        let QueryRef::Ref { ref_type, .. } = self else {
            return None;
        };
        let target = self.get(state)?.as_str()?;
        if replace_ref_vars_with_wildcards(target) != *ref_type {
            return None;
        }
        get_object_in_state_map(state, target)
    }
}

/// Number of `?` wildcards in a query template.
pub fn wildcard_count(template: &str) -> usize {
    decode_schema_path(template)
        .iter()
        .filter(|segment| matches!(segment, PathSegment::Query { value, .. } if value == WILDCARD))
        .count()
}

/// Fill the wildcards of `template` with `args` and resolve its node kind.
///
/// ```rust
/// use floro_sync_engine::{make_query_ref, QueryRef, SchemaMap, SchemaNode, TypeStruct};
///
/// let group = SchemaNode::object([
///     ("id", SchemaNode::key_string()),
///     ("name", SchemaNode::string()),
/// ]);
/// let schema = SchemaMap::from([(
///     "icons".to_string(),
///     TypeStruct::from([("groups".to_string(), SchemaNode::set_of(group))]),
/// )]);
///
/// let query = make_query_ref(&schema, "$(icons).groups.id<?>", &["g1"]).unwrap();
/// assert_eq!(query, QueryRef::Object("$(icons).groups.id<g1>".to_string()));
/// ```
pub fn make_query_ref(schema_map: &SchemaMap, template: &str, args: &[&str]) -> Result<QueryRef> {
    let expected = wildcard_count(template);
    if expected != args.len() {
        return Err(Error::QueryArity {
            query: template.to_string(),
            expected,
            got: args.len(),
        });
    }

    let mut args = args.iter();
    let segments: Vec<PathSegment> = decode_schema_path(template)
        .into_iter()
        .map(|segment| match segment {
            PathSegment::Query { key, value } if value == WILDCARD => match args.next() {
                Some(arg) => PathSegment::query(key, *arg),
                None => PathSegment::query(key, value),
            },
            other => other,
        })
        .collect();
    let path = write_path_string(&segments);

    let lookup =
        node_at_path(schema_map, &path).ok_or_else(|| Error::SchemaNotFound(template.to_string()))?;
    Ok(QueryRef::from_lookup(path, lookup))
}

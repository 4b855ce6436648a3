//! Declarative schema describing the shape of a plugin's state tree.
//!
//! Schemas are owned by the host and delivered with every `load`/`update`
//! event. The engine only performs structural lookups on them; it never
//! validates state against a schema.

use crate::path::{decode_schema_path_with_arrays, plugin_name, PathSegment, ID_KEY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fields of an object node. A `BTreeMap` so traversal is always in
/// lexicographic field order.
pub type TypeStruct = BTreeMap<String, SchemaNode>;

/// Root schema of every plugin, keyed by plugin name.
pub type SchemaMap = BTreeMap<String, TypeStruct>;

/// Primitive value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Int,
    Float,
    Boolean,
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimitiveKind::String => write!(f, "string"),
            PrimitiveKind::Int => write!(f, "int"),
            PrimitiveKind::Float => write!(f, "float"),
            PrimitiveKind::Boolean => write!(f, "boolean"),
        }
    }
}

/// One node of a plugin schema.
///
/// Serialized with an internal `type` tag, e.g.
/// `{"type": "primitive", "kind": "string", "isKey": true}` or
/// `{"type": "set", "values": {"type": "object", "fields": {...}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SchemaNode {
    /// A scalar value.
    #[serde(rename_all = "camelCase")]
    Primitive {
        kind: PrimitiveKind,
        #[serde(default)]
        is_key: bool,
    },
    /// A path string pointing at another node, typically in another plugin.
    #[serde(rename_all = "camelCase")]
    Ref {
        /// Wildcard query of the referenced node, e.g. `$(palette).colors.id<?>`
        ref_type: String,
        #[serde(default)]
        is_key: bool,
    },
    /// A reference to a binary resource.
    #[serde(rename_all = "camelCase")]
    File {
        #[serde(default)]
        is_key: bool,
    },
    /// A nested object.
    Object { fields: TypeStruct },
    /// An unordered collection; elements are identified by their key field.
    Set { values: Box<SchemaNode> },
    /// An ordered collection; elements are identified by content hash.
    Array { values: Box<SchemaNode> },
}

impl SchemaNode {
    pub fn string() -> Self {
        SchemaNode::Primitive {
            kind: PrimitiveKind::String,
            is_key: false,
        }
    }

    pub fn key_string() -> Self {
        SchemaNode::Primitive {
            kind: PrimitiveKind::String,
            is_key: true,
        }
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        SchemaNode::Primitive {
            kind,
            is_key: false,
        }
    }

    pub fn object(fields: impl IntoIterator<Item = (&'static str, SchemaNode)>) -> Self {
        SchemaNode::Object {
            fields: fields
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
        }
    }

    pub fn set_of(values: SchemaNode) -> Self {
        SchemaNode::Set {
            values: Box::new(values),
        }
    }

    pub fn array_of(values: SchemaNode) -> Self {
        SchemaNode::Array {
            values: Box::new(values),
        }
    }

    /// Whether this node is a key field of its parent object.
    pub fn is_key(&self) -> bool {
        match self {
            SchemaNode::Primitive { is_key, .. }
            | SchemaNode::Ref { is_key, .. }
            | SchemaNode::File { is_key } => *is_key,
            _ => false,
        }
    }

    /// Scalars flatten into their parent's entry.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            SchemaNode::Primitive { .. } | SchemaNode::Ref { .. } | SchemaNode::File { .. }
        )
    }

    /// Element schema of a set or array.
    pub fn collection_values(&self) -> Option<&SchemaNode> {
        match self {
            SchemaNode::Set { values } | SchemaNode::Array { values } => Some(values),
            _ => None,
        }
    }

    /// Collections of scalars are stored as a leaf of the parent entry.
    pub fn is_scalar_collection(&self) -> bool {
        self.collection_values().is_some_and(SchemaNode::is_scalar)
    }

    pub fn fields(&self) -> Option<&TypeStruct> {
        match self {
            SchemaNode::Object { fields } => Some(fields),
            _ => None,
        }
    }
}

/// Name of the key field declared by an object schema, if any.
pub fn key_field(fields: &TypeStruct) -> Option<&str> {
    fields
        .iter()
        .find(|(_, node)| node.is_key())
        .map(|(name, _)| name.as_str())
}

/// Borrowed view of a schema location: either a plugin root or a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchemaLookup<'a> {
    Root(&'a TypeStruct),
    Node(&'a SchemaNode),
}

/// Structurally resolve the schema node addressed by `path`.
///
/// Keyed and positional segments step into the element schema of the
/// preceding collection. Returns `None` when the path leaves the schema.
pub fn node_at_path<'a>(schema_map: &'a SchemaMap, path: &str) -> Option<SchemaLookup<'a>> {
    let segments = decode_schema_path_with_arrays(path);
    let (root, rest) = segments.split_first()?;
    let plugin = match root {
        PathSegment::Field(name) => plugin_name(name)?,
        _ => return None,
    };
    let mut current = SchemaLookup::Root(schema_map.get(plugin)?);
    for segment in rest {
        current = match (segment, current) {
            (PathSegment::Field(name), SchemaLookup::Root(fields)) => {
                SchemaLookup::Node(fields.get(name)?)
            }
            (PathSegment::Field(name), SchemaLookup::Node(node)) => {
                SchemaLookup::Node(node.fields()?.get(name)?)
            }
            (PathSegment::Query { key, .. }, SchemaLookup::Node(node)) => {
                let values = node.collection_values()?;
                if key != ID_KEY && !values.fields()?.contains_key(key) {
                    return None;
                }
                SchemaLookup::Node(values)
            }
            (PathSegment::Index(_), SchemaLookup::Node(node)) => {
                SchemaLookup::Node(node.collection_values()?)
            }
            _ => return None,
        };
    }
    Some(current)
}

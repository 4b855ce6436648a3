//! Path codec for addressing nodes in a schema-described state tree.
//!
//! A path is a dot-separated list of segments:
//!
//! - `$(plugin)` selects the plugin subtree the rest of the path addresses
//! - `name` is a plain field access
//! - `key<value>` finds the collection element whose `key` field equals `value`
//! - `[n]` is a positional index (only produced by re-indexing)
//!
//! Anything between balanced `<` and `>` is atomic, so values may contain dots.
//! The codec is forgiving: malformed input decodes to literals and fails later,
//! when the path is resolved against a tree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key used for the synthetic content-hash identity of array elements.
pub const ID_KEY: &str = "(id)";

/// Placeholder written in place of query values by
/// [`replace_ref_vars_with_wildcards`].
pub const WILDCARD: &str = "?";

/// One decoded path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Positional array index, written `[n]`.
    Index(usize),
    /// Literal field name (also used for the `$(plugin)` root).
    Field(String),
    /// Keyed lookup, written `key<value>`.
    Query { key: String, value: String },
}

impl PathSegment {
    pub fn field(name: impl Into<String>) -> Self {
        PathSegment::Field(name.into())
    }

    pub fn query(key: impl Into<String>, value: impl Into<String>) -> Self {
        PathSegment::Query {
            key: key.into(),
            value: value.into(),
        }
    }

    /// True for the synthetic `(id)<hash>` segment of an array element.
    pub fn is_id_query(&self) -> bool {
        matches!(self, PathSegment::Query { key, .. } if key == ID_KEY)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, "{}", name),
            PathSegment::Query { key, value } => write!(f, "{}<{}>", key, value),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// Split a path on `.`, keeping every balanced `<...>` span intact.
pub fn split_path(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut arrows: i64 = 0;
    for ch in path.chars() {
        match ch {
            '<' => arrows += 1,
            '>' => arrows -= 1,
            '.' if arrows == 0 => {
                out.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    out.push(current);
    out
}

/// Decode a path into literal and `key<value>` segments.
pub fn decode_schema_path(path: &str) -> Vec<PathSegment> {
    split_path(path)
        .into_iter()
        .map(|segment| decode_segment(segment, false))
        .collect()
}

/// Decode a path, additionally recognizing `[n]` positional segments.
pub fn decode_schema_path_with_arrays(path: &str) -> Vec<PathSegment> {
    split_path(path)
        .into_iter()
        .map(|segment| decode_segment(segment, true))
        .collect()
}

fn decode_segment(segment: String, with_arrays: bool) -> PathSegment {
    if with_arrays {
        if let Some(index) = parse_index(&segment) {
            return PathSegment::Index(index);
        }
    }
    match split_query(&segment) {
        Some((key, value)) => PathSegment::query(key, value),
        None => PathSegment::Field(segment),
    }
}

fn parse_index(segment: &str) -> Option<usize> {
    let inner = segment.strip_prefix('[')?.strip_suffix(']')?;
    if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    inner.parse().ok()
}

/// Split `key<value>` into its parts. The arrow opened after `key` must close
/// on the final character, otherwise the segment is a literal.
fn split_query(segment: &str) -> Option<(&str, &str)> {
    let open = segment.find('<')?;
    let mut arrows = 0i64;
    for (offset, ch) in segment[open..].char_indices() {
        match ch {
            '<' => arrows += 1,
            '>' => arrows -= 1,
            _ => continue,
        }
        if arrows == 0 {
            let close = open + offset;
            if close + 1 != segment.len() {
                return None;
            }
            return Some((&segment[..open], &segment[open + 1..close]));
        }
    }
    None
}

/// Encode segments back into a path string.
pub fn write_path_string(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Encode segments that may contain positional indices.
///
/// Identical to [`write_path_string`]; kept as the inverse of
/// [`decode_schema_path_with_arrays`].
pub fn write_path_string_with_arrays(segments: &[PathSegment]) -> String {
    write_path_string(segments)
}

/// Rewrite every `key<value>` segment to `key<?>`, producing the schema-shape
/// query for a concrete path.
pub fn replace_ref_vars_with_wildcards(path: &str) -> String {
    let segments: Vec<_> = decode_schema_path(path)
        .into_iter()
        .map(|segment| match segment {
            PathSegment::Query { key, .. } => PathSegment::query(key, WILDCARD),
            other => other,
        })
        .collect();
    write_path_string(&segments)
}

/// Extract the plugin name from a `$(plugin)` root segment.
pub fn plugin_name(segment: &str) -> Option<&str> {
    segment.strip_prefix("$(")?.strip_suffix(')')
}

/// Segment-wise prefix test: `$(a).b` is a prefix of `$(a).b.c` but not of
/// `$(a).bc`.
pub fn is_path_prefix(prefix: &str, path: &str) -> bool {
    let prefix = split_path(prefix);
    let path = split_path(path);
    prefix.len() <= path.len() && prefix.iter().zip(path.iter()).all(|(a, b)| a == b)
}

/// Builder for well-formed path strings.
///
/// ```rust
/// use floro_sync_engine::PathBuilder;
///
/// let path = PathBuilder::plugin("icons")
///     .field("groups")
///     .query("id", "g1")
///     .field("name")
///     .build();
/// assert_eq!(path, "$(icons).groups.id<g1>.name");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathBuilder {
    segments: Vec<PathSegment>,
}

impl PathBuilder {
    /// Start a path rooted at a plugin.
    pub fn plugin(name: &str) -> Self {
        Self {
            segments: vec![PathSegment::Field(format!("$({})", name))],
        }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.segments.push(PathSegment::field(name));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.segments.push(PathSegment::query(key, value));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn build(&self) -> String {
        write_path_string_with_arrays(&self.segments)
    }
}

//! # Floro Sync Engine
//!
//! Schema-addressed state synchronization between a sandboxed plugin and
//! the host that owns its state.
//!
//! A plugin holds a local copy of a host-owned application state tree,
//! edits sub-parts of it by path, and stays consistent with a host that may
//! be pushing newer snapshots at the same time. The two sides only exchange
//! size-bounded string messages.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches the network; packets leave through a
//!   pluggable [`Transport`]
//! - **Deterministic**: flattening, hashing and diffing give the same output
//!   for structurally equal trees, regardless of collection order
//! - **Explicit sessions**: all per-plugin state lives in a [`PluginSession`]
//!
//! ## Core Concepts
//!
//! ### Paths
//!
//! Nodes are addressed by path strings such as
//! `$(icons).groups.id<g1>.name`; see [`path`] and [`PathBuilder`]. Typed
//! constructors for schema-shaped paths come from [`make_query_ref`].
//!
//! ### Flattening and diffing
//!
//! [`flatten_state`] walks a [`SchemaMap`] alongside a state tree and emits
//! one [`DiffElement`] per object node. Array elements are identified by a
//! content hash ([`get_state_id`]) instead of their position.
//! [`get_diff`] compares two flattened lists with an LCS over row hashes.
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] decides whether an incoming host snapshot replaces the
//! local tree, is ignored because it is stale, or receives the local edit
//! spliced in. Only the single most recent local edit is protected.
//!
//! ### Transport
//!
//! Messages are serialized to JSON and split into [`Packet`]s of at most
//! 10,000 UTF-16 code units; a [`Reassembler`] rebuilds them on receipt.
//!
//! ## Quick Start
//!
//! ```rust
//! use floro_sync_engine::{
//!     CommandMode, HostEvent, MemoryTransport, PluginSession, PluginState, SchemaMap,
//!     SchemaNode, SessionConfig, TypeStruct,
//! };
//! use serde_json::json;
//!
//! // 1. The host describes the plugin's state shape
//! let group = SchemaNode::object([
//!     ("id", SchemaNode::key_string()),
//!     ("name", SchemaNode::string()),
//! ]);
//! let schema_map = SchemaMap::from([(
//!     "icons".to_string(),
//!     TypeStruct::from([("groups".to_string(), SchemaNode::set_of(group))]),
//! )]);
//!
//! // 2. Mount a session and announce it
//! let transport = MemoryTransport::new();
//! let mut session = PluginSession::new("icons", transport.clone(), SessionConfig::default());
//! session.ready().unwrap();
//!
//! // 3. The host answers with a load
//! let state = PluginState {
//!     command_mode: CommandMode::Edit,
//!     application_state: json!({"icons": {"groups": [{"id": "g1", "name": "Arrows"}]}}),
//!     schema_map,
//!     ..PluginState::default()
//! };
//! session.handle_host_message(1, HostEvent::Load(state), 0);
//!
//! // 4. Edit and save by path
//! session
//!     .set("$(icons).groups.id<g1>.name", json!("Pointers"), true, 10)
//!     .unwrap();
//! assert_eq!(
//!     session.get("$(icons).groups.id<g1>.name"),
//!     Some(&json!("Pointers"))
//! );
//!
//! // `ready` and `save` each went out as one packet
//! assert_eq!(transport.drain().len(), 2);
//! ```

pub mod config;
pub mod diff;
pub mod edit;
pub mod error;
pub mod flatten;
pub mod hash;
pub mod packet;
pub mod path;
pub mod protocol;
pub mod query;
pub mod reconcile;
pub mod reindex;
pub mod schema;
pub mod session;
pub mod state;
pub mod transport;

// Re-export main types at crate root
pub use config::{SessionConfig, DEFAULT_CHUNK_SIZE, DEFAULT_SETTLE_DELAY_MS, MIN_CHUNK_SIZE};
pub use diff::{get_array_string_diff, get_diff, get_lcs, Diff, StringDiff};
pub use edit::EditTracker;
pub use error::{Error, Result};
pub use flatten::{flatten_object, flatten_state, DiffElement};
pub use hash::{get_row_hash, get_state_id, hash_string};
pub use packet::{decode_message, encode_message, packetize, Packet, Reassembler};
pub use path::{
    decode_schema_path, decode_schema_path_with_arrays, replace_ref_vars_with_wildcards,
    split_path, write_path_string, write_path_string_with_arrays, PathBuilder, PathSegment,
};
pub use protocol::{
    CommandMode, CompareFrom, HostEvent, PluginCommand, PluginState, SaveRequest, Shortcut,
};
pub use query::{make_query_ref, QueryRef};
pub use reconcile::{get_next_application_state, ReconcileOutcome, ReconcileResult, Reconciler};
pub use reindex::re_index_schema_arrays;
pub use schema::{node_at_path, PrimitiveKind, SchemaLookup, SchemaMap, SchemaNode, TypeStruct};
pub use session::{Applied, PluginSession};
pub use state::{get_object_in_state_map, get_object_in_state_map_mut, set_object_in_state_map};
pub use transport::{ChannelTransport, MemoryTransport, Transport};

/// Milliseconds since an arbitrary epoch, supplied by the caller.
pub type Timestamp = u64;

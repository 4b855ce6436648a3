//! Edge case and end-to-end tests for floro-sync-engine
//!
//! These tests drive the public API the way a mounted plugin and its host
//! would, plus boundary conditions on unusual inputs.

use floro_sync_engine::{
    decode_message, encode_message, flatten_object, flatten_state, get_diff,
    get_next_application_state, get_object_in_state_map, packetize, re_index_schema_arrays,
    Applied, ChannelTransport, CommandMode, HostEvent, MemoryTransport, PathBuilder,
    PluginCommand, PluginSession, PluginState, Reassembler, ReconcileOutcome, SaveRequest,
    SchemaMap, SchemaNode, SessionConfig, TypeStruct,
};
use serde_json::{json, Value};

fn icon_node() -> SchemaNode {
    SchemaNode::object([
        ("id", SchemaNode::key_string()),
        ("name", SchemaNode::string()),
    ])
}

fn group_fields() -> TypeStruct {
    TypeStruct::from([
        ("id".to_string(), SchemaNode::key_string()),
        ("name".to_string(), SchemaNode::string()),
        ("icons".to_string(), SchemaNode::array_of(icon_node())),
    ])
}

fn create_schema_map() -> SchemaMap {
    let group = SchemaNode::Object {
        fields: group_fields(),
    };
    SchemaMap::from([(
        "icons".to_string(),
        TypeStruct::from([("groups".to_string(), SchemaNode::set_of(group))]),
    )])
}

fn host_state(groups: Value) -> PluginState {
    PluginState {
        command_mode: CommandMode::Edit,
        application_state: json!({"icons": {"groups": groups}}),
        schema_map: create_schema_map(),
        ..PluginState::default()
    }
}

fn host_packets(id: u64, event: &HostEvent, chunk_size: usize) -> Vec<floro_sync_engine::Packet> {
    encode_message(id, Some("icons"), event, chunk_size).unwrap()
}

fn decode_sent(packets: Vec<floro_sync_engine::Packet>) -> Vec<PluginCommand> {
    let mut reassembler = Reassembler::new();
    packets
        .into_iter()
        .filter_map(|packet| reassembler.accept(packet).unwrap())
        .map(|payload| decode_message(&payload).unwrap())
        .collect()
}

// ============================================================================
// End-to-end Scenarios
// ============================================================================

#[test]
fn scenario_a_flatten_two_level_array() {
    let group = json!({"id": "g1", "icons": [{"id": "a"}, {"id": "b"}]});
    let kvs = flatten_object(&group_fields(), &group, "$(icons).groups.id<g1>");

    assert_eq!(kvs.len(), 3);
    assert_eq!(kvs[0].key, "$(icons).groups.id<g1>");
    assert!(kvs[1..]
        .iter()
        .all(|kv| kv.key.starts_with("$(icons).groups.id<g1>.icons.(id)<")));

    let indexed = re_index_schema_arrays(&kvs);
    assert_eq!(
        indexed,
        vec![
            "$(icons).groups.id<g1>",
            "$(icons).groups.id<g1>.icons.[0]",
            "$(icons).groups.id<g1>.icons.[1]",
        ]
    );
}

#[test]
fn scenario_b_reordered_array_has_empty_diff() {
    let schema_map = create_schema_map();
    let before = json!({"icons": {"groups": [
        {"id": "g1", "icons": [{"id": "a", "name": "A"}, {"id": "b", "name": "B"}]}
    ]}});
    let after = json!({"icons": {"groups": [
        {"id": "g1", "icons": [{"id": "b", "name": "B"}, {"id": "a", "name": "A"}]}
    ]}});
    assert_ne!(
        serde_json::to_string(&before).unwrap(),
        serde_json::to_string(&after).unwrap()
    );

    let diff = get_diff(
        &flatten_state(&schema_map, &before),
        &flatten_state(&schema_map, &after),
    );
    assert!(diff.is_empty());
}

#[test]
fn scenario_c_large_payload_packets() {
    let payload = "a".repeat(25_000);
    let packets = packetize(1, Some("icons"), &payload, 10_000);

    assert_eq!(packets.len(), 3);
    assert!(packets.iter().all(|p| p.total_packets == 2));
    let offsets: Vec<usize> = packets.iter().map(|p| p.index * 10_000).collect();
    assert_eq!(offsets, vec![0, 10_000, 20_000]);
}

// ============================================================================
// Diff Edge Cases
// ============================================================================

#[test]
fn mutated_array_element_is_a_change() {
    let schema_map = create_schema_map();
    let before = json!({"icons": {"groups": [{"id": "g1", "icons": [{"id": "a", "name": "A"}]}]}});
    let after = json!({"icons": {"groups": [{"id": "g1", "icons": [{"id": "a", "name": "Z"}]}]}});

    let diff = get_diff(
        &flatten_state(&schema_map, &before),
        &flatten_state(&schema_map, &after),
    );
    assert_eq!(diff.add.len(), 1);
    assert_eq!(diff.remove.len(), 1);
}

#[test]
fn unicode_and_dotted_keys() {
    let schema_map = create_schema_map();
    let state = json!({"icons": {"groups": [
        {"id": "日本.語", "name": "🎉", "icons": []},
        {"id": "a<b>c", "name": "arrows", "icons": []}
    ]}});

    let path = PathBuilder::plugin("icons")
        .field("groups")
        .query("id", "日本.語")
        .field("name")
        .build();
    assert_eq!(get_object_in_state_map(&state, &path), Some(&json!("🎉")));

    let kvs = flatten_state(&schema_map, &state);
    assert!(kvs.iter().any(|kv| kv.key == "$(icons).groups.id<日本.語>"));
    assert!(get_diff(&kvs, &kvs).is_empty());
}

#[test]
fn unrelated_plugins_are_ignored_by_diff() {
    let schema_map = create_schema_map();
    let before = json!({"icons": {"groups": []}, "palette": {"colors": [1]}});
    let after = json!({"icons": {"groups": []}, "palette": {"colors": [2]}});
    assert!(get_diff(
        &flatten_state(&schema_map, &before),
        &flatten_state(&schema_map, &after)
    )
    .is_empty());
}

// ============================================================================
// Reconciliation Edge Cases
// ============================================================================

#[test]
fn reconcile_same_state_with_edit_in_array() {
    let schema_map = create_schema_map();
    let state = json!({"icons": {"groups": [
        {"id": "g1", "name": "G", "icons": [{"id": "a", "name": "A"}]}
    ]}});
    let next = get_next_application_state(
        Some(&state),
        Some(&state),
        &schema_map,
        Some("$(icons).groups.id<g1>.icons.id<a>.name"),
        false,
    );
    assert_eq!(next, state);
}

#[test]
fn reconcile_with_empty_local_tree() {
    let schema_map = create_schema_map();
    let remote = json!({"icons": {"groups": [{"id": "g1"}]}});
    assert_eq!(
        get_next_application_state(None, Some(&remote), &schema_map, None, false),
        remote
    );
}

// ============================================================================
// Session Flows
// ============================================================================

#[test]
fn session_ready_load_edit_ack() {
    let transport = MemoryTransport::new();
    let mut session = PluginSession::new("icons", transport.clone(), SessionConfig::default());

    let ready_id = session.ready().unwrap();
    assert_eq!(decode_sent(transport.drain()), vec![PluginCommand::Ready]);

    let load = HostEvent::Load(host_state(json!([{"id": "g1", "name": "Arrows", "icons": []}])));
    let mut applied = None;
    for packet in host_packets(ready_id, &load, 10_000) {
        applied = session.handle_packet(packet, 0).unwrap();
    }
    assert_eq!(applied, Some(Applied::Loaded));

    let name = "$(icons).groups.id<g1>.name";
    session.set(name, json!("Pointers"), true, 5).unwrap();
    assert_eq!(
        decode_sent(transport.drain()),
        vec![PluginCommand::Save(SaveRequest {
            path: name.into(),
            value: json!("Pointers"),
        })]
    );

    let ack = HostEvent::Ack(host_state(json!([{"id": "g1", "name": "Pointers", "icons": []}])));
    for packet in host_packets(session.update_counter(), &ack, 64) {
        applied = session.handle_packet(packet, 10).unwrap();
    }
    assert_eq!(applied, Some(Applied::Reconciled(ReconcileOutcome::Unchanged)));
    assert_eq!(session.get(name), Some(&json!("Pointers")));
}

#[test]
fn session_rapid_edits_survive_stale_echoes() {
    let transport = MemoryTransport::new();
    let mut session = PluginSession::new("icons", transport.clone(), SessionConfig::default());
    session.handle_host_message(
        0,
        HostEvent::Load(host_state(json!([{"id": "g1", "name": "", "icons": []}]))),
        0,
    );

    let name = "$(icons).groups.id<g1>.name";
    for (i, text) in ["P", "Po", "Poi"].iter().enumerate() {
        session.set(name, json!(text), true, i as u64).unwrap();
    }
    assert_eq!(session.update_counter(), 3);

    // Echoes of the first two saves arrive after the third was sent.
    for (id, text) in [(1, "P"), (2, "Po")] {
        let echo = HostEvent::Ack(host_state(json!([{"id": "g1", "name": text, "icons": []}])));
        let applied = session.handle_host_message(id, echo, 10);
        assert_eq!(applied, Applied::Reconciled(ReconcileOutcome::KeptLocal));
        assert_eq!(session.get(name), Some(&json!("Poi")));
    }

    let echo = HostEvent::Ack(host_state(json!([{"id": "g1", "name": "Poi", "icons": []}])));
    session.handle_host_message(3, echo, 20);
    assert_eq!(session.get(name), Some(&json!("Poi")));
}

#[test]
fn session_splices_edit_into_fresh_update() {
    let mut session =
        PluginSession::new("icons", MemoryTransport::new(), SessionConfig::default());
    session.handle_host_message(
        0,
        HostEvent::Load(host_state(json!([
            {"id": "g1", "name": "Arrows", "icons": []},
            {"id": "g2", "name": "Shapes", "icons": []}
        ]))),
        0,
    );

    // Local edit not yet saved; host pushes an unrelated change.
    session
        .set("$(icons).groups.id<g1>.name", json!("Pointers"), false, 1)
        .unwrap();
    let update = HostEvent::Update(host_state(json!([
        {"id": "g1", "name": "Arrows", "icons": []},
        {"id": "g2", "name": "Blocks", "icons": []}
    ])));
    let applied = session.handle_host_message(0, update, 2);

    assert_eq!(applied, Applied::Reconciled(ReconcileOutcome::Spliced));
    assert_eq!(
        session.get("$(icons).groups.id<g1>.name"),
        Some(&json!("Pointers"))
    );
    assert_eq!(
        session.get("$(icons).groups.id<g2>.name"),
        Some(&json!("Blocks"))
    );
}

#[test]
fn session_large_state_round_trips_through_small_chunks() {
    let mut session = PluginSession::new(
        "icons",
        MemoryTransport::new(),
        SessionConfig {
            chunk_size: 7,
            ..SessionConfig::default()
        },
    );
    let icons: Vec<Value> = (0..200)
        .map(|i| json!({"id": format!("icon-{}", i), "name": "✓ done 🎯"}))
        .collect();
    let load = HostEvent::Load(host_state(json!([{"id": "g1", "name": "big", "icons": icons}])));

    let mut packets = host_packets(0, &load, 7);
    packets.reverse();
    let mut applied = None;
    for packet in packets {
        if let Some(done) = session.handle_packet(packet, 0).unwrap() {
            applied = Some(done);
        }
    }
    assert_eq!(applied, Some(Applied::Loaded));
    assert_eq!(
        session.get("$(icons).groups.id<g1>.icons.[199].id"),
        Some(&json!("icon-199"))
    );
}

#[tokio::test]
async fn session_over_channel_transport() {
    let (transport, mut receiver) = ChannelTransport::new();
    let mut session = PluginSession::new(
        "icons",
        transport,
        SessionConfig {
            chunk_size: 16,
            ..SessionConfig::default()
        },
    );
    session.handle_host_message(
        0,
        HostEvent::Load(host_state(json!([{"id": "g1", "name": "", "icons": []}]))),
        0,
    );
    session
        .set("$(icons).groups.id<g1>.name", json!("over the channel"), true, 0)
        .unwrap();

    let mut reassembler = Reassembler::new();
    let mut payload = None;
    while let Some(packet) = receiver.recv().await {
        assert_eq!(packet.plugin_name.as_deref(), Some("icons"));
        if let Some(done) = reassembler.accept(packet).unwrap() {
            payload = Some(done);
            break;
        }
    }
    let command: PluginCommand = decode_message(&payload.unwrap()).unwrap();
    assert_eq!(
        command,
        PluginCommand::Save(SaveRequest {
            path: "$(icons).groups.id<g1>.name".into(),
            value: json!("over the channel"),
        })
    );
}

//! Round-trip and corruption tests for the binary wire format.

use trellis::codec::{self, DecodeContext, ErrorRecord};
use trellis::node::NodeValue;
use trellis::{Field, Node, SearchCriteria, Visibility};

use super::helpers::test_controller;

#[test]
fn value_record_roundtrip_preserves_everything() {
    let mut value = NodeValue::with_details(
        "greeting",
        "hello",
        Some("text".to_string()),
        Some("a friendly word".to_string()),
    );
    value.set_value_localized("hallo", "de").unwrap();
    value.set_description_localized("ein Gruß", "de").unwrap();
    value.set_last_modified(123456789);

    let bytes = codec::value_to_bytes(&value).unwrap();
    let decoded = codec::value_from_bytes(&bytes).unwrap();
    assert_eq!(decoded, value);
    // the stamp is outside equality but must survive the wire
    assert_eq!(decoded.last_modified(), 123456789);
    assert_eq!(decoded.value_for("de"), "hallo");
    assert_eq!(decoded.description_for("de"), Some("ein Gruß"));
}

#[test]
fn node_record_roundtrip() {
    let node = Node::with_visibility(":wire", Visibility::Green);
    node.set_owner("sender").unwrap();
    node.set_last_modified(777).unwrap();
    node.add_value(NodeValue::new("k", "v")).unwrap();
    let child = Node::new(":wire:child");
    child.add_value(NodeValue::new("ck", "cv")).unwrap();
    node.add_child(child).unwrap();

    let bytes = codec::node_to_bytes(&node).unwrap();
    let decoded = codec::node_from_bytes(&bytes, &DecodeContext::detached()).unwrap();

    assert_eq!(decoded, node);
    assert_eq!(decoded.last_modified().unwrap(), 777);
    // the nested record came through as a full child
    let child = decoded.child("child").unwrap().unwrap();
    assert_eq!(child.value("ck").unwrap().unwrap().value(), "cv");
}

#[test]
fn tombstone_record_roundtrip() {
    let node = Node::tombstone(":gone", Visibility::Amber);
    node.set_last_modified(99).unwrap();
    let bytes = codec::node_to_bytes(&node).unwrap();
    let decoded = codec::node_from_bytes(&bytes, &DecodeContext::detached()).unwrap();
    assert!(decoded.is_tombstone());
    assert_eq!(decoded.visibility().unwrap(), Visibility::Amber);
    assert_eq!(decoded.last_modified().unwrap(), 99);
    assert_eq!(decoded, node);
}

#[test]
fn skeleton_records_rebind_to_the_context_loader() {
    let controller = test_controller();
    controller.add(&Node::new(":sk")).unwrap();
    controller.add(&Node::new(":sk:c")).unwrap();

    // a fetched parent carries its child as a skeleton
    let parent = controller.get(":sk").unwrap().unwrap();
    let bytes = codec::node_to_bytes(&parent).unwrap();
    let ctx = DecodeContext::new(controller.loader());
    let decoded = codec::node_from_bytes(&bytes, &ctx).unwrap();
    assert_eq!(decoded, parent);

    let child = decoded.child("c").unwrap().unwrap();
    assert!(child.is_skeleton());
    // the re-bound loader resolves against the live controller
    assert_eq!(child.owner().unwrap().as_deref(), Some("testOwner"));
}

#[test]
fn criteria_record_roundtrip() {
    let criteria = SearchCriteria::new()
        .with(Field::Path, ":fruit")
        .with(Field::Key, "stock")
        .with(Field::Value, "[0-9]+");
    let bytes = codec::criteria_to_bytes(&criteria).unwrap();
    assert_eq!(codec::criteria_from_bytes(&bytes).unwrap(), criteria);

    let empty = SearchCriteria::new();
    let bytes = codec::criteria_to_bytes(&empty).unwrap();
    assert_eq!(codec::criteria_from_bytes(&bytes).unwrap(), empty);
}

#[test]
fn corrupted_streams_are_rejected_wholesale() {
    let node = Node::new(":x");
    node.add_value(NodeValue::new("k", "v")).unwrap();
    let bytes = codec::node_to_bytes(&node).unwrap();

    // flipped record tag
    let mut bad = bytes.clone();
    bad[8] ^= 0xff;
    let err = codec::node_from_bytes(&bad, &DecodeContext::detached()).unwrap_err();
    assert!(err.is_corrupt_stream());

    // truncated payload
    let err = codec::node_from_bytes(&bytes[..bytes.len() - 4], &DecodeContext::detached())
        .unwrap_err();
    assert!(err.is_corrupt_stream());

    // mangled trailing integrity tag
    let mut bad = bytes.clone();
    let last = bad.len() - 1;
    bad[last] ^= 0xff;
    let err = codec::node_from_bytes(&bad, &DecodeContext::detached()).unwrap_err();
    assert!(err.is_corrupt_stream());
}

#[test]
fn error_record_roundtrip() {
    let source: trellis::Error = trellis::mapper::MapperError::backend(
        "connection lost",
        std::io::Error::other("socket closed"),
    )
    .into();
    let record = ErrorRecord::from_error(&source);
    assert_eq!(record.kind, "mapper");
    assert_eq!(record.trace, vec!["socket closed".to_string()]);

    let mut buf = Vec::new();
    record.encode(&mut buf).unwrap();
    let decoded = ErrorRecord::decode(&mut buf.as_slice()).unwrap();
    assert_eq!(decoded, record);
}

//! Tests for the Controller orchestration contracts.

use trellis::node::NodeValue;
use trellis::{Node, Visibility};

use super::helpers::{test_controller, test_controller_with_mapper};

#[test]
fn owner_is_defaulted_on_add() {
    let controller = test_controller();
    controller.add(&Node::new(":plain")).unwrap();
    let stored = controller.get(":plain").unwrap().unwrap();
    assert_eq!(stored.owner().unwrap().as_deref(), Some("testOwner"));

    let explicit = Node::new(":owned");
    explicit.set_owner("somebody").unwrap();
    controller.add(&explicit).unwrap();
    let stored = controller.get(":owned").unwrap().unwrap();
    assert_eq!(stored.owner().unwrap().as_deref(), Some("somebody"));
}

#[test]
fn created_node_carries_defaults() {
    let controller = test_controller();
    controller.add(&Node::with_parent("testNode1", "")).unwrap();
    let stored = controller.get(":testNode1").unwrap().unwrap();
    assert_eq!(stored.name(), "testNode1");
    assert_eq!(stored.path(), ":testNode1");
    assert_eq!(stored.visibility().unwrap(), Visibility::Red);
}

#[test]
fn add_requires_existing_parent() {
    let controller = test_controller();
    let err = controller.add(&Node::new(":a:b")).unwrap_err();
    assert!(err.is_parent_missing());
    controller.add(&Node::new(":a")).unwrap();
    controller.add(&Node::new(":a:b")).unwrap();
    assert!(controller.get(":a:b").unwrap().is_some());
}

#[test]
fn duplicate_add_is_rejected() {
    let controller = test_controller();
    controller.add(&Node::new(":dup")).unwrap();
    let err = controller.add(&Node::new(":dup")).unwrap_err();
    assert!(err.is_already_exists());
}

#[test]
fn delete_leaves_a_tombstone() {
    let controller = test_controller();
    controller
        .add(&Node::with_visibility(":doomed", Visibility::Amber))
        .unwrap();
    let removed = controller.delete(":doomed").unwrap();
    assert_eq!(removed.path(), ":doomed");

    assert!(controller.get(":doomed").unwrap().is_none());
    let tombstone = controller.get_node_or_tombstone(":doomed").unwrap();
    assert!(tombstone.is_tombstone());
    assert!(tombstone.owner().unwrap().is_none());
    assert!(tombstone.values().unwrap().is_empty());
    assert!(tombstone.children().unwrap().is_empty());
    assert_eq!(tombstone.visibility().unwrap(), Visibility::Amber);
}

#[test]
fn delete_refuses_non_leaf_nodes() {
    let controller = test_controller();
    controller.add(&Node::new(":p")).unwrap();
    controller.add(&Node::new(":p:c")).unwrap();
    let err = controller.delete(":p").unwrap_err();
    assert!(err.is_has_children());
    controller.delete(":p:c").unwrap();
    controller.delete(":p").unwrap();
    assert!(controller.get(":p").unwrap().is_none());
}

#[test]
fn get_prunes_tombstoned_children() {
    let controller = test_controller();
    controller.add(&Node::new(":p")).unwrap();
    controller.add(&Node::new(":p:a")).unwrap();
    controller.add(&Node::new(":p:b")).unwrap();
    controller.delete(":p:b").unwrap();

    let visible = controller.get(":p").unwrap().unwrap();
    assert_eq!(visible.child_names_csv().unwrap(), "a");

    let raw = controller.get_node_or_tombstone(":p").unwrap();
    let children = raw.children().unwrap();
    assert!(children["b"].is_tombstone());
    assert!(!children["a"].is_tombstone());
}

#[test]
fn rename_in_place_cascades_to_descendants() {
    let controller = test_controller();
    controller.add(&Node::new(":r")).unwrap();
    controller.add(&Node::new(":r:a")).unwrap();
    controller.add(&Node::new(":r:a:x")).unwrap();

    controller.rename(":r:a", "a2").unwrap();

    assert!(controller.get(":r:a2").unwrap().is_some());
    assert!(controller.get(":r:a2:x").unwrap().is_some());
    assert!(controller.get(":r:a").unwrap().is_none());
    assert!(controller.get(":r:a:x").unwrap().is_none());
}

#[test]
fn rename_with_full_path_moves_the_subtree() {
    let controller = test_controller();
    controller.add(&Node::new(":src")).unwrap();
    controller.add(&Node::new(":src:n")).unwrap();
    controller.add(&Node::new(":src:n:leaf")).unwrap();
    controller.add(&Node::new(":dst")).unwrap();

    controller.rename(":src:n", ":dst:moved").unwrap();

    assert!(controller.get(":dst:moved").unwrap().is_some());
    assert!(controller.get(":dst:moved:leaf").unwrap().is_some());
    assert!(controller.get(":src:n").unwrap().is_none());
    let moved = controller.get(":dst:moved").unwrap().unwrap();
    assert_eq!(moved.child_names_csv().unwrap(), "leaf");
}

#[test]
fn value_lifecycle_through_the_controller() {
    let controller = test_controller();
    controller.add(&Node::new(":holder")).unwrap();

    controller
        .add_value(":holder", NodeValue::new("key1", "valueFirst"))
        .unwrap();
    let err = controller
        .add_value(":holder", NodeValue::new("key1", "again"))
        .unwrap_err();
    assert!(err.is_precondition_failed());

    controller
        .update_value(":holder", NodeValue::new("key1", "valueSecond"))
        .unwrap();
    let fetched = controller.get_value(":holder", "key1").unwrap().unwrap();
    assert_eq!(fetched.value(), "valueSecond");

    let err = controller
        .update_value(":holder", NodeValue::new("missing", "x"))
        .unwrap_err();
    assert!(err.is_precondition_failed());

    let removed = controller.delete_value(":holder", "key1").unwrap();
    assert_eq!(removed.value(), "valueSecond");
    assert!(controller.get_value(":holder", "key1").unwrap().is_none());
    let err = controller.delete_value(":holder", "key1").unwrap_err();
    assert!(err.is_precondition_failed());
}

#[test]
fn update_commits_a_whole_subtree() {
    let controller = test_controller();
    controller.add(&Node::new(":p1")).unwrap();
    controller.add(&Node::new(":p1:n")).unwrap();

    // payload: existing node with a changed ordinal plus two new levels
    let payload = Node::with_visibility(":p1:n", Visibility::Green);
    payload.set_owner("testOwner").unwrap();
    let child = Node::new(":p1:n:c1");
    let grandchild = Node::new(":p1:n:c1:c2");
    child.add_child(grandchild).unwrap();
    payload.add_child(child).unwrap();

    controller.update(&payload).unwrap();

    let stored = controller.get(":p1:n").unwrap().unwrap();
    assert_eq!(stored.visibility().unwrap(), Visibility::Green);
    assert_eq!(stored.child_names_csv().unwrap(), "c1");
    let grandchild = controller.get(":p1:n:c1:c2").unwrap().unwrap();
    assert_eq!(grandchild.owner().unwrap().as_deref(), Some("testOwner"));
}

#[test]
fn update_of_missing_node_fails() {
    let controller = test_controller();
    let err = controller.update(&Node::new(":ghost")).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn add_or_update_reports_top_level_creation_only() {
    let controller = test_controller();
    controller.add(&Node::new(":aou")).unwrap();

    let payload = Node::new(":aou:n");
    payload.add_child(Node::new(":aou:n:c")).unwrap();
    assert!(controller.add_or_update(&payload).unwrap());
    assert!(controller.get(":aou:n:c").unwrap().is_some());

    // the same payload again: nothing new at the top level
    assert!(!controller.add_or_update(&payload).unwrap());
}

#[test]
fn add_or_update_ignores_skeletons_and_routes_tombstones() {
    let controller = test_controller();
    controller.add(&Node::new(":aou2")).unwrap();
    controller.add(&Node::new(":aou2:gone")).unwrap();

    let skeleton = Node::skeleton(":aou2:other", controller.loader());
    assert!(!controller.add_or_update(&skeleton).unwrap());
    assert!(controller.get(":aou2:other").unwrap().is_none());

    let tombstone = Node::tombstone(":aou2:gone", Visibility::Red);
    assert!(!controller.add_or_update(&tombstone).unwrap());
    assert!(controller.get(":aou2:gone").unwrap().is_none());
    assert!(
        controller
            .get_node_or_tombstone(":aou2:gone")
            .unwrap()
            .is_tombstone()
    );

    // replaying the tombstone is idempotent
    assert!(!controller.add_or_update(&tombstone).unwrap());
}

#[test]
fn cascades_are_bounded() {
    let controller = test_controller();
    controller.add(&Node::new(":wide")).unwrap();

    let payload = Node::new(":wide");
    for i in 0..=trellis::constants::MAX_CASCADE_NODES {
        payload.add_child(Node::new(format!(":wide:c{i}"))).unwrap();
    }
    let err = controller.update(&payload).unwrap_err();
    assert!(err.is_cascade_limit());

    // the prefix visited before the bound stays committed
    let stored = controller.get(":wide").unwrap().unwrap();
    assert_eq!(
        stored.child_names().unwrap().len(),
        trellis::constants::MAX_CASCADE_NODES
    );
}

#[test]
fn bootstrap_creates_base_tree_and_identity() {
    let controller = test_controller();
    for base in [":Devices", ":Users", ":Enterprise", ":Keys", ":Global", ":Local"] {
        assert!(controller.get(base).unwrap().is_some(), "{base} missing");
    }
    let local = controller.get(":Local").unwrap().unwrap();
    let user = local.value("currentUser").unwrap().unwrap();
    let device = local.value("currentDevice").unwrap().unwrap();
    assert!(!user.value().is_empty());
    assert!(!device.value().is_empty());
    assert!(
        controller
            .get(&format!(":Users:{}", user.value()))
            .unwrap()
            .is_some()
    );
    assert!(
        controller
            .get(&format!(":Devices:{}", device.value()))
            .unwrap()
            .is_some()
    );
}

#[test]
fn identity_is_reused_across_controller_reconstruction() {
    let (controller, mapper) = test_controller_with_mapper();
    let first = controller
        .get_value(":Local", "currentUser")
        .unwrap()
        .unwrap();
    drop(controller);

    let controller = trellis::Controller::new("otherOwner", mapper).unwrap();
    let second = controller
        .get_value(":Local", "currentUser")
        .unwrap()
        .unwrap();
    assert_eq!(first.value(), second.value());
}

#[test]
fn zap_truncates_and_rebootstraps() {
    let controller = test_controller();
    controller.add(&Node::new(":data")).unwrap();
    let before = controller
        .get_value(":Local", "currentUser")
        .unwrap()
        .unwrap();

    controller.zap().unwrap();

    assert!(controller.get(":data").unwrap().is_none());
    let local = controller.get(":Local").unwrap().unwrap();
    let after = local.value("currentUser").unwrap().unwrap();
    assert!(!after.value().is_empty());
    // the old identity went down with the truncated store
    assert_ne!(before.value(), after.value());
}

#[test]
fn dropping_the_last_controller_invalidates_skeletons() {
    let controller = test_controller();
    controller.add(&Node::new(":s")).unwrap();
    controller.add(&Node::new(":s:c")).unwrap();
    let parent = controller.get(":s").unwrap().unwrap();
    let child = parent.child("c").unwrap().unwrap();
    assert!(child.is_skeleton());
    drop(controller);

    let err = child.owner().unwrap_err();
    assert!(matches!(
        err,
        trellis::Error::Controller(
            trellis::controller::ControllerError::ControllerGone
        )
    ));
}

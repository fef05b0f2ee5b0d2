//! Tests for change notification and listener dispatch.

use std::sync::Arc;

use trellis::node::NodeValue;
use trellis::{ChangeListener, EventType, Field, Node, SearchCriteria, Visibility};

use super::helpers::{expect_event, expect_no_event, recording_listener, test_controller};

#[test]
fn create_update_delete_sequence_is_filtered_and_delivered() {
    let controller = test_controller();
    controller.add(&Node::new(":d")).unwrap();

    let (listener, rx) = recording_listener();
    controller
        .register_change_listener(listener, SearchCriteria::new().with(Field::Path, ":d"));

    // create
    controller.add(&Node::new(":d:1")).unwrap();
    let event = expect_event(&rx);
    assert_eq!(event.event, EventType::Create);
    assert!(event.old.is_none());
    assert_eq!(event.new.unwrap().path(), ":d:1");
    expect_no_event(&rx);

    // identical re-submission: no observable diff, no dispatch
    let unchanged = controller.get(":d:1").unwrap().unwrap();
    controller.update(&unchanged).unwrap();
    expect_no_event(&rx);

    // a real change dispatches old and new snapshots
    let changed = controller.get(":d:1").unwrap().unwrap();
    changed.set_visibility(Visibility::Green).unwrap();
    controller.update(&changed).unwrap();
    let event = expect_event(&rx);
    assert_eq!(event.event, EventType::Update);
    assert_eq!(
        event.old.unwrap().visibility().unwrap(),
        Visibility::Red
    );
    assert_eq!(
        event.new.unwrap().visibility().unwrap(),
        Visibility::Green
    );
    expect_no_event(&rx);

    // delete carries the removed node as the old side
    controller.delete(":d:1").unwrap();
    let event = expect_event(&rx);
    assert_eq!(event.event, EventType::Delete);
    assert_eq!(event.old.unwrap().path(), ":d:1");
    assert!(event.new.is_none());
    expect_no_event(&rx);
}

#[test]
fn mutations_outside_the_filter_are_invisible() {
    let controller = test_controller();
    controller.add(&Node::new(":d")).unwrap();
    controller.add(&Node::new(":e")).unwrap();

    let (listener, rx) = recording_listener();
    controller
        .register_change_listener(listener, SearchCriteria::new().with(Field::Path, ":d"));

    controller.add(&Node::new(":e:1")).unwrap();
    expect_no_event(&rx);
}

#[test]
fn rename_matches_either_side_of_the_move() {
    let controller = test_controller();
    controller.add(&Node::new(":from")).unwrap();
    controller.add(&Node::new(":to")).unwrap();
    controller.add(&Node::new(":from:n")).unwrap();

    // subscribed to the destination only; the new side matches
    let (listener, rx) = recording_listener();
    controller
        .register_change_listener(listener, SearchCriteria::new().with(Field::Path, ":to"));

    controller.rename(":from:n", ":to:n").unwrap();
    let event = expect_event(&rx);
    assert_eq!(event.event, EventType::Rename);
    assert_eq!(event.old.unwrap().path(), ":from:n");
    assert_eq!(event.new.unwrap().path(), ":to:n");
}

#[test]
fn value_edits_dispatch_with_untouched_preimages() {
    let controller = test_controller();
    controller.add(&Node::new(":v")).unwrap();

    let (listener, rx) = recording_listener();
    controller
        .register_change_listener(listener, SearchCriteria::new().with(Field::Path, ":v"));

    controller
        .add_value(":v", NodeValue::new("k", "first"))
        .unwrap();
    let event = expect_event(&rx);
    assert_eq!(event.event, EventType::Update);
    // the pre-image was cloned before mutation, not edited in place
    assert!(event.old.unwrap().value("k").unwrap().is_none());
    assert_eq!(
        event.new.unwrap().value("k").unwrap().unwrap().value(),
        "first"
    );

    controller
        .update_value(":v", NodeValue::new("k", "second"))
        .unwrap();
    let event = expect_event(&rx);
    assert_eq!(
        event.old.unwrap().value("k").unwrap().unwrap().value(),
        "first"
    );
    assert_eq!(
        event.new.unwrap().value("k").unwrap().unwrap().value(),
        "second"
    );

    controller.delete_value(":v", "k").unwrap();
    let event = expect_event(&rx);
    assert!(event.new.unwrap().value("k").unwrap().is_none());
    expect_no_event(&rx);
}

#[test]
fn one_listener_may_hold_several_criteria() {
    let controller = test_controller();
    controller.add(&Node::new(":x")).unwrap();
    controller.add(&Node::new(":y")).unwrap();

    let (listener, rx) = recording_listener();
    let cx = SearchCriteria::new().with(Field::Path, ":x");
    let cy = SearchCriteria::new().with(Field::Path, ":y");
    controller.register_change_listener(Arc::clone(&listener), cx.clone());
    controller.register_change_listener(Arc::clone(&listener), cy.clone());

    controller.add(&Node::new(":x:1")).unwrap();
    controller.add(&Node::new(":y:1")).unwrap();
    // both subscriptions fire; delivery order between the two commits is
    // not guaranteed
    let mut delivered = vec![
        expect_event(&rx).new.unwrap().path().to_string(),
        expect_event(&rx).new.unwrap().path().to_string(),
    ];
    delivered.sort();
    assert_eq!(delivered, vec![":x:1".to_string(), ":y:1".to_string()]);

    let removed = controller.deregister_change_listener(&listener);
    assert_eq!(removed, vec![cx, cy]);
    controller.add(&Node::new(":x:2")).unwrap();
    expect_no_event(&rx);

    // deregistering an unknown listener is harmless
    assert!(controller.deregister_change_listener(&listener).is_empty());
}

#[test]
fn listener_failures_never_reach_the_mutator() {
    let controller = test_controller();
    controller.add(&Node::new(":f")).unwrap();

    let failing: Arc<dyn ChangeListener> = Arc::new(
        |_: EventType, _: Option<&Node>, _: Option<&Node>| -> trellis::Result<()> {
            Err(trellis::mapper::MapperError::Backend {
                message: "listener exploded".to_string(),
                source: None,
            }
            .into())
        },
    );
    controller
        .register_change_listener(failing, SearchCriteria::new().with(Field::Path, ":f"));
    let (listener, rx) = recording_listener();
    controller
        .register_change_listener(listener, SearchCriteria::new().with(Field::Path, ":f"));

    controller.add(&Node::new(":f:1")).unwrap();
    // the healthy listener still hears the event
    assert_eq!(expect_event(&rx).event, EventType::Create);
}

#[test]
fn sequential_mutations_arrive_in_commit_order() {
    let controller = test_controller();
    controller.add(&Node::new(":seq")).unwrap();

    let (listener, rx) = recording_listener();
    controller
        .register_change_listener(listener, SearchCriteria::new().with(Field::Path, ":seq"));

    controller.add(&Node::new(":seq:n")).unwrap();
    assert_eq!(expect_event(&rx).event, EventType::Create);

    let changed = controller.get(":seq:n").unwrap().unwrap();
    changed.set_visibility(Visibility::White).unwrap();
    controller.update(&changed).unwrap();
    assert_eq!(expect_event(&rx).event, EventType::Update);

    controller.delete(":seq:n").unwrap();
    assert_eq!(expect_event(&rx).event, EventType::Delete);
}

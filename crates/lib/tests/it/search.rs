//! Tests for SearchCriteria evaluation through the engine.

use trellis::node::NodeValue;
use trellis::{Field, Node, SearchCriteria};

use super::helpers::test_controller;

fn seeded_controller() -> trellis::Controller {
    let controller = test_controller();
    controller.add(&Node::new(":fruit")).unwrap();

    let apples = Node::new(":fruit:apples");
    apples
        .add_value(NodeValue::with_details(
            "stock",
            "12",
            Some("count".to_string()),
            None,
        ))
        .unwrap();
    controller.add(&apples).unwrap();

    let pears = Node::new(":fruit:pears");
    pears.set_owner("warehouse").unwrap();
    pears.add_value(NodeValue::new("stock", "none")).unwrap();
    controller.add(&pears).unwrap();

    controller.add(&Node::new(":veg")).unwrap();
    controller
}

fn paths(result: &[Node]) -> Vec<&str> {
    result.iter().map(Node::path).collect()
}

#[test]
fn search_by_subtree() {
    let controller = seeded_controller();
    let criteria = SearchCriteria::new().with(Field::Path, ":fruit");
    let result = controller.search(&criteria).unwrap();
    assert_eq!(
        paths(&result),
        vec![":fruit", ":fruit:apples", ":fruit:pears"]
    );
}

#[test]
fn search_by_owner_regex() {
    let controller = seeded_controller();
    let criteria = SearchCriteria::new().with(Field::Owner, "ware.*");
    let result = controller.search(&criteria).unwrap();
    assert_eq!(paths(&result), vec![":fruit:pears"]);
}

#[test]
fn search_by_value_constraints() {
    let controller = seeded_controller();

    // any-value mode: nodes carrying a value of type "count"
    let by_type = SearchCriteria::new().with(Field::Type, "count");
    assert_eq!(
        paths(&controller.search(&by_type).unwrap()),
        vec![":fruit:apples"]
    );

    // keyed mode: the named value must satisfy the constraints
    let keyed = SearchCriteria::new()
        .with(Field::Key, "stock")
        .with(Field::Value, "[0-9]+");
    assert_eq!(
        paths(&controller.search(&keyed).unwrap()),
        vec![":fruit:apples"]
    );
}

#[test]
fn search_surfaces_pattern_errors() {
    let controller = seeded_controller();
    let broken = SearchCriteria::new().with(Field::Owner, "(oops");
    assert!(controller.search(&broken).is_err());
}

#[test]
fn tombstones_match_structural_criteria_only() {
    let controller = seeded_controller();
    controller.delete(":fruit:pears").unwrap();

    let by_path = SearchCriteria::new().with(Field::Path, ":fruit:pears");
    let result = controller.search(&by_path).unwrap();
    assert_eq!(result.len(), 1);
    assert!(result[0].is_tombstone());

    // its values are gone with it
    let by_value = SearchCriteria::new().with(Field::Value, "none");
    assert!(controller.search(&by_value).unwrap().is_empty());
}

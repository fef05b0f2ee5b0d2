//! Tests for localized NodeValue handling through the engine.

use trellis::node::NodeValue;
use trellis::Node;

use super::helpers::test_controller;

#[test]
fn translations_survive_storage() {
    let controller = test_controller();
    controller.add(&Node::new(":i18n")).unwrap();

    let mut value = NodeValue::with_details(
        "greeting",
        "hello",
        Some("text".to_string()),
        Some("a friendly word".to_string()),
    );
    value.set_value_localized("hallo", "de").unwrap();
    value.set_value_localized("grüezi", "de-CH").unwrap();
    controller.add_value(":i18n", value).unwrap();

    let stored = controller.get_value(":i18n", "greeting").unwrap().unwrap();
    assert_eq!(stored.value(), "hello");
    assert_eq!(stored.value_for("de"), "hallo");
    assert_eq!(stored.value_for("de-CH"), "grüezi");
    // unknown regions fall back to the primary subtag
    assert_eq!(stored.value_for("de-AT"), "hallo");
    // unknown languages fall back to the default locale
    assert_eq!(stored.value_for("fr"), "hello");
    assert_eq!(stored.value_type(), Some("text"));
    assert_eq!(stored.description(), Some("a friendly word"));
}

#[test]
fn base_translation_is_required() {
    let mut value = NodeValue::new("k", "base");
    let err = value.set_description_localized("beschreibung", "de");
    assert!(err.is_err());
    value.set_description("description");
    value.set_description_localized("beschreibung", "de").unwrap();
    assert_eq!(value.description_for("de"), Some("beschreibung"));
}

#[test]
fn setter_refreshes_modification_stamp() {
    let mut value = NodeValue::new("k", "v");
    value.set_last_modified(0);
    value.set_value("v2");
    assert!(value.last_modified() > 0);
}

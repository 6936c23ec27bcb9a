#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;

fn rect(id: &str, x: f64) -> Shape {
    Shape::new(id, ShapeKind::Rect { x, y: 0.0, w: 10.0, h: 10.0, text: None })
}

fn ids(list: &ShapeList) -> Vec<&str> {
    list.as_slice().iter().map(|s| s.id.as_str()).collect()
}

// =============================================================
// Serde
// =============================================================

#[test]
fn shape_deserializes_flat_wire_form() {
    let shape: Shape = serde_json::from_value(json!({
        "id": "s1",
        "type": "rect",
        "x": 0, "y": 0, "w": 10, "h": 10,
        "stroke": "#2b2b2b",
        "thickness": 3
    }))
    .expect("rect should parse");

    assert_eq!(shape.id, "s1");
    assert_eq!(shape.kind_name(), "rect");
    assert_eq!(shape.style.stroke.as_deref(), Some("#2b2b2b"));
    assert_eq!(shape.style.thickness, Some(3.0));
    assert_eq!(shape.kind, ShapeKind::Rect { x: 0.0, y: 0.0, w: 10.0, h: 10.0, text: None });
}

#[test]
fn shape_serializes_type_tag_and_skips_empty_style() {
    let value = serde_json::to_value(rect("s1", 4.0)).expect("serialize");
    assert_eq!(value.get("type"), Some(&json!("rect")));
    assert_eq!(value.get("id"), Some(&json!("s1")));
    assert_eq!(value.get("x"), Some(&json!(4.0)));
    assert!(value.get("stroke").is_none());
    assert!(value.get("text").is_none());
}

#[test]
fn every_variant_parses() {
    let cases = [
        json!({"id": "a", "type": "stroke", "points": [{"x": 1, "y": 2}, {"x": 3, "y": 4}]}),
        json!({"id": "b", "type": "rect", "x": 0, "y": 0, "w": 1, "h": 1, "text": "hi"}),
        json!({"id": "c", "type": "ellipse", "x": 0, "y": 0, "w": 1, "h": 1}),
        json!({"id": "d", "type": "arrow", "from": {"x": 0, "y": 0}, "to": {"x": 5, "y": 5}}),
        json!({"id": "e", "type": "text", "x": 1, "y": 1, "text": "label"}),
    ];
    let names: Vec<&str> = cases
        .iter()
        .map(|v| serde_json::from_value::<Shape>(v.clone()).expect("should parse"))
        .map(|s| s.kind_name())
        .collect();
    assert_eq!(names, ["stroke", "rect", "ellipse", "arrow", "text"]);
}

#[test]
fn unknown_type_is_rejected() {
    let result = serde_json::from_value::<Shape>(json!({"id": "a", "type": "diamond", "x": 0, "y": 0}));
    assert!(result.is_err());
}

#[test]
fn missing_id_is_rejected() {
    let result = serde_json::from_value::<Shape>(json!({"type": "text", "x": 0, "y": 0, "text": "t"}));
    assert!(result.is_err());
}

#[test]
fn patch_keeps_id_separate_from_fields() {
    let patch: ShapePatch = serde_json::from_value(json!({"id": "s1", "x": 5})).expect("patch");
    assert_eq!(patch.id, "s1");
    assert_eq!(patch.fields.get("x"), Some(&json!(5)));
    assert!(!patch.fields.contains_key("id"));
}

#[test]
fn patch_from_shape_rewrites_every_field() {
    let shape = rect("s1", 2.0);
    let patch = ShapePatch::from(&shape);
    assert_eq!(patch.id, "s1");
    assert_eq!(patch.fields.get("type"), Some(&json!("rect")));
    assert_eq!(rect("s1", 9.0).patched(&patch.fields).expect("patch"), shape);
}

// =============================================================
// Patching
// =============================================================

#[test]
fn patched_overwrites_only_given_fields() {
    let shape = rect("s1", 0.0).with_style(Style { stroke: Some("#000".into()), ..Style::default() });
    let next = shape
        .patched(&ShapePatch::new("s1").set("x", 5).fields)
        .expect("patch");

    assert_eq!(next.kind, ShapeKind::Rect { x: 5.0, y: 0.0, w: 10.0, h: 10.0, text: None });
    assert_eq!(next.style.stroke.as_deref(), Some("#000"));
}

#[test]
fn patched_ignores_id_field() {
    let fields = ShapePatch::new("s1").set("id", "other").fields;
    assert_eq!(rect("s1", 0.0).patched(&fields).expect("patch").id, "s1");
}

#[test]
fn patched_null_clears_optional_field() {
    let shape = Shape::new("s1", ShapeKind::Ellipse { x: 0.0, y: 0.0, w: 1.0, h: 1.0, text: Some("t".into()) });
    let next = shape
        .patched(&ShapePatch::new("s1").set("text", serde_json::Value::Null).fields)
        .expect("patch");
    assert_eq!(next.kind, ShapeKind::Ellipse { x: 0.0, y: 0.0, w: 1.0, h: 1.0, text: None });
}

#[test]
fn patched_type_change_without_geometry_fails() {
    let result = rect("s1", 0.0).patched(&ShapePatch::new("s1").set("type", "arrow").fields);
    assert!(result.is_err());
}

// =============================================================
// ShapeList
// =============================================================

#[test]
fn add_appends_in_order() {
    let mut list = ShapeList::new();
    assert!(list.add(rect("a", 0.0)));
    assert!(list.add(rect("b", 0.0)));
    assert_eq!(ids(&list), ["a", "b"]);
}

#[test]
fn colliding_add_is_noop_first_writer_wins() {
    let mut list = ShapeList::new();
    list.add(rect("a", 1.0));
    assert!(!list.add(rect("a", 99.0)));
    assert_eq!(list.len(), 1);
    assert_eq!(list.get("a"), Some(&rect("a", 1.0)));
}

#[test]
fn add_all_counts_only_inserted() {
    let mut list = ShapeList::from_shapes(vec![rect("a", 0.0)]);
    let inserted = list.add_all(vec![rect("a", 5.0), rect("b", 0.0), rect("b", 7.0)]);
    assert_eq!(inserted, 1);
    assert_eq!(ids(&list), ["a", "b"]);
    assert_eq!(list.get("b"), Some(&rect("b", 0.0)));
}

#[test]
fn delete_is_idempotent_and_ignores_unknown_ids() {
    let mut list = ShapeList::from_shapes(vec![rect("a", 0.0), rect("b", 0.0), rect("c", 0.0)]);
    let doomed = vec!["b".to_owned(), "zzz".to_owned()];

    assert_eq!(list.delete(&doomed), 1);
    let once = list.clone();
    assert_eq!(list.delete(&doomed), 0);
    assert_eq!(list, once);
    assert_eq!(ids(&list), ["a", "c"]);
}

#[test]
fn clear_empties_and_reports_count() {
    let mut list = ShapeList::from_shapes(vec![rect("a", 0.0), rect("b", 0.0)]);
    assert_eq!(list.clear(), 2);
    assert!(list.is_empty());
    assert_eq!(list.clear(), 0);
}

#[test]
fn update_preserves_position() {
    let mut list = ShapeList::from_shapes(vec![rect("a", 0.0), rect("b", 0.0), rect("c", 0.0)]);
    assert!(list.update(&ShapePatch::new("b").set("x", 42)));
    assert_eq!(ids(&list), ["a", "b", "c"]);
    assert_eq!(list.get("b"), Some(&rect("b", 42.0)));
}

#[test]
fn update_never_creates() {
    let mut list = ShapeList::from_shapes(vec![rect("a", 0.0)]);
    let changed = list.update_all(&[ShapePatch::new("ghost").set("x", 1)]);
    assert_eq!(changed, 0);
    assert_eq!(ids(&list), ["a"]);
}

#[test]
fn invalid_update_leaves_shape_untouched() {
    let mut list = ShapeList::from_shapes(vec![rect("a", 3.0)]);
    assert!(!list.update(&ShapePatch::new("a").set("x", "not a number")));
    assert_eq!(list.get("a"), Some(&rect("a", 3.0)));
}

#[test]
fn later_update_wins() {
    let mut list = ShapeList::from_shapes(vec![rect("s1", 0.0)]);
    list.update_all(&[ShapePatch::new("s1").set("x", 5)]);
    list.update_all(&[ShapePatch::new("s1").set("x", 9)]);
    assert_eq!(list.get("s1"), Some(&rect("s1", 9.0)));
}

#[test]
fn from_shapes_drops_duplicate_ids() {
    let list = ShapeList::from_shapes(vec![rect("a", 1.0), rect("a", 2.0)]);
    assert_eq!(list.to_vec(), vec![rect("a", 1.0)]);
}

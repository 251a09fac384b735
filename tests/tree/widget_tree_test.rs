//! Integration tests for rebuilding widget hierarchies from flat rows.

use datapoint::model::Widget;
use datapoint::tree::{build_widget, build_widgets, TreeError, WidgetRow};
use serde_json::json;

/// Render a widget tree as `id[child, child]` for compact assertions.
fn shape(widget: &Widget) -> String {
    if widget.children.is_empty() {
        return widget.id.clone();
    }
    let children: Vec<String> = widget.children.iter().map(shape).collect();
    format!("{}[{}]", widget.id, children.join(", "))
}

fn rows(edges: &[(&str, Option<&str>)]) -> Vec<WidgetRow> {
    edges.iter().map(|(id, parent)| WidgetRow::new(id, *parent)).collect()
}

#[test]
fn test_rows_in_any_order() {
    // children listed before their parents, as a recursive query may return them
    let rows = rows(&[
        ("chart", Some("panel")),
        ("legend", Some("chart")),
        ("panel", Some("page")),
        ("page", None),
        ("table", Some("panel")),
        ("footer", Some("page")),
    ]);

    let roots = build_widgets(rows).unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(shape(&roots[0]), "page[panel[chart[legend], table], footer]");
    assert_eq!(roots[0].count(), 6);
}

#[test]
fn test_forest_keeps_root_order() {
    let rows = rows(&[
        ("b", None),
        ("a", None),
        ("b1", Some("b")),
        ("c", None),
        ("a1", Some("a")),
    ]);

    let shapes: Vec<String> = build_widgets(rows).unwrap().iter().map(shape).collect();
    assert_eq!(shapes, vec!["b[b1]", "a[a1]", "c"]);
}

#[test]
fn test_empty_input() {
    assert!(build_widgets(Vec::new()).unwrap().is_empty());
}

#[test]
fn test_subtree_from_recursive_query() {
    // a recursive query started at "panel" returns panel and its descendants;
    // panel still names its own parent, which is absent from the rows
    let rows = rows(&[
        ("panel", Some("page")),
        ("chart", Some("panel")),
        ("table", Some("panel")),
        ("cell", Some("table")),
    ]);

    let panel = build_widget(rows, "panel").unwrap();
    assert_eq!(shape(&panel), "panel[chart, table[cell]]");
}

#[test]
fn test_subtree_not_found() {
    let err = build_widget(rows(&[("a", None)]), "z").unwrap_err();
    assert_eq!(err, TreeError::NotFound("z".into()));
    assert_eq!(err.to_string(), "entity not found: z");
}

#[test]
fn test_dangling_parent_is_an_error() {
    let err = build_widgets(rows(&[("root", None), ("orphan", Some("gone"))])).unwrap_err();
    assert_eq!(
        err,
        TreeError::DanglingParent {
            id: "orphan".into(),
            parent: "gone".into()
        }
    );
    assert_eq!(err.to_string(), "node orphan references missing parent gone");
}

#[test]
fn test_cycle_is_an_error() {
    let err = build_widgets(rows(&[("root", None), ("x", Some("y")), ("y", Some("x"))])).unwrap_err();
    assert!(matches!(err, TreeError::Cycle(_)), "{:?}", err);
}

#[test]
fn test_duplicate_rows_keep_first() {
    let mut input = rows(&[("a", None), ("b", Some("a"))]);
    let mut dup = WidgetRow::new("b", Some("a"));
    dup.name = "second".into();
    input.push(dup);

    let roots = build_widgets(input).unwrap();
    assert_eq!(shape(&roots[0]), "a[b]");
    assert_eq!(roots[0].children[0].name, "b");
}

#[test]
fn test_serialized_shape() {
    let mut chart = WidgetRow::new("chart", Some("page"));
    chart.name = "Revenue".into();
    chart.kind = "line".into();
    chart.props = Some(json!({"color": "blue"}));
    chart.query = Some(json!({"type": "select"}));
    let mut page = WidgetRow::new("page", None);
    page.kind = "container".into();

    let roots = build_widgets(vec![page, chart]).unwrap();
    assert_eq!(
        serde_json::to_value(&roots).unwrap(),
        json!([{
            "id": "page",
            "name": "page",
            "type": "container",
            "children": [{
                "id": "chart",
                "name": "Revenue",
                "type": "line",
                "children": [],
                "props": {"color": "blue"},
                "query": {"type": "select"}
            }],
            "props": null,
            "query": null
        }])
    );
}

//! Integration tests for rebuilding dashboards from placement rows.

use datapoint::model::{Dashboard, Layout};
use datapoint::tree::{
    build_dashboard, build_dashboards, is_sentinel, DashboardRow, TreeError, WidgetRow, SENTINEL_ID,
};
use serde_json::json;

fn placed(dashboard: &str, widget: &str, layout: (u32, u32, u32, u32)) -> DashboardRow {
    let (x, y, w, h) = layout;
    DashboardRow {
        dashboard_id: dashboard.to_string(),
        dashboard_name: dashboard.to_uppercase(),
        widget: WidgetRow::new(widget, None),
        layout: Layout { x, y, w, h },
    }
}

fn nested(dashboard: &str, widget: &str, parent: &str) -> DashboardRow {
    DashboardRow {
        dashboard_id: dashboard.to_string(),
        dashboard_name: dashboard.to_uppercase(),
        widget: WidgetRow::new(widget, Some(parent)),
        layout: Layout::default(),
    }
}

fn empty(dashboard: &str) -> DashboardRow {
    DashboardRow {
        widget: WidgetRow::new(SENTINEL_ID, None),
        ..placed(dashboard, SENTINEL_ID, (0, 0, 0, 0))
    }
}

fn placements(dashboard: &Dashboard) -> Vec<(&str, usize, Layout)> {
    dashboard
        .widgets
        .iter()
        .map(|p| (p.widget.id.as_str(), p.widget.count(), p.layout))
        .collect()
}

#[test]
fn test_sentinel_detection() {
    assert!(is_sentinel(SENTINEL_ID));
    assert!(is_sentinel("00000000000000000000000000000000"));
    assert!(!is_sentinel("3f2b7c1e-0000-4000-8000-000000000000"));
    assert!(!is_sentinel(""));
    assert!(!is_sentinel("widget"));
}

#[test]
fn test_dashboards_with_nested_widgets() {
    let rows = vec![
        placed("sales", "kpi", (0, 0, 4, 2)),
        placed("sales", "panel", (4, 0, 8, 6)),
        empty("blank"),
        nested("sales", "chart", "panel"),
        nested("sales", "legend", "chart"),
        placed("ops", "kpi", (0, 0, 2, 2)),
    ];

    let dashboards = build_dashboards(rows).unwrap();
    let ids: Vec<&str> = dashboards.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["sales", "blank", "ops"]);

    let sales = &dashboards[0];
    assert_eq!(sales.name, "SALES");
    assert_eq!(
        placements(sales),
        vec![
            ("kpi", 1, Layout { x: 0, y: 0, w: 4, h: 2 }),
            ("panel", 3, Layout { x: 4, y: 0, w: 8, h: 6 }),
        ]
    );
    assert_eq!(sales.widgets[1].widget.children[0].children[0].id, "legend");

    assert!(dashboards[1].widgets.is_empty());
    assert_eq!(placements(&dashboards[2]), vec![("kpi", 1, Layout { x: 0, y: 0, w: 2, h: 2 })]);
}

#[test]
fn test_single_dashboard() {
    let rows = vec![
        placed("a", "w1", (0, 0, 1, 1)),
        placed("b", "w2", (0, 0, 1, 1)),
        nested("b", "w3", "w2"),
    ];

    let b = build_dashboard(rows.clone(), "b").unwrap();
    assert_eq!(placements(&b), vec![("w2", 2, Layout { x: 0, y: 0, w: 1, h: 1 })]);

    let err = build_dashboard(rows, "c").unwrap_err();
    assert_eq!(err, TreeError::NotFound("c".into()));
}

#[test]
fn test_empty_dashboard_alone() {
    let dashboard = build_dashboard(vec![empty("blank")], "blank").unwrap();
    assert_eq!(dashboard.name, "BLANK");
    assert!(dashboard.widgets.is_empty());
}

#[test]
fn test_serialized_placement_is_flat() {
    let dashboard = build_dashboard(vec![placed("d", "w", (1, 2, 3, 4))], "d").unwrap();
    let json = serde_json::to_value(&dashboard).unwrap();
    assert_eq!(json["id"], "d");
    assert_eq!(json["name"], "D");
    assert_eq!(json["widgets"][0]["id"], "w");
    assert_eq!(json["widgets"][0]["x"], 1);
    assert_eq!(json["widgets"][0]["h"], 4);
    assert_eq!(json["widgets"][0]["children"], json!([]));
}

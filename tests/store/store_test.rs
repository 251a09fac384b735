//! Integration tests for the widget and dashboard store on disk.

use std::path::PathBuf;

use datapoint::model::{Dashboard, DashboardWidget, Layout, Widget};
use datapoint::store::{Store, StoreError};
use serde_json::json;

/// A store file under a fresh directory, removed on drop.
struct TempStore {
    dir: PathBuf,
}

impl TempStore {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("datapoint-store-{}", uuid::Uuid::new_v4()));
        Self { dir }
    }

    fn path(&self) -> PathBuf {
        // nested so that opening has to create the directories
        self.dir.join("data").join("store.db")
    }

    fn open(&self) -> Store {
        Store::open(self.path()).unwrap()
    }
}

impl Drop for TempStore {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn report() -> Widget {
    let mut chart = Widget::new("", "Revenue", "chart");
    chart.props = Some(json!({"color": "blue", "stacked": true}));
    chart.query = Some(json!({"type": "select", "table": {"name": "orders"}}));

    Widget::new("", "Report", "container")
        .with_child(chart)
        .with_child(Widget::new("", "Notes", "text").with_child(Widget::new("", "Footnote", "text")))
}

fn place(widget: &Widget, x: u32) -> DashboardWidget {
    DashboardWidget {
        widget: Widget::new(widget.id.clone(), "", ""),
        layout: Layout { x, y: 0, w: 6, h: 4 },
    }
}

#[test]
fn test_persists_across_reopen() {
    let tmp = TempStore::new();

    let (widget_id, dashboard_id) = {
        let store = tmp.open();
        let widget_id = store.widgets().create(&report()).unwrap();
        let widget = store.widgets().get_one(&widget_id).unwrap();
        let dashboard_id = store
            .dashboards()
            .create(&Dashboard {
                id: String::new(),
                name: "Overview".into(),
                widgets: vec![place(&widget, 0)],
            })
            .unwrap();
        (widget_id, dashboard_id)
    };
    assert!(tmp.path().exists());

    let store = tmp.open();
    let widget = store.widgets().get_one(&widget_id).unwrap();
    assert_eq!(widget.name, "Report");
    assert_eq!(widget.count(), 4);
    assert_eq!(widget.children[0].props, Some(json!({"color": "blue", "stacked": true})));
    assert_eq!(widget.children[0].query.as_ref().unwrap()["table"]["name"], "orders");
    assert_eq!(widget.children[1].props, None);

    let dashboard = store.dashboards().get_one(&dashboard_id).unwrap();
    assert_eq!(dashboard.name, "Overview");
    assert_eq!(dashboard.widgets.len(), 1);
    assert_eq!(dashboard.widgets[0].widget.id, widget_id);
    assert_eq!(dashboard.widgets[0].widget.count(), 4);
    assert_eq!(dashboard.widgets[0].widget.children[0].props, widget.children[0].props);
    assert_eq!(dashboard.widgets[0].layout, Layout { x: 0, y: 0, w: 6, h: 4 });
}

#[test]
fn test_get_all_lists_roots_only() {
    let tmp = TempStore::new();
    let store = tmp.open();

    let first = store.widgets().create(&report()).unwrap();
    let second = store.widgets().create(&Widget::new("", "Solo", "kpi")).unwrap();

    let mut roots = store.widgets().get_all().unwrap();
    roots.sort_by_key(|w| w.count());
    let ids: Vec<&str> = roots.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);

    // a nested widget can be fetched on its own
    let notes_id = roots[1].children[1].id.clone();
    let notes = store.widgets().get_one(&notes_id).unwrap();
    assert_eq!(notes.name, "Notes");
    assert_eq!(notes.children.len(), 1);
}

#[test]
fn test_edit_tree() {
    let tmp = TempStore::new();
    let store = tmp.open();
    let id = store.widgets().create(&report()).unwrap();

    let mut widget = store.widgets().get_one(&id).unwrap();
    widget.name = "Quarterly".into();
    // drop "Notes" (and its footnote), rename the chart, add a table
    widget.children.truncate(1);
    widget.children[0].name = "Margin".into();
    widget.children.push(Widget::new("", "Breakdown", "table"));
    store.widgets().edit(&widget).unwrap();

    let edited = store.widgets().get_one(&id).unwrap();
    assert_eq!(edited.name, "Quarterly");
    assert_eq!(edited.count(), 3);
    let names: Vec<&str> = edited.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Margin", "Breakdown"]);
    assert_eq!(edited.children[0].id, widget.children[0].id);

    // the dropped subtree is gone, not orphaned as new roots
    assert_eq!(store.widgets().get_all().unwrap().len(), 1);
}

#[test]
fn test_widget_delete_removes_placements() {
    let tmp = TempStore::new();
    let store = tmp.open();

    let kept = store.widgets().create(&Widget::new("", "Kept", "kpi")).unwrap();
    let doomed = store.widgets().create(&report()).unwrap();
    let kept_w = store.widgets().get_one(&kept).unwrap();
    let doomed_w = store.widgets().get_one(&doomed).unwrap();

    let dashboard_id = store
        .dashboards()
        .create(&Dashboard {
            id: String::new(),
            name: "Board".into(),
            widgets: vec![place(&kept_w, 0), place(&doomed_w, 6)],
        })
        .unwrap();
    assert_eq!(store.dashboards().get_one(&dashboard_id).unwrap().widgets.len(), 2);

    store.widgets().delete(&doomed).unwrap();
    let dashboard = store.dashboards().get_one(&dashboard_id).unwrap();
    assert_eq!(dashboard.widgets.len(), 1);
    assert_eq!(dashboard.widgets[0].widget.id, kept);

    assert!(matches!(
        store.widgets().get_one(&doomed),
        Err(StoreError::NotFound(ref id)) if *id == doomed
    ));
}

#[test]
fn test_dashboard_lifecycle() {
    let tmp = TempStore::new();
    let store = tmp.open();

    let widget_id = store.widgets().create(&Widget::new("", "Tile", "kpi")).unwrap();
    let widget = store.widgets().get_one(&widget_id).unwrap();

    let empty_id = store
        .dashboards()
        .create(&Dashboard::new("", "Empty"))
        .unwrap();
    let board_id = store
        .dashboards()
        .create(&Dashboard {
            id: String::new(),
            name: "Board".into(),
            widgets: vec![place(&widget, 0)],
        })
        .unwrap();

    let all = store.dashboards().get_all().unwrap();
    assert_eq!(all.len(), 2);
    let empty = all.iter().find(|d| d.id == empty_id).unwrap();
    assert!(empty.widgets.is_empty());

    let mut board = store.dashboards().get_one(&board_id).unwrap();
    board.name = "Renamed".into();
    board.widgets[0].layout = Layout { x: 3, y: 3, w: 1, h: 1 };
    store.dashboards().edit(&board).unwrap();

    let board = store.dashboards().get_one(&board_id).unwrap();
    assert_eq!(board.name, "Renamed");
    assert_eq!(board.widgets[0].layout, Layout { x: 3, y: 3, w: 1, h: 1 });

    store.dashboards().delete(&board_id).unwrap();
    assert!(matches!(
        store.dashboards().get_one(&board_id),
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.dashboards().delete(&board_id),
        Err(StoreError::NotFound(_))
    ));
    // widgets outlive their dashboards
    assert_eq!(store.widgets().get_one(&widget_id).unwrap().name, "Tile");
}

//! Widget hierarchies from flat widget rows.

use super::{TreeBuilder, TreeResult};
use crate::model::Widget;

/// One widget as returned by a flat or recursive widget query.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetRow {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub props: Option<serde_json::Value>,
    pub query: Option<serde_json::Value>,
    pub parent_id: Option<String>,
}

impl WidgetRow {
    pub fn new(id: &str, parent_id: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind: String::new(),
            props: None,
            query: None,
            parent_id: parent_id.map(String::from),
        }
    }

    /// Widget for this row, without children.
    pub fn into_widget(self) -> Widget {
        Widget {
            id: self.id,
            name: self.name,
            kind: self.kind,
            children: Vec::new(),
            props: self.props,
            query: self.query,
        }
    }
}

pub(crate) fn attach(mut widget: Widget, children: Vec<Widget>) -> Widget {
    widget.children = children;
    widget
}

/// Rebuild every root widget with its descendants.
pub fn build_widgets(rows: impl IntoIterator<Item = WidgetRow>) -> TreeResult<Vec<Widget>> {
    let mut builder = TreeBuilder::new();
    for row in rows {
        let id = row.id.clone();
        let parent = row.parent_id.clone();
        builder.insert(id, parent, row.into_widget());
    }
    builder.link()?.into_roots(attach)
}

/// Rebuild the subtree rooted at `id`.
///
/// The row for `id` is the root even when it has a parent, so the output of
/// a recursive query started from a nested widget links cleanly.
pub fn build_widget(rows: impl IntoIterator<Item = WidgetRow>, id: &str) -> TreeResult<Widget> {
    let mut builder = TreeBuilder::new();
    for row in rows {
        let parent = if row.id == id {
            None
        } else {
            row.parent_id.clone()
        };
        builder.insert(row.id.clone(), parent, row.into_widget());
    }
    builder.link()?.into_subtree(id, attach)
}

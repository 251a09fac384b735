//! Dashboards from flat placement rows.
//!
//! A dashboard query yields one row per (dashboard, widget) pair: placed
//! widgets carry their layout, nested widgets name their parent. A
//! dashboard without widgets still yields one row whose widget id is
//! [`SENTINEL_ID`].

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::widget::{attach, WidgetRow};
use super::{TreeBuilder, TreeError, TreeResult};
use crate::model::{Dashboard, DashboardWidget, Layout, Widget};

/// Widget id standing in for "no widget" in an outer-joined dashboard row.
pub const SENTINEL_ID: &str = "00000000-0000-0000-0000-000000000000";

pub fn is_sentinel(id: &str) -> bool {
    Uuid::parse_str(id).is_ok_and(|id| id.is_nil())
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRow {
    pub dashboard_id: String,
    pub dashboard_name: String,
    pub widget: WidgetRow,
    pub layout: Layout,
}

struct Group {
    dashboard: Dashboard,
    rows: Vec<(WidgetRow, Layout)>,
}

/// Rebuild every dashboard, in the order each first appears.
pub fn build_dashboards(rows: impl IntoIterator<Item = DashboardRow>) -> TreeResult<Vec<Dashboard>> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let slot = match index.get(&row.dashboard_id) {
            Some(&slot) => slot,
            None => {
                index.insert(row.dashboard_id.clone(), groups.len());
                groups.push(Group {
                    dashboard: Dashboard::new(row.dashboard_id, row.dashboard_name),
                    rows: Vec::new(),
                });
                groups.len() - 1
            }
        };
        if !is_sentinel(&row.widget.id) {
            groups[slot].rows.push((row.widget, row.layout));
        }
    }

    groups.into_iter().map(assemble).collect()
}

/// Rebuild the dashboard `id`.
pub fn build_dashboard(
    rows: impl IntoIterator<Item = DashboardRow>,
    id: &str,
) -> TreeResult<Dashboard> {
    build_dashboards(rows.into_iter().filter(|row| row.dashboard_id == id))?
        .into_iter()
        .next()
        .ok_or_else(|| TreeError::NotFound(id.to_string()))
}

fn assemble(group: Group) -> TreeResult<Dashboard> {
    let Group { mut dashboard, rows } = group;

    // a placed widget may itself be nested elsewhere; it is a placement here
    let present: HashSet<String> = rows.iter().map(|(row, _)| row.id.clone()).collect();

    let mut builder = TreeBuilder::new();
    for (row, layout) in rows {
        let parent = row.parent_id.clone().filter(|parent| present.contains(parent));
        builder.insert(row.id.clone(), parent, (row.into_widget(), layout));
    }

    dashboard.widgets = builder
        .link()?
        .into_roots(|(widget, layout), children: Vec<(Widget, Layout)>| {
            let children = children.into_iter().map(|(child, _)| child).collect();
            (attach(widget, children), layout)
        })?
        .into_iter()
        .map(|(widget, layout)| DashboardWidget { widget, layout })
        .collect();

    Ok(dashboard)
}

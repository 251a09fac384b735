use rusqlite::{Connection, Row};
use tracing::debug;

use super::{decode_json, execute, new_id, query, StoreError, StoreResult};
use crate::model::{Dashboard, DashboardWidget, Layout};
use crate::sql::{
    coalesce, col, lit_int, lit_str, param, table_col, Cte, Delete, Expr, ExprExt,
    Insert, Query, SelectExpr, TableRef, Update,
};
use crate::tree::{build_dashboard, build_dashboards, DashboardRow, TreeError, WidgetRow, SENTINEL_ID};

const DASHBOARD: &str = "dashboard";
const PLACEMENT: &str = "dashboard_widget";
const WIDGET: &str = "widget";
const PLACED: &str = "placed";

/// Output columns of the placement CTE, in row order.
const COLUMNS: [&str; 12] = [
    "d_id", "d_name", "w_id", "w_name", "w_type", "parent_id", "props", "query", "x", "y", "w",
    "h",
];

struct StoredRow {
    dashboard_id: String,
    dashboard_name: String,
    id: String,
    name: String,
    kind: String,
    parent_id: Option<String>,
    props: Option<String>,
    query: Option<String>,
    layout: Layout,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            dashboard_id: row.get(0)?,
            dashboard_name: row.get(1)?,
            id: row.get(2)?,
            name: row.get(3)?,
            kind: row.get(4)?,
            parent_id: row.get(5)?,
            props: row.get(6)?,
            query: row.get(7)?,
            layout: Layout {
                x: row.get(8)?,
                y: row.get(9)?,
                w: row.get(10)?,
                h: row.get(11)?,
            },
        })
    }

    fn decode(self) -> StoreResult<DashboardRow> {
        Ok(DashboardRow {
            dashboard_id: self.dashboard_id,
            dashboard_name: self.dashboard_name,
            widget: WidgetRow {
                id: self.id,
                name: self.name,
                kind: self.kind,
                props: decode_json(self.props)?,
                query: decode_json(self.query)?,
                parent_id: self.parent_id,
            },
            layout: self.layout,
        })
    }
}

/// Every dashboard joined to its placements, plus the widgets nested under
/// each placed widget. Dashboards without placements yield one sentinel row.
///
/// ```text
/// WITH RECURSIVE placed AS (
///     dashboard ⟕ dashboard_widget ⟕ widget      -- placements, with layout
///     UNION
///     widget ⋈ placed ON widget.parent_id = placed.w_id   -- nested, zero layout
/// )
/// SELECT d_id, d_name, COALESCE(w_id, nil uuid), ... FROM placed
/// ```
fn placements(dashboard_id: Option<&str>) -> Query {
    let mut anchor = Query::new()
        .select(vec![
            table_col("d", "id").alias("d_id"),
            table_col("d", "name").alias("d_name"),
            table_col("w", "id").alias("w_id"),
            table_col("w", "name").alias("w_name"),
            table_col("w", "type").alias("w_type"),
            table_col("w", "parent_id").alias("parent_id"),
            table_col("w", "props").alias("props"),
            table_col("w", "query").alias("query"),
            table_col("dw", "x").alias("x"),
            table_col("dw", "y").alias("y"),
            table_col("dw", "w").alias("w"),
            table_col("dw", "h").alias("h"),
        ])
        .from(TableRef::new(DASHBOARD).with_alias("d"))
        .left_join(
            TableRef::new(PLACEMENT).with_alias("dw"),
            table_col("dw", "dashboard_id").eq(table_col("d", "id")),
        )
        .left_join(
            TableRef::new(WIDGET).with_alias("w"),
            table_col("w", "id").eq(table_col("dw", "widget_id")),
        );
    if let Some(id) = dashboard_id {
        anchor = anchor.filter(table_col("d", "id").eq(param(id)));
    }

    let nested = Query::new()
        .select(vec![
            SelectExpr::new(table_col("p", "d_id")),
            SelectExpr::new(table_col("p", "d_name")),
            SelectExpr::new(table_col("w", "id")),
            SelectExpr::new(table_col("w", "name")),
            SelectExpr::new(table_col("w", "type")),
            SelectExpr::new(table_col("w", "parent_id")),
            SelectExpr::new(table_col("w", "props")),
            SelectExpr::new(table_col("w", "query")),
            SelectExpr::new(lit_int(0)),
            SelectExpr::new(lit_int(0)),
            SelectExpr::new(lit_int(0)),
            SelectExpr::new(lit_int(0)),
        ])
        .from(TableRef::new(WIDGET).with_alias("w"))
        .inner_join(
            TableRef::new(PLACED).with_alias("p"),
            table_col("p", "w_id").eq(table_col("w", "parent_id")),
        );

    let output: Vec<Expr> = COLUMNS
        .iter()
        .map(|&name| match name {
            "w_id" => coalesce(vec![col(name), lit_str(SENTINEL_ID)]),
            "w_name" | "w_type" => coalesce(vec![col(name), lit_str("")]),
            "x" | "y" | "w" | "h" => coalesce(vec![col(name), lit_int(0)]),
            _ => col(name),
        })
        .collect();

    Query::new()
        .with_cte(Cte::recursive(PLACED, anchor.union(nested)))
        .select(output)
        .from(TableRef::new(PLACED))
}

/// Dashboard persistence. Obtained from [`Store::dashboards`](super::Store::dashboards).
pub struct DashboardRepository<'a> {
    conn: &'a Connection,
}

impl<'a> DashboardRepository<'a> {
    pub(super) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get_all(&self) -> StoreResult<Vec<Dashboard>> {
        let rows = self.load(&placements(None))?;
        Ok(build_dashboards(rows)?)
    }

    pub fn get_one(&self, id: &str) -> StoreResult<Dashboard> {
        let rows = self.load(&placements(Some(id)))?;
        build_dashboard(rows, id).map_err(|err| match err {
            TreeError::NotFound(id) => StoreError::NotFound(id),
            other => other.into(),
        })
    }

    /// Insert `dashboard` and its placements, returning the new id. Placed
    /// widgets must already exist.
    pub fn create(&self, dashboard: &Dashboard) -> StoreResult<String> {
        let id = new_id();
        let insert = Insert::into(DASHBOARD)
            .columns(["id", "name"])
            .values([param(id.as_str()), param(dashboard.name.as_str())]);
        execute(self.conn, &insert)?;
        self.place(&id, &dashboard.widgets)?;
        Ok(id)
    }

    /// Rename `dashboard` and replace all of its placements.
    pub fn edit(&self, dashboard: &Dashboard) -> StoreResult<()> {
        let update = Update::table(DASHBOARD)
            .set("name", param(dashboard.name.as_str()))
            .filter(col("id").eq(param(dashboard.id.as_str())));
        if execute(self.conn, &update)? == 0 {
            return Err(StoreError::NotFound(dashboard.id.clone()));
        }

        let clear =
            Delete::from(PLACEMENT).filter(col("dashboard_id").eq(param(dashboard.id.as_str())));
        let removed = execute(self.conn, &clear)?;
        self.place(&dashboard.id, &dashboard.widgets)?;
        debug!(id = %dashboard.id, removed, placed = dashboard.widgets.len(), "dashboard edited");
        Ok(())
    }

    /// Delete the dashboard `id` and its placements. Widgets are kept.
    pub fn delete(&self, id: &str) -> StoreResult<()> {
        let delete = Delete::from(DASHBOARD).filter(col("id").eq(param(id)));
        match execute(self.conn, &delete)? {
            0 => Err(StoreError::NotFound(id.to_string())),
            _ => Ok(()),
        }
    }

    fn place(&self, dashboard_id: &str, widgets: &[DashboardWidget]) -> StoreResult<()> {
        if widgets.is_empty() {
            return Ok(());
        }
        let insert = widgets.iter().fold(
            Insert::into(PLACEMENT).columns(["dashboard_id", "widget_id", "x", "y", "w", "h"]),
            |insert, placed| {
                let Layout { x, y, w, h } = placed.layout;
                insert.values([
                    param(dashboard_id),
                    param(placed.widget.id.as_str()),
                    param(x),
                    param(y),
                    param(w),
                    param(h),
                ])
            },
        );
        execute(self.conn, &insert)?;
        Ok(())
    }

    fn load(&self, select: &Query) -> StoreResult<Vec<DashboardRow>> {
        query(self.conn, select, StoredRow::from_row)?
            .into_iter()
            .map(StoredRow::decode)
            .collect()
    }
}

use rusqlite::{Connection, Row};
use tracing::debug;

use super::{decode_json, encode_json, execute, new_id, query, StoreError, StoreResult};
use crate::model::{Value, Widget};
use crate::sql::{
    col, param, table_col, Cte, Delete, Expr, ExprExt, Insert, Query, TableRef, Update,
};
use crate::tree::{build_widget, build_widgets, TreeError, WidgetRow};

const TABLE: &str = "widget";
const SUBTREE: &str = "subtree";
const COLUMNS: [&str; 6] = ["id", "name", "type", "props", "query", "parent_id"];

/// Widget rows as stored: JSON columns still text.
struct StoredWidget {
    id: String,
    name: String,
    kind: String,
    props: Option<String>,
    query: Option<String>,
    parent_id: Option<String>,
}

impl StoredWidget {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            props: row.get(3)?,
            query: row.get(4)?,
            parent_id: row.get(5)?,
        })
    }

    fn decode(self) -> StoreResult<WidgetRow> {
        Ok(WidgetRow {
            id: self.id,
            name: self.name,
            kind: self.kind,
            props: decode_json(self.props)?,
            query: decode_json(self.query)?,
            parent_id: self.parent_id,
        })
    }
}

fn select_from(table: &str) -> Query {
    Query::new()
        .select(COLUMNS.iter().map(|c| table_col(table, c)).collect())
        .from(TableRef::new(table))
}

/// Widget persistence. Obtained from [`Store::widgets`](super::Store::widgets).
pub struct WidgetRepository<'a> {
    conn: &'a Connection,
}

impl<'a> WidgetRepository<'a> {
    pub(super) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Every root widget with its subtree.
    pub fn get_all(&self) -> StoreResult<Vec<Widget>> {
        let rows = self.load(&select_from(TABLE))?;
        Ok(build_widgets(rows)?)
    }

    /// The widget `id` with its subtree.
    pub fn get_one(&self, id: &str) -> StoreResult<Widget> {
        let anchor = select_from(TABLE).filter(table_col(TABLE, "id").eq(param(id)));
        let step = select_from(TABLE).inner_join(
            TableRef::new(SUBTREE),
            table_col(TABLE, "parent_id").eq(table_col(SUBTREE, "id")),
        );
        let tree = Query::new()
            .with_cte(Cte::recursive(SUBTREE, anchor.union(step)))
            .select(COLUMNS.iter().map(|c| col(c)).collect())
            .from(TableRef::new(SUBTREE));

        let rows = self.load(&tree)?;
        build_widget(rows, id).map_err(|err| match err {
            TreeError::NotFound(id) => StoreError::NotFound(id),
            other => other.into(),
        })
    }

    /// Insert `widget` and its children, returning the new id. Any ids on
    /// the input are ignored.
    pub fn create(&self, widget: &Widget) -> StoreResult<String> {
        self.insert(widget, None)
    }

    /// Update `widget` in place. Children without an id are created,
    /// children with one are edited, and stored children missing from the
    /// list are deleted.
    pub fn edit(&self, widget: &Widget) -> StoreResult<()> {
        let update = Update::table(TABLE)
            .set("name", param(widget.name.as_str()))
            .set("type", param(widget.kind.as_str()))
            .set("props", encode_json(widget.props.as_ref())?)
            .set("query", encode_json(widget.query.as_ref())?)
            .filter(col("id").eq(param(widget.id.as_str())));
        if execute(self.conn, &update)? == 0 {
            return Err(StoreError::NotFound(widget.id.clone()));
        }

        let mut kept = Vec::with_capacity(widget.children.len());
        for child in &widget.children {
            if child.id.is_empty() {
                kept.push(self.insert(child, Some(&widget.id))?);
            } else {
                self.edit(child)?;
                kept.push(child.id.clone());
            }
        }

        let kept = kept.into_iter().map(Value::from).map(Expr::Param).collect();
        let stale = Delete::from(TABLE).filter(
            col("parent_id")
                .eq(param(widget.id.as_str()))
                .and(col("id").not_in_list(kept)),
        );
        let removed = execute(self.conn, &stale)?;
        debug!(id = %widget.id, removed, "widget edited");
        Ok(())
    }

    /// Delete the widget `id` and, by cascade, its subtree and placements.
    pub fn delete(&self, id: &str) -> StoreResult<()> {
        let delete = Delete::from(TABLE).filter(col("id").eq(param(id)));
        match execute(self.conn, &delete)? {
            0 => Err(StoreError::NotFound(id.to_string())),
            _ => Ok(()),
        }
    }

    fn insert(&self, widget: &Widget, parent_id: Option<&str>) -> StoreResult<String> {
        let id = new_id();
        let values: Vec<Expr> = vec![
            param(id.as_str()),
            param(widget.name.as_str()),
            param(widget.kind.as_str()),
            encode_json(widget.props.as_ref())?.into(),
            encode_json(widget.query.as_ref())?.into(),
            param(Value::from(parent_id)),
        ];
        let insert = Insert::into(TABLE).columns(COLUMNS).values(values);
        execute(self.conn, &insert)?;

        for child in &widget.children {
            self.insert(child, Some(&id))?;
        }
        Ok(id)
    }

    fn load(&self, select: &Query) -> StoreResult<Vec<WidgetRow>> {
        query(self.conn, select, StoredWidget::from_row)?
            .into_iter()
            .map(StoredWidget::decode)
            .collect()
    }
}

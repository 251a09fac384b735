//! SQLite-backed store for widgets and dashboards.
//!
//! # Schema
//!
//! ```text
//! widget            (id, name, type, props, query, parent_id → widget)
//! dashboard         (id, name)
//! dashboard_widget  (dashboard_id → dashboard, widget_id → widget, x, y, w, h)
//! ```
//!
//! Every reference cascades on delete. Ids are UUID v4 strings and the
//! JSON columns (`props`, `query`) are stored as text.
//!
//! Multi-row writes are not wrapped in a transaction: a failure halfway
//! through a tree leaves the rows written so far in place.

mod dashboard;
mod widget;

pub use dashboard::DashboardRepository;
pub use widget::WidgetRepository;

use std::path::Path;

use rusqlite::{params_from_iter, Connection, Row};
use tracing::debug;

use crate::sql::{Dialect, ToTokens};
use crate::tree::TreeError;

/// Bump when the schema below changes.
const STORE_VERSION: i32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("entity not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Widget and dashboard store.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.init()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init()?;
        Ok(store)
    }

    pub fn widgets(&self) -> WidgetRepository<'_> {
        WidgetRepository::new(&self.conn)
    }

    pub fn dashboards(&self) -> DashboardRepository<'_> {
        DashboardRepository::new(&self.conn)
    }

    fn init(&self) -> StoreResult<()> {
        // foreign keys are off by default, per connection
        self.conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS widget (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                props TEXT,
                query TEXT,
                parent_id TEXT REFERENCES widget (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS dashboard (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dashboard_widget (
                dashboard_id TEXT NOT NULL REFERENCES dashboard (id) ON DELETE CASCADE,
                widget_id TEXT NOT NULL REFERENCES widget (id) ON DELETE CASCADE,
                x INTEGER NOT NULL DEFAULT 0,
                y INTEGER NOT NULL DEFAULT 0,
                w INTEGER NOT NULL DEFAULT 0,
                h INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS widget_parent ON widget (parent_id);
            CREATE INDEX IF NOT EXISTS dashboard_widget_dashboard ON dashboard_widget (dashboard_id);
            ",
        )?;
        self.conn
            .pragma_update(None, "user_version", STORE_VERSION)?;
        Ok(())
    }
}

/// Run a statement built with the SQL builder. Returns the affected row count.
pub(crate) fn execute(conn: &Connection, statement: &impl ToTokens) -> StoreResult<usize> {
    let (sql, params) = statement.render(Dialect::Sqlite);
    debug!(sql = %sql, params = params.len(), "store statement");
    Ok(conn.execute(&sql, params_from_iter(params.iter()))?)
}

/// Run a query built with the SQL builder, mapping each row.
pub(crate) fn query<T>(
    conn: &Connection,
    select: &impl ToTokens,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> StoreResult<Vec<T>> {
    let (sql, params) = select.render(Dialect::Sqlite);
    debug!(sql = %sql, params = params.len(), "store query");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), map)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// JSON column to stored text.
pub(crate) fn encode_json(value: Option<&serde_json::Value>) -> StoreResult<crate::model::Value> {
    Ok(match value {
        Some(value) => crate::model::Value::String(serde_json::to_string(value)?),
        None => crate::model::Value::Null,
    })
}

pub(crate) fn decode_json(text: Option<String>) -> StoreResult<Option<serde_json::Value>> {
    Ok(text.map(|t| serde_json::from_str(&t)).transpose()?)
}

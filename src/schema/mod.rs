//! Schema model and lookup.
//!
//! Tables and columns as reported by a source backend, the [`SchemaLookup`]
//! seam the compiler uses for primary-key discovery, and a static
//! [`Catalog`] for compiling without a live connection.

mod introspect;
mod types;

pub use introspect::{introspect_table, introspect_tables};
pub use types::SemanticType;

use serde::{Deserialize, Serialize};

/// Errors raised while reading or looking up schema metadata.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("table not exists: {0}")]
    TableNotFound(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// A column of a source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: SemanticType,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "isPKey", default)]
    pub is_pkey: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: SemanticType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            is_pkey: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_pkey = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A source table with its ordered columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    /// First column flagged as part of the primary key.
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_pkey)
    }
}

/// Resolves a table by name.
pub trait SchemaLookup {
    fn table(&self, name: &str) -> SchemaResult<Table>;
}

impl SchemaLookup for rusqlite::Connection {
    fn table(&self, name: &str) -> SchemaResult<Table> {
        introspect_table(self, name)
    }
}

/// A fixed set of tables, e.g. loaded from a saved introspection dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    tables: Vec<Table>,
}

impl Catalog {
    pub fn new(tables: Vec<Table>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }
}

impl SchemaLookup for Catalog {
    fn table(&self, name: &str) -> SchemaResult<Table> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| SchemaError::TableNotFound(name.to_string()))
    }
}

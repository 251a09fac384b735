//! Target SQL dialects.
//!
//! Both dialects quote identifiers ANSI-style (`"name"`, embedded quotes
//! doubled) and differ in how bound parameters are written: SQLite takes
//! anonymous `?` placeholders, PostgreSQL numbers them `$1, $2, ...`.

use std::fmt;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// SQLite, the live backend.
    #[default]
    Sqlite,
    /// PostgreSQL, rendering only.
    Postgres,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }

    /// Quote a table, column or alias name.
    pub fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quote a string literal written into the statement text.
    pub fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    /// Placeholder for the bound parameter at `position` (1-based).
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${position}"),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

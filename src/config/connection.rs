//! How to reach one data source.

use std::str::FromStr;

use crate::sql::Dialect;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("unknown driver: {0}. Supported: sqlite")]
    UnsupportedDriver(String),
}

/// Backend behind a source. Only SQLite can be opened today; Postgres
/// output exists at the SQL level alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Sqlite,
}

impl FromStr for Driver {
    type Err = ConnectionError;

    /// Case-insensitive; `sqlite3` is accepted as an alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.to_lowercase();
        match name.as_str() {
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            _ => Err(ConnectionError::UnsupportedDriver(name)),
        }
    }
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Sqlite => "sqlite",
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Driver::Sqlite => Dialect::Sqlite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub driver: Driver,
    /// File path; empty or `:memory:` means a private in-memory database.
    pub path: String,
}

impl ConnectionConfig {
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            driver: Driver::Sqlite,
            path: path.into(),
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self.path.as_str(), "" | ":memory:")
    }

    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    pub fn open(&self) -> rusqlite::Result<rusqlite::Connection> {
        match self.driver {
            Driver::Sqlite if self.is_memory() => rusqlite::Connection::open_in_memory(),
            Driver::Sqlite => rusqlite::Connection::open(&self.path),
        }
    }
}

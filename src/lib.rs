//! # Datapoint
//!
//! Compiles structured query models to SQL, runs them against registered
//! sources, and rebuilds widget and dashboard trees from flat rows.
//!
//! ## Pipeline
//!
//! ```text
//! query JSON                 { type, table, columns, where, orderBy, ... }
//!   -> model::Query          TableNode tree, QColumns, filters
//!   -> compile::Compiled     sql::Query / Insert / Update / Delete + rules
//!   -> executor              run on a source from the registry
//!   -> QueryResponse         { data: { rules, data, total }, rawSql }
//! ```
//!
//! Widgets and dashboards live in the [`store`]; their recursive queries
//! are turned back into trees by [`tree`].

pub mod compile;
pub mod config;
pub mod executor;
pub mod logging;
pub mod model;
pub mod schema;
pub mod service;
pub mod source;
pub mod sql;
pub mod store;
pub mod tree;

/// The types most callers need.
pub mod prelude {
    pub use crate::compile::{CompileError, Compiled, Compiler, Statement};
    pub use crate::config::{ConnectionConfig, Settings};
    pub use crate::executor::{Database, QueryError, QueryResponse, SelectData};
    pub use crate::model::{
        AggregateFunc, Dashboard, DashboardWidget, JoinKind, Layout, QColumn, Query, QueryKind,
        SourceQuery, TableKey, TableNode, Value, Widget,
    };
    pub use crate::schema::{Catalog, Column, SchemaLookup, SemanticType, Table};
    pub use crate::service::QueryService;
    pub use crate::source::{SourceRegistry, Sources};
    pub use crate::sql::Dialect;
    pub use crate::store::Store;
}

pub use compile::Compiler;
pub use executor::{Database, QueryResponse};
pub use model::Query;
pub use sql::Dialect;

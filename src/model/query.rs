//! Query model: a relational operation described as data.
//!
//! ```json
//! {
//!   "type": "select",
//!   "table": {
//!     "name": "orders", "increment": 0,
//!     "next": [{
//!       "name": "customers", "increment": 0,
//!       "rule": { "type": "left", "conditions": [
//!         { "columns": [{ "name": "customer_id" }, { "name": "id" }], "operator": "=" }
//!       ]}
//!     }]
//!   },
//!   "columns": [
//!     { "name": "id", "tableKey": { "name": "orders" }, "payload": { "metaKey": "id" } },
//!     { "name": "total", "tableKey": { "name": "orders" }, "func": "sum" }
//!   ],
//!   "limit": 10
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::Value;
use crate::schema::Column;

/// Rejected names for the closed vocabularies of the query model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KindError {
    #[error("unknown operation kind: {0}")]
    Operation(String),

    #[error("unknown join kind: {0}")]
    Join(String),

    #[error("unknown aggregate function: {0}")]
    Aggregate(String),
}

// =============================================================================
// Operation kind
// =============================================================================

/// Statement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl FromStr for QueryKind {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "select" => Ok(QueryKind::Select),
            "insert" => Ok(QueryKind::Insert),
            "update" => Ok(QueryKind::Update),
            "delete" => Ok(QueryKind::Delete),
            other => Err(KindError::Operation(other.to_string())),
        }
    }
}

impl TryFrom<String> for QueryKind {
    type Error = KindError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// =============================================================================
// Join kind
// =============================================================================

/// Join kind between a table node and its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum JoinKind {
    /// Accepted as `inner` or `join`.
    Inner,
    Left,
    Right,
}

impl FromStr for JoinKind {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inner" | "join" => Ok(JoinKind::Inner),
            "left" => Ok(JoinKind::Left),
            "right" => Ok(JoinKind::Right),
            other => Err(KindError::Join(other.to_string())),
        }
    }
}

impl TryFrom<String> for JoinKind {
    type Error = KindError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Aggregate function applied to a projected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunc {
    Avg,
    Count,
    Sum,
    Max,
    Min,
}

impl AggregateFunc {
    pub const ALL: [AggregateFunc; 5] = [
        AggregateFunc::Avg,
        AggregateFunc::Count,
        AggregateFunc::Sum,
        AggregateFunc::Max,
        AggregateFunc::Min,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunc::Avg => "avg",
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Max => "max",
            AggregateFunc::Min => "min",
        }
    }
}

impl FromStr for AggregateFunc {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggregateFunc::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| KindError::Aggregate(s.to_string()))
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `func` is optional on the wire and an empty string means "none".
fn deserialize_func<'de, D>(deserializer: D) -> Result<Option<AggregateFunc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(name) => name.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// Table tree
// =============================================================================

/// Identifies one occurrence of a table within a query tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableKey {
    pub name: String,
    #[serde(default)]
    pub increment: u8,
}

impl TableKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            increment: 0,
        }
    }

    pub fn with_increment(mut self, increment: u8) -> Self {
        self.increment = increment;
        self
    }

    /// The SQL alias: `name`, or `name_increment` for repeated tables.
    pub fn alias(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.increment == 0 {
            f.write_str(&self.name)
        } else {
            write!(f, "{}_{}", self.name, self.increment)
        }
    }
}

/// A table in the join tree. Every node except the root joins its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableNode {
    #[serde(flatten)]
    pub key: TableKey,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next: Vec<TableNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<JoinRule>,
}

impl TableNode {
    pub fn new(key: TableKey) -> Self {
        Self {
            key,
            next: Vec::new(),
            rule: None,
        }
    }

    pub fn join(mut self, child: TableNode) -> Self {
        self.next.push(child);
        self
    }

    pub fn with_rule(mut self, rule: JoinRule) -> Self {
        self.rule = Some(rule);
        self
    }
}

/// How a child node joins its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRule {
    #[serde(rename = "type")]
    pub kind: JoinKind,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// `parent.columns[0] <operator> child.columns[1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub columns: [QColumn; 2],
    pub operator: String,
}

impl Condition {
    pub fn new(left: &str, operator: &str, right: &str) -> Self {
        Self {
            columns: [QColumn::named(left), QColumn::named(right)],
            operator: operator.into(),
        }
    }
}

// =============================================================================
// Columns
// =============================================================================

/// Open per-column annotations. `metaKey` groups output columns under a
/// logical key; `order` is the sort direction for ORDER BY columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "metaKey", default, skip_serializing_if = "Option::is_none")]
    pub meta_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A column reference inside a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QColumn {
    #[serde(flatten)]
    pub column: Column,
    #[serde(rename = "tableKey", default)]
    pub table_key: TableKey,
    #[serde(
        default,
        deserialize_with = "deserialize_func",
        skip_serializing_if = "Option::is_none"
    )]
    pub func: Option<AggregateFunc>,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl QColumn {
    /// A bare column with no table key, as used in join conditions.
    pub fn named(name: &str) -> Self {
        Self {
            column: Column::new(name, Default::default()),
            table_key: TableKey::default(),
            func: None,
            payload: Payload::default(),
            value: None,
        }
    }

    /// A column of the table occurrence identified by `key`.
    pub fn of(key: &TableKey, name: &str) -> Self {
        Self {
            table_key: key.clone(),
            ..Self::named(name)
        }
    }

    pub fn with_func(mut self, func: AggregateFunc) -> Self {
        self.func = Some(func);
        self
    }

    pub fn with_meta_key(mut self, key: &str) -> Self {
        self.payload.meta_key = Some(key.into());
        self
    }

    pub fn with_order(mut self, order: &str) -> Self {
        self.payload.order = Some(order.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.column.is_pkey = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.column.name
    }

    /// Grouping key for the rules mapping; empty when unset.
    pub fn meta_key(&self) -> &str {
        self.payload.meta_key.as_deref().unwrap_or("")
    }

    /// Output column name: `alias.col`, or `func alias.col` for aggregates.
    pub fn output_name(&self) -> String {
        match self.func {
            Some(func) => format!("{} {}.{}", func, self.table_key, self.column.name),
            None => format!("{}.{}", self.table_key, self.column.name),
        }
    }
}

// =============================================================================
// Query
// =============================================================================

/// A complete query model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(rename = "type")]
    pub kind: QueryKind,
    pub table: TableNode,
    #[serde(default)]
    pub columns: Vec<QColumn>,
    #[serde(rename = "where", default)]
    pub filters: Vec<QColumn>,
    #[serde(rename = "orderBy", default)]
    pub order_by: Vec<QColumn>,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

impl Query {
    pub fn new(kind: QueryKind, table: TableNode) -> Self {
        Self {
            kind,
            table,
            columns: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: 0,
            offset: 0,
        }
    }

    pub fn select(table: TableNode) -> Self {
        Self::new(QueryKind::Select, table)
    }
}

/// A query addressed to a configured source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuery {
    #[serde(rename = "sourceId")]
    pub source_id: String,
    pub query: Query,
}

//! Query model compilation.
//!
//! Turns a [`model::Query`](crate::model::Query) into a SQL statement with
//! bound parameters, plus the rules mapping that tells callers which output
//! columns belong to which logical key. Nothing is executed here.
//!
//! ```text
//! Query model → join tree walk → projection / grouping → Statement → SQL + params
//! ```
//!
//! # Example
//!
//! ```ignore
//! use datapoint::compile::Compiler;
//! use datapoint::schema::Catalog;
//! use datapoint::sql::Dialect;
//!
//! let query = serde_json::from_str(json)?;
//! let catalog: Catalog = serde_json::from_str(tables_json)?;
//! let compiled = Compiler::new(Dialect::Sqlite, &catalog).compile(&query)?;
//! println!("{}", compiled.sql());
//! ```

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::model::{JoinKind, QColumn, Query as QueryModel, QueryKind, TableNode, Value};
use crate::schema::{SchemaError, SchemaLookup};
use crate::sql::{
    self, col, conjunction, func, param, table_col, BinaryOperator, Delete, Dialect, Expr,
    ExprExt, Insert, JoinType, OrderByExpr, SortDir, TableRef, ToTokens, TokenStream, Update,
};

/// Output column carrying the window-function row count.
pub const TOTAL_COLUMN: &str = "$$total";

/// Output columns with this prefix are bookkeeping, never user data.
pub const RESERVED_PREFIX: &str = "$$";

/// Output column carrying the root table's primary key.
pub const ROOT_ID_COLUMN: &str = "$root_id";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during compilation.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("table {0} has no join rule")]
    MissingJoinRule(String),

    #[error("join rule for table {0} has no conditions")]
    EmptyJoinCondition(String),

    #[error("unsupported join operator: {0}")]
    UnsupportedOperator(String),

    #[error("table alias {0} is used more than once")]
    DuplicateAlias(String),

    #[error("column {column} references unknown table {alias}")]
    UnknownTableKey { alias: String, column: String },

    #[error("invalid value for column {0}: lists are only allowed in filters")]
    InvalidValue(String),

    #[error("{0} needs at least one column")]
    NoColumns(&'static str),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// Result Types
// ============================================================================

/// A compiled statement of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(sql::Query),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl ToTokens for Statement {
    fn to_tokens(&self) -> TokenStream {
        match self {
            Statement::Select(q) => q.to_tokens(),
            Statement::Insert(i) => i.to_tokens(),
            Statement::Update(u) => u.to_tokens(),
            Statement::Delete(d) => d.to_tokens(),
        }
    }
}

/// Result of compiling a query model.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub kind: QueryKind,
    pub dialect: Dialect,
    pub statement: Statement,
    /// Logical key → output column names, select only.
    pub rules: BTreeMap<String, Vec<String>>,
}

impl Compiled {
    /// SQL text and the values bound to its placeholders, in order.
    pub fn render(&self) -> (String, Vec<Value>) {
        self.statement.render(self.dialect)
    }

    pub fn sql(&self) -> String {
        self.render().0
    }

    pub fn params(&self) -> Vec<Value> {
        self.render().1
    }
}

// ============================================================================
// Compiler
// ============================================================================

/// Comparison operators accepted in join conditions. Operators outside
/// this list, `LIKE` and `IS` included, fail with `UnsupportedOperator`
/// instead of being copied into the ON clause.
const JOIN_OPERATORS: &[(&str, BinaryOperator)] = &[
    ("=", BinaryOperator::Eq),
    ("<>", BinaryOperator::Ne),
    ("!=", BinaryOperator::Ne),
    ("<", BinaryOperator::Lt),
    (">", BinaryOperator::Gt),
    ("<=", BinaryOperator::Lte),
    (">=", BinaryOperator::Gte),
];

/// Map a join condition operator onto [`JOIN_OPERATORS`].
fn join_operator(op: &str) -> CompileResult<BinaryOperator> {
    JOIN_OPERATORS
        .iter()
        .find(|(name, _)| *name == op)
        .map(|(_, op)| *op)
        .ok_or_else(|| CompileError::UnsupportedOperator(op.to_string()))
}

/// Compiles query models for one dialect, resolving primary keys through
/// a schema lookup.
pub struct Compiler<'a> {
    dialect: Dialect,
    schema: &'a dyn SchemaLookup,
}

impl<'a> Compiler<'a> {
    pub fn new(dialect: Dialect, schema: &'a dyn SchemaLookup) -> Self {
        Self { dialect, schema }
    }

    pub fn compile(&self, query: &QueryModel) -> CompileResult<Compiled> {
        let mut rules = BTreeMap::new();

        let statement = match query.kind {
            QueryKind::Select => Statement::Select(self.compile_select(query, &mut rules)?),
            QueryKind::Insert => Statement::Insert(compile_insert(query)?),
            QueryKind::Update => Statement::Update(compile_update(query)?),
            QueryKind::Delete => Statement::Delete(compile_delete(query)),
        };

        let compiled = Compiled {
            kind: query.kind,
            dialect: self.dialect,
            statement,
            rules,
        };
        debug!(kind = ?compiled.kind, sql = %compiled.sql(), "compiled query");
        Ok(compiled)
    }

    fn compile_select(
        &self,
        query: &QueryModel,
        rules: &mut BTreeMap<String, Vec<String>>,
    ) -> CompileResult<sql::Query> {
        let root = &query.table;
        let root_alias = root.key.alias();

        let mut aliases = HashSet::new();
        collect_aliases(root, &mut aliases)?;

        let mut select = sql::Query::new()
            .from(TableRef::new(&root.key.name).with_alias(&root_alias));
        select = add_joins(select, root)?;

        let mut group_by = Vec::new();
        let mut has_aggregate = false;
        let mut root_pk: Option<String> = None;

        for column in query.filters.iter().chain(&query.order_by) {
            known_alias(&aliases, column)?;
        }

        for column in &query.columns {
            let alias = known_alias(&aliases, column)?;

            let output = column.output_name();
            select.push_select(projected_expr(column).alias(&output));
            rules
                .entry(column.meta_key().to_string())
                .or_insert_with(Vec::new)
                .push(output);

            if column.func.is_some() {
                has_aggregate = true;
            } else {
                group_by.push(projected_expr(column));
                if column.column.is_pkey && alias == root_alias && root_pk.is_none() {
                    root_pk = Some(column.name().to_string());
                }
            }
        }

        if has_aggregate {
            select = select.group_by(group_by);
        } else {
            let pk = match root_pk {
                Some(pk) => Some(pk),
                None => self
                    .schema
                    .table(&root.key.name)?
                    .primary_key()
                    .map(|c| c.name.clone()),
            };
            if let Some(pk) = pk {
                select.push_select(table_col(&root_alias, &pk).alias(ROOT_ID_COLUMN));
            }
        }

        if !query.order_by.is_empty() {
            select = select.order_by(query.order_by.iter().map(order_expr).collect());
        }

        for column in &query.filters {
            if let Some(predicate) =
                filter_predicate(table_col(&column.table_key.alias(), column.name()), column)
            {
                select = select.filter(predicate);
            }
        }

        if query.limit != 0 {
            select = select.limit(query.limit).offset(query.offset);
        }

        Ok(select)
    }
}

/// Walk the tree pre-order, rejecting repeated aliases.
fn collect_aliases(node: &TableNode, seen: &mut HashSet<String>) -> CompileResult<()> {
    let alias = node.key.alias();
    if !seen.insert(alias.clone()) {
        return Err(CompileError::DuplicateAlias(alias));
    }
    for child in &node.next {
        collect_aliases(child, seen)?;
    }
    Ok(())
}

/// The column's table alias, which must belong to the join tree.
fn known_alias(aliases: &HashSet<String>, column: &QColumn) -> CompileResult<String> {
    let alias = column.table_key.alias();
    if aliases.contains(&alias) {
        Ok(alias)
    } else {
        Err(CompileError::UnknownTableKey {
            alias,
            column: column.name().to_string(),
        })
    }
}

/// Emit one join per child, depth-first, pre-order.
fn add_joins(mut select: sql::Query, parent: &TableNode) -> CompileResult<sql::Query> {
    let parent_alias = parent.key.alias();

    for child in &parent.next {
        let child_alias = child.key.alias();
        let rule = child
            .rule
            .as_ref()
            .ok_or_else(|| CompileError::MissingJoinRule(child_alias.clone()))?;

        let predicates = rule
            .conditions
            .iter()
            .map(|condition| {
                let [left, right] = &condition.columns;
                Ok(table_col(&parent_alias, left.name()).binary(
                    join_operator(&condition.operator)?,
                    table_col(&child_alias, right.name()),
                ))
            })
            .collect::<CompileResult<Vec<_>>>()?;
        let on = conjunction(predicates)
            .ok_or_else(|| CompileError::EmptyJoinCondition(child_alias.clone()))?;

        let join_type = match rule.kind {
            JoinKind::Inner => JoinType::Inner,
            JoinKind::Left => JoinType::Left,
            JoinKind::Right => JoinType::Right,
        };
        select = select.join(
            join_type,
            TableRef::new(&child.key.name).with_alias(&child_alias),
            on,
        );
        select = add_joins(select, child)?;
    }

    Ok(select)
}

/// `"alias"."col"`, wrapped in the aggregate when one is set.
fn projected_expr(column: &QColumn) -> Expr {
    let expr = table_col(&column.table_key.alias(), column.name());
    match column.func {
        Some(f) => func(f.as_str(), vec![expr]),
        None => expr,
    }
}

fn order_expr(column: &QColumn) -> OrderByExpr {
    let dir = match column.payload.order.as_deref() {
        Some("DESC") => SortDir::Desc,
        _ => SortDir::Asc,
    };
    OrderByExpr::new(projected_expr(column), dir)
}

/// `target = ?` or `target IN (...)`; `None` when the column has no value.
fn filter_predicate(target: Expr, column: &QColumn) -> Option<Expr> {
    match column.value.as_ref()? {
        Value::List(items) => Some(target.in_list(items.iter().cloned().map(Expr::Param).collect())),
        value => Some(target.eq(param(value.clone()))),
    }
}

/// Scalar value for an INSERT or UPDATE assignment; absent becomes NULL.
fn assigned_value(column: &QColumn) -> CompileResult<Expr> {
    match &column.value {
        Some(Value::List(_)) => Err(CompileError::InvalidValue(column.name().to_string())),
        Some(value) => Ok(param(value.clone())),
        None => Ok(param(Value::Null)),
    }
}

fn compile_insert(query: &QueryModel) -> CompileResult<Insert> {
    if query.columns.is_empty() {
        return Err(CompileError::NoColumns("insert"));
    }

    let values = query
        .columns
        .iter()
        .map(assigned_value)
        .collect::<CompileResult<Vec<_>>>()?;

    Ok(Insert::into(query.table.key.name.as_str())
        .columns(query.columns.iter().map(|c| c.name().to_string()))
        .values(values))
}

fn compile_update(query: &QueryModel) -> CompileResult<Update> {
    if query.columns.is_empty() {
        return Err(CompileError::NoColumns("update"));
    }

    let mut update = Update::table(query.table.key.name.as_str());
    for column in &query.columns {
        update = update.set(column.name(), assigned_value(column)?);
    }
    for column in &query.filters {
        if let Some(predicate) = filter_predicate(col(column.name()), column) {
            update = update.filter(predicate);
        }
    }
    Ok(update)
}

fn compile_delete(query: &QueryModel) -> Delete {
    let mut delete = Delete::from(query.table.key.name.as_str());
    for column in &query.filters {
        if let Some(predicate) = filter_predicate(col(column.name()), column) {
            delete = delete.filter(predicate);
        }
    }
    delete
}

// ============================================================================
// Tests
// ============================================================================

//! SELECT builder: joins, grouping, paging, recursive CTEs and UNION.

use std::fmt;

use super::dialect::Dialect;
use super::expr::{conjunction, Expr, Literal};
use super::token::{ToTokens, Token, TokenStream};

/// `<tokens> AS "alias"` when an alias is set.
fn aliased(mut ts: TokenStream, alias: Option<&str>) -> TokenStream {
    if let Some(alias) = alias {
        ts.space().keyword("AS").space().ident(alias);
    }
    ts
}

/// One item of a SELECT list.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

impl ToTokens for SelectExpr {
    fn to_tokens(&self) -> TokenStream {
        aliased(self.expr.to_tokens(), self.alias.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl ToTokens for TableRef {
    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.ident(self.table.as_str());
        aliased(ts, self.alias.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl JoinType {
    fn keyword(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Expr,
}

impl ToTokens for Join {
    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.keyword(self.join_type.keyword())
            .space()
            .append(self.table.to_tokens())
            .space()
            .keyword("ON")
            .space()
            .append(self.on.to_tokens());
        ts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    fn keyword(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: SortDir,
}

impl OrderByExpr {
    pub fn new(expr: Expr, dir: SortDir) -> Self {
        Self { expr, dir }
    }
}

impl ToTokens for OrderByExpr {
    fn to_tokens(&self) -> TokenStream {
        let mut ts = self.expr.to_tokens();
        ts.space().keyword(self.dir.keyword());
        ts
    }
}

/// A named subquery in a WITH clause.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Cte {
    pub name: String,
    pub query: Box<Query>,
    pub recursive: bool,
}

impl Cte {
    pub fn new(name: &str, query: Query) -> Self {
        Self {
            name: name.into(),
            query: Box::new(query),
            recursive: false,
        }
    }

    /// A CTE whose body refers to itself, typically `anchor UNION step`.
    pub fn recursive(name: &str, query: Query) -> Self {
        Self {
            recursive: true,
            ..Self::new(name, query)
        }
    }
}

impl ToTokens for Cte {
    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.ident(self.name.as_str())
            .space()
            .keyword("AS")
            .space()
            .push(Token::LParen)
            .newline(0)
            .append(self.query.to_tokens())
            .newline(0)
            .push(Token::RParen);
        ts
    }
}

/// A SELECT statement.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Query {
    pub with: Vec<Cte>,
    pub select: Vec<SelectExpr>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub filters: Vec<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Queries appended with UNION, emitted without parentheses.
    pub unions: Vec<Query>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cte(mut self, cte: Cte) -> Self {
        self.with.push(cte);
        self
    }

    /// Replace the SELECT list. An empty list selects `*`.
    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = exprs.into_iter().map(Into::into).collect();
        self
    }

    pub fn push_select(&mut self, expr: impl Into<SelectExpr>) {
        self.select.push(expr.into());
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn join(mut self, join_type: JoinType, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join {
            join_type,
            table,
            on,
        });
        self
    }

    pub fn inner_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Inner, table, on)
    }

    pub fn left_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Left, table, on)
    }

    /// Add a WHERE condition, ANDed with any earlier ones.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    pub fn order_by(mut self, exprs: Vec<OrderByExpr>) -> Self {
        self.order_by = exprs;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Only emitted together with a limit.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// `self UNION other`
    pub fn union(mut self, other: Query) -> Self {
        self.unions.push(other);
        self
    }

    fn body_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.keyword("SELECT");
        if self.select.is_empty() {
            ts.space().push(Token::Star);
        } else {
            ts.newline(1).separated(
                self.select.iter().map(ToTokens::to_tokens),
                &[Token::Comma, Token::Newline(1)],
            );
        }

        if let Some(from) = &self.from {
            ts.clause("FROM", from.to_tokens());
        }
        for join in &self.joins {
            ts.newline(0).append(join.to_tokens());
        }
        if let Some(condition) = conjunction(self.filters.iter().cloned()) {
            ts.clause("WHERE", condition.to_tokens());
        }
        if !self.group_by.is_empty() {
            let mut list = TokenStream::new();
            list.comma_list(self.group_by.iter().map(ToTokens::to_tokens));
            ts.clause("GROUP BY", list);
        }
        if !self.order_by.is_empty() {
            let mut list = TokenStream::new();
            list.comma_list(self.order_by.iter().map(ToTokens::to_tokens));
            ts.clause("ORDER BY", list);
        }
        if let Some(limit) = self.limit {
            ts.newline(0).keyword("LIMIT").space().push(Token::Literal(count(limit)));
            if let Some(offset) = self.offset {
                ts.space().keyword("OFFSET").space().push(Token::Literal(count(offset)));
            }
        }

        for other in &self.unions {
            ts.newline(0).keyword("UNION").newline(0).append(other.to_tokens());
        }
        ts
    }
}

fn count(n: u64) -> Literal {
    Literal::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

impl ToTokens for Query {
    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        if !self.with.is_empty() {
            ts.keyword("WITH").space();
            if self.with.iter().any(|cte| cte.recursive) {
                ts.keyword("RECURSIVE").space();
            }
            ts.separated(
                self.with.iter().map(ToTokens::to_tokens),
                &[Token::Comma, Token::Newline(0)],
            )
            .newline(0);
        }
        ts.append(self.body_tokens());
        ts
    }
}

impl fmt::Display for Query {
    /// SQLite rendering.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql(Dialect::default()))
    }
}

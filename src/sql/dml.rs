//! INSERT, UPDATE and DELETE builders.
//!
//! Values are normally [`Expr::Param`], so they reach the database bound
//! rather than spliced into the text.

use super::expr::{conjunction, BinaryOperator, Expr};
use super::token::{ToTokens, Token, TokenStream};

/// ` WHERE a AND b ...`, or nothing for no conditions.
fn where_clause(ts: &mut TokenStream, filters: &[Expr]) {
    if let Some(condition) = conjunction(filters.iter().cloned()) {
        ts.space().keyword("WHERE").space().append(condition.to_tokens());
    }
}

/// `INSERT INTO t (cols) VALUES (row), (row)`
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Expr>>,
}

impl Insert {
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = cols.into_iter().map(Into::into).collect();
        self
    }

    /// Append one row; call repeatedly for a multi-row insert.
    pub fn values(mut self, row: impl IntoIterator<Item = impl Into<Expr>>) -> Self {
        self.rows.push(row.into_iter().map(Into::into).collect());
        self
    }
}

impl ToTokens for Insert {
    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.keyword("INSERT INTO").space().ident(self.table.as_str());

        if !self.columns.is_empty() {
            ts.space().paren_list(self.columns.iter().map(|c| {
                let mut ident = TokenStream::new();
                ident.ident(c.as_str());
                ident
            }));
        }

        if !self.rows.is_empty() {
            ts.space().keyword("VALUES").space().comma_list(self.rows.iter().map(|row| {
                let mut tuple = TokenStream::new();
                tuple.paren_list(row.iter().map(ToTokens::to_tokens));
                tuple
            }));
        }
        ts
    }
}

/// `UPDATE t SET a = x, b = y WHERE ...`
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Update {
    pub table: String,
    pub assignments: Vec<(String, Expr)>,
    pub filters: Vec<Expr>,
}

impl Update {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    /// Add a WHERE condition, ANDed with any earlier ones.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.filters.push(condition);
        self
    }
}

impl ToTokens for Update {
    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.keyword("UPDATE")
            .space()
            .ident(self.table.as_str())
            .space()
            .keyword("SET")
            .space()
            .comma_list(self.assignments.iter().map(|(column, value)| {
                let mut assignment = TokenStream::new();
                assignment
                    .ident(column.as_str())
                    .space()
                    .push(Token::Operator(BinaryOperator::Eq))
                    .space()
                    .append(value.to_tokens());
                assignment
            }));
        where_clause(&mut ts, &self.filters);
        ts
    }
}

/// `DELETE FROM t WHERE ...`
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Delete {
    pub table: String,
    pub filters: Vec<Expr>,
}

impl Delete {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
        }
    }

    /// Add a WHERE condition, ANDed with any earlier ones.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.filters.push(condition);
        self
    }
}

impl ToTokens for Delete {
    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.keyword("DELETE FROM").space().ident(self.table.as_str());
        where_clause(&mut ts, &self.filters);
        ts
    }
}

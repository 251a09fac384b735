//! SQL rendering.
//!
//! Statements are assembled from typed builders and turned into a
//! [`TokenStream`] through [`ToTokens`]; only serialization consults the
//! [`Dialect`], which decides quoting and placeholder syntax.
//!
//! - [`query`]: SELECT with joins, CTEs and UNION
//! - [`dml`]: INSERT, UPDATE, DELETE
//! - [`expr`]: expressions and the fluent helpers that build them

pub mod dialect;
pub mod dml;
pub mod expr;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

pub use dialect::Dialect;
pub use dml::{Delete, Insert, Update};
pub use expr::{
    coalesce, col, conjunction, count_star, func, lit_int, lit_str, param, table_col,
    BinaryOperator, Expr, ExprExt, Literal, WindowExt,
};
pub use query::{
    Cte, Join, JoinType, OrderByExpr, Query, SelectExpr, SortDir, TableRef,
};
pub use token::{ToTokens, Token, TokenStream};

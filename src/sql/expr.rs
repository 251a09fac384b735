//! Expression AST and the fluent helpers that build it.
//!
//! Caller data always enters as [`Expr::Param`]; [`Literal`] is reserved
//! for constants the crate itself writes (sentinels, zero defaults).

use super::query::SelectExpr;
use super::token::{ToTokens, Token, TokenStream};
use crate::model::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `column` or `table.column`
    Column {
        table: Option<String>,
        column: String,
    },
    Literal(Literal),
    Param(Value),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
    /// `expr [NOT] IN (values...)`
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },
    Star,
    /// `f(...) OVER ()`, a window over the whole result.
    Over(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Lte => "<=",
            BinaryOperator::Gte => ">=",
            BinaryOperator::And => "AND",
        }
    }
}

impl ToTokens for Expr {
    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            Expr::Column { table, column } => {
                if let Some(table) = table {
                    ts.ident(table.as_str()).push(Token::Dot);
                }
                ts.ident(column.as_str());
            }
            Expr::Literal(lit) => {
                ts.push(Token::Literal(lit.clone()));
            }
            Expr::Param(value) => {
                ts.push(Token::Param(value.clone()));
            }
            Expr::BinaryOp { left, op, right } => {
                ts.append(left.to_tokens())
                    .space()
                    .push(Token::Operator(*op))
                    .space()
                    .append(right.to_tokens());
            }
            Expr::Function { name, args } => {
                ts.push(Token::Function(name.clone()))
                    .paren_list(args.iter().map(Expr::to_tokens));
            }
            // "x IN ()" is not valid SQL
            Expr::In { values, negated, .. } if values.is_empty() => {
                ts.keyword(if *negated { "TRUE" } else { "FALSE" });
            }
            Expr::In {
                expr,
                values,
                negated,
            } => {
                ts.append(expr.to_tokens()).space();
                if *negated {
                    ts.keyword("NOT").space();
                }
                ts.keyword("IN")
                    .space()
                    .paren_list(values.iter().map(Expr::to_tokens));
            }
            Expr::Star => {
                ts.push(Token::Star);
            }
            Expr::Over(function) => {
                ts.append(function.to_tokens()).space().keyword("OVER ()");
            }
        }
        ts
    }
}

/// Unqualified column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

/// Bound parameter.
pub fn param(value: impl Into<Value>) -> Expr {
    Expr::Param(value.into())
}

pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
    }
}

pub fn count_star() -> Expr {
    func("count", vec![Expr::Star])
}

pub fn coalesce(args: Vec<Expr>) -> Expr {
    func("coalesce", args)
}

pub trait WindowExt: Sized {
    /// Window over the entire result set.
    fn over(self) -> Expr;
}

impl WindowExt for Expr {
    fn over(self) -> Expr {
        Expr::Over(Box::new(self))
    }
}

/// Fluent expression building.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn binary(self, op: BinaryOperator, other: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other.into()),
        }
    }

    fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }

    fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::And, other)
    }

    fn in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated: false,
        }
    }

    fn not_in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated: true,
        }
    }

    /// `self AS "name"` as a select item.
    fn alias(self, name: &str) -> SelectExpr {
        SelectExpr::new(self.into_expr()).with_alias(name)
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Param(v)
    }
}

/// `a AND b AND ...`, or `None` for no conditions.
pub fn conjunction(conditions: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    conditions.into_iter().reduce(|acc, next| acc.and(next))
}

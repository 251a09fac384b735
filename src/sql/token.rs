//! Tokens: the atomic units of SQL output.
//!
//! Builders emit a flat [`TokenStream`] without knowing the dialect; only
//! [`TokenStream::serialize`] does. Caller-supplied values travel as
//! [`Token::Param`] and are never spliced into the text. The same stream
//! yields the statement and, through [`TokenStream::params`], the values
//! for its placeholders in order.

use super::dialect::Dialect;
use super::expr::{BinaryOperator, Literal};
use crate::model::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Reserved word or words, emitted as written.
    Keyword(&'static str),
    Operator(BinaryOperator),
    Comma,
    Dot,
    Star,
    LParen,
    RParen,
    Space,
    /// Line break followed by `depth` levels of indentation.
    Newline(usize),
    /// Identifier, always quoted.
    Ident(String),
    /// Function name, upper-cased.
    Function(String),
    /// Literal written into the statement text.
    Literal(Literal),
    /// Bound parameter, written as the dialect's placeholder.
    Param(Value),
}

/// Anything that renders to SQL.
pub trait ToTokens {
    fn to_tokens(&self) -> TokenStream;

    fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens().serialize(dialect)
    }

    /// SQL text and the values bound to its placeholders, in order.
    fn render(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let tokens = self.to_tokens();
        (tokens.serialize(dialect), tokens.params())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    pub fn keyword(&mut self, word: &'static str) -> &mut Self {
        self.push(Token::Keyword(word))
    }

    pub fn ident(&mut self, name: impl Into<String>) -> &mut Self {
        self.push(Token::Ident(name.into()))
    }

    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }

    pub fn newline(&mut self, depth: usize) -> &mut Self {
        self.push(Token::Newline(depth))
    }

    /// `<keyword> ` followed by `other`, preceded by a line break unless
    /// this is the start of the statement.
    pub fn clause(&mut self, keyword: &'static str, other: TokenStream) -> &mut Self {
        if !self.is_empty() {
            self.newline(0);
        }
        self.keyword(keyword).space().append(other)
    }

    pub fn append(&mut self, other: TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens);
        self
    }

    /// Append `items` with `separator` between them.
    pub fn separated(
        &mut self,
        items: impl IntoIterator<Item = TokenStream>,
        separator: &[Token],
    ) -> &mut Self {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.tokens.extend_from_slice(separator);
            }
            self.append(item);
        }
        self
    }

    /// `a, b, c`
    pub fn comma_list(&mut self, items: impl IntoIterator<Item = TokenStream>) -> &mut Self {
        self.separated(items, &[Token::Comma, Token::Space])
    }

    /// `(a, b, c)`
    pub fn paren_list(&mut self, items: impl IntoIterator<Item = TokenStream>) -> &mut Self {
        self.push(Token::LParen).comma_list(items).push(Token::RParen)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Render for `dialect`, numbering placeholders in order of appearance.
    pub fn serialize(&self, dialect: Dialect) -> String {
        let mut sql = String::new();
        let mut position = 0;
        for token in &self.tokens {
            match token {
                Token::Keyword(word) => sql.push_str(word),
                Token::Operator(op) => sql.push_str(op.as_str()),
                Token::Comma => sql.push(','),
                Token::Dot => sql.push('.'),
                Token::Star => sql.push('*'),
                Token::LParen => sql.push('('),
                Token::RParen => sql.push(')'),
                Token::Space => sql.push(' '),
                Token::Newline(depth) => {
                    sql.push('\n');
                    sql.push_str(&"  ".repeat(*depth));
                }
                Token::Ident(name) => sql.push_str(&dialect.quote_identifier(name)),
                Token::Function(name) => sql.push_str(&name.to_uppercase()),
                Token::Literal(Literal::Int(n)) => sql.push_str(&n.to_string()),
                Token::Literal(Literal::String(s)) => sql.push_str(&dialect.quote_string(s)),
                Token::Param(_) => {
                    position += 1;
                    sql.push_str(&dialect.placeholder(position));
                }
            }
        }
        sql
    }

    /// Values bound to the placeholders, in the order they appear in the text.
    pub fn params(&self) -> Vec<Value> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Param(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ToTokens for TokenStream {
    fn to_tokens(&self) -> TokenStream {
        self.clone()
    }
}

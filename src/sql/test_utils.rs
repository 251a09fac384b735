//! Parses rendered SQL with sqlparser to catch syntax slips in tests.

use sqlparser::dialect::{PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use super::dialect::Dialect;

/// `Err` with the parser message and the offending text when `sql` does
/// not parse for `dialect`.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parsed = match dialect {
        Dialect::Sqlite => Parser::parse_sql(&SQLiteDialect {}, sql),
        Dialect::Postgres => Parser::parse_sql(&PostgreSqlDialect {}, sql),
    };
    parsed
        .map(|_| ())
        .map_err(|err| format!("{dialect} rejected SQL: {err}\n{sql}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_styles_parse() {
        assert!(validate_sql("SELECT \"a\" FROM \"t\" WHERE \"a\" = ?", Dialect::Sqlite).is_ok());
        assert!(validate_sql("SELECT \"a\" FROM \"t\" WHERE \"a\" = $1", Dialect::Postgres).is_ok());
    }

    #[test]
    fn test_rejects_garbage() {
        let err = validate_sql("SELEC * FORM t", Dialect::Postgres).unwrap_err();
        assert!(err.starts_with("postgres rejected SQL"));
    }
}

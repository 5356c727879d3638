//! Test utilities for generated SQL.
//!
//! osquery evaluates queries with SQLite, so generated text is checked
//! against sqlparser's SQLite dialect.

use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

/// Validates that a SQL string parses as SQLite.
///
/// # Example
///
/// ```ignore
/// use crate::sql::test_utils::validate_sql;
///
/// validate_sql(r#"SELECT * FROM users WHERE "uid" = "0""#).unwrap();
/// ```
pub fn validate_sql(sql: &str) -> Result<(), String> {
    Parser::parse_sql(&SQLiteDialect {}, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQLite: {}\nSQL: {}", e, sql))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        validate_sql("SELECT * FROM processes").unwrap();
        validate_sql(r#"SELECT * FROM users WHERE "uid" > "0" and "uid" < "500""#).unwrap();
    }

    #[test]
    fn test_validate_invalid_sql() {
        assert!(validate_sql("SELEC * FORM users").is_err());
    }
}

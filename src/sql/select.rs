//! SELECT statements issued against osquery tables.

/// Whether `name` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// Table names are interpolated into SQL unquoted, so anything else is
/// rejected before a query is built.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `SELECT * FROM <table>`, with ` WHERE <clause>` when one is given.
pub fn build_select(table: &str, where_clause: Option<&str>) -> String {
    match where_clause {
        Some(clause) if !clause.is_empty() => format!("SELECT * FROM {table} WHERE {clause}"),
        _ => format!("SELECT * FROM {table}"),
    }
}

/// Column metadata query for `table`.
pub fn table_info(table: &str) -> String {
    format!("PRAGMA table_info({table});")
}

/// Names of every table registered with osquery.
pub const LIST_TABLES: &str = "SELECT name FROM osquery_registry WHERE registry='table'";

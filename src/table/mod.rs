//! Host-facing table layer.
//!
//! Turns a [`TableSchema`] into a [`TableDefinition`] a host can register,
//! and runs the list and point-lookup queries behind it.
//!
//! # Example
//!
//! ```ignore
//! let schema = describe_table(channel.as_ref(), "users").await?;
//! let table = TableDefinition::build(&schema, &catalog);
//!
//! let input = QualifierInput::rich(
//!     QualifierSet::new().with(Qualifier::new("uid", ">=", 500)),
//! );
//! let rows = list_rows(channel.as_ref(), &table.name, &input, ValueRendering::Quoted).await?;
//! let root = get_row(channel.as_ref(), &table.name, Some("uid = 0")).await?;
//! ```

mod error;

use serde::Serialize;
use tracing::debug;

use crate::bridge::{QueryChannel, Row};
use crate::catalog::DescriptionCatalog;
use crate::metadata::{ColumnType, TableSchema};
use crate::sql::{build_select, is_identifier, QualifierInput, ValueRendering};

pub use error::{TableError, TableResult};

/// A column as exposed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub description: String,
}

/// Everything a host needs to register one osquery table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
    pub name: String,
    pub description: String,
    pub columns: Vec<ColumnSpec>,
    /// Key column for point lookups.
    pub primary_key: Option<String>,
}

impl TableDefinition {
    pub fn build(schema: &TableSchema, catalog: &DescriptionCatalog) -> Self {
        let columns = schema
            .columns
            .iter()
            .map(|column| ColumnSpec {
                name: column.name.clone(),
                column_type: column.column_type(),
                description: catalog.column_description(&schema.name, &column.name),
            })
            .collect();

        Self {
            name: schema.name.clone(),
            description: catalog.table_description(&schema.name),
            columns,
            primary_key: schema.primary_key().map(|c| c.name.clone()),
        }
    }
}

/// Run `SELECT * FROM <table>` with the caller's qualifiers.
pub async fn list_rows(
    channel: &dyn QueryChannel,
    table: &str,
    qualifiers: &QualifierInput,
    rendering: ValueRendering,
) -> TableResult<Vec<Row>> {
    if !is_identifier(table) {
        return Err(TableError::InvalidTableName(table.to_string()));
    }

    let clause = qualifiers.where_clause(rendering)?;
    let sql = build_select(table, clause.as_deref());
    debug!(table, %sql, "listing rows");

    let response = channel.send_query(&sql).await?;
    let rows = response.into_rows()?;

    debug!(table, rows = rows.len(), "listed rows");
    Ok(rows)
}

/// Fetch one row by an equality qualifier such as `"pid = 1"`.
///
/// A malformed qualifier queries the whole table; the first row returned
/// is the answer either way.
pub async fn get_row(
    channel: &dyn QueryChannel,
    table: &str,
    equality: Option<&str>,
) -> TableResult<Row> {
    let input = QualifierInput {
        rich: None,
        equality: equality.map(str::to_string),
    };
    let rows = list_rows(channel, table, &input, ValueRendering::Quoted).await?;

    rows.into_iter().next().ok_or_else(|| TableError::RowNotFound {
        table: table.to_string(),
    })
}

//! Schema introspection over a [`QueryChannel`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{MetadataResult, SchemaError};
use super::provider::SchemaProvider;
use super::types::{ColumnDefinition, SqlType, TableSchema};
use crate::bridge::{QueryChannel, Row};
use crate::sql::select::{is_identifier, table_info, LIST_TABLES};

/// Describe one table with `PRAGMA table_info`.
///
/// The first column is the primary key unless a column carries `pk = 1`;
/// when several do, the last one wins.
pub async fn describe_table(channel: &dyn QueryChannel, table: &str) -> MetadataResult<TableSchema> {
    if !is_identifier(table) {
        return Err(SchemaError::InvalidTableName(table.to_string()));
    }

    let response = channel.send_query(&table_info(table)).await?;
    let rows = response.into_rows().map_err(SchemaError::Parse)?;
    let schema = parse_table_info(table, &rows)?;

    debug!(table, columns = schema.columns.len(), "described table");
    Ok(schema)
}

/// List registered table names.
pub async fn list_tables(channel: &dyn QueryChannel) -> MetadataResult<Vec<String>> {
    let response = channel.send_query(LIST_TABLES).await?;
    let rows = response.into_rows().map_err(SchemaError::Parse)?;

    Ok(rows
        .iter()
        .filter_map(|row| row.get("name").and_then(Value::as_str).map(str::to_string))
        .collect())
}

/// Build a schema from `PRAGMA table_info` rows.
pub fn parse_table_info(table: &str, rows: &[Row]) -> MetadataResult<TableSchema> {
    let mut columns = Vec::with_capacity(rows.len());
    let mut primary_key = None;

    for row in rows {
        let name = row.get("name").and_then(Value::as_str);
        let declared = row.get("type").and_then(Value::as_str);
        let (Some(name), Some(declared)) = (name, declared) else {
            warn!(table, ?row, "skipping column without name or type");
            continue;
        };

        let sql_type = SqlType::parse(declared);
        if sql_type == SqlType::Unknown {
            debug!(table, column = name, declared, "unrecognized column type");
        }
        if row.get("pk").is_some_and(is_pk_marker) {
            primary_key = Some(columns.len());
        }
        columns.push(ColumnDefinition {
            name: name.to_string(),
            sql_type,
            is_primary_key: false,
        });
    }

    if columns.is_empty() {
        return Err(SchemaError::NoColumns(table.to_string()));
    }
    columns[primary_key.unwrap_or(0)].is_primary_key = true;

    Ok(TableSchema {
        name: table.to_string(),
        columns,
    })
}

/// osquery reports every value as text; accept a bare number too.
fn is_pk_marker(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim() == "1",
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// SchemaProvider backed by a shared query channel.
///
/// # Example
///
/// ```ignore
/// let bridge = Arc::new(Bridge::start(&config).await?);
/// let provider = ChannelSchemaProvider::new(bridge);
/// let schema = provider.describe_table("processes").await?;
/// ```
pub struct ChannelSchemaProvider {
    channel: Arc<dyn QueryChannel>,
}

impl ChannelSchemaProvider {
    pub fn new(channel: Arc<dyn QueryChannel>) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &Arc<dyn QueryChannel> {
        &self.channel
    }
}

#[async_trait]
impl SchemaProvider for ChannelSchemaProvider {
    async fn list_tables(&self) -> MetadataResult<Vec<String>> {
        list_tables(self.channel.as_ref()).await
    }

    async fn describe_table(&self, table: &str) -> MetadataResult<TableSchema> {
        describe_table(self.channel.as_ref(), table).await
    }
}

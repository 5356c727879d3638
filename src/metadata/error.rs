//! Schema introspection errors.

use thiserror::Error;

use crate::bridge::BridgeError;

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, SchemaError>;

/// A table's schema could not be determined.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The metadata query itself failed.
    #[error("metadata query failed: {0}")]
    Query(#[from] BridgeError),

    /// The response was not an array of objects.
    #[error("unexpected metadata response: {0}")]
    Parse(#[source] serde_json::Error),

    /// The table name is not a plain identifier.
    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),

    /// The metadata query returned no usable column.
    #[error("table {0} has no columns")]
    NoColumns(String),
}

//! Table query errors.

use thiserror::Error;

use crate::bridge::BridgeError;
use crate::sql::QualifierError;

/// Result type for table queries.
pub type TableResult<T> = Result<T, TableError>;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("query failed: {0}")]
    Query(#[from] BridgeError),

    #[error(transparent)]
    Qualifier(#[from] QualifierError),

    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),

    /// `data` was not an array of row objects.
    #[error("unexpected row payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no row found in {table}")]
    RowNotFound { table: String },
}

//! Column and table schema types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Column type as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlType {
    Text,
    Integer,
    #[serde(rename = "BIGINT")]
    BigInt,
    #[serde(rename = "UNSIGNED_BIGINT")]
    UnsignedBigInt,
    Double,
    Unknown,
}

impl SqlType {
    /// Map a declared type name. Unrecognized names become `Unknown`.
    pub fn parse(declared: &str) -> Self {
        let normalized = declared.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "TEXT" => Self::Text,
            "INTEGER" => Self::Integer,
            "BIGINT" => Self::BigInt,
            "UNSIGNED BIGINT" => Self::UnsignedBigInt,
            "DOUBLE" => Self::Double,
            _ => Self::Unknown,
        }
    }

    /// The semantic type exposed to table consumers.
    pub fn column_type(self) -> ColumnType {
        match self {
            Self::Text => ColumnType::String,
            Self::Integer | Self::BigInt | Self::UnsignedBigInt => ColumnType::Int,
            Self::Double => ColumnType::Double,
            Self::Unknown => ColumnType::Unknown,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::UnsignedBigInt => "UNSIGNED BIGINT",
            Self::Double => "DOUBLE",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Semantic column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    String,
    Int,
    Double,
    Unknown,
}

/// One column of an osquery table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: SqlType,
    pub is_primary_key: bool,
}

impl ColumnDefinition {
    pub fn column_type(&self) -> ColumnType {
        self.sql_type.column_type()
    }
}

/// Columns of one table, with at most one primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableSchema {
    /// The primary key column, if the table has any columns.
    pub fn primary_key(&self) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.is_primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }
}

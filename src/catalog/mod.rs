//! Human-readable table and column descriptions.
//!
//! Loaded from a JSON file in the shape of the published osquery schema:
//!
//! ```json
//! [
//!   {
//!     "name": "processes",
//!     "description": "All running processes on the host system.",
//!     "examples": ["select * from processes where pid = 1"],
//!     "columns": [{"name": "pid", "description": "Process (or thread) ID"}]
//!   }
//! ]
//! ```
//!
//! Missing entries fall back to generated text, so an empty catalog is fine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors loading a description file.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read description file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse description file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    examples: Vec<String>,
    #[serde(default)]
    columns: Vec<ColumnEntry>,
}

#[derive(Debug, Deserialize)]
struct ColumnEntry {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Default)]
struct TableText {
    description: String,
    examples: Vec<String>,
    columns: HashMap<String, String>,
}

/// Descriptions keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct DescriptionCatalog {
    tables: HashMap<String, TableText>,
}

impl DescriptionCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&content).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), tables = catalog.len(), "loaded table descriptions");
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<TableEntry> = serde_json::from_str(json)?;
        let tables = entries
            .into_iter()
            .map(|entry| {
                let text = TableText {
                    description: entry.description,
                    examples: entry.examples,
                    columns: entry
                        .columns
                        .into_iter()
                        .map(|c| (c.name, c.description))
                        .collect(),
                };
                (entry.name, text)
            })
            .collect();

        Ok(Self { tables })
    }

    /// Stored description, or `"osquery table: <name>"`.
    pub fn table_description(&self, table: &str) -> String {
        match self.tables.get(table) {
            Some(text) if !text.description.is_empty() => text.description.clone(),
            _ => format!("osquery table: {table}"),
        }
    }

    /// Stored description, or an empty string.
    pub fn column_description(&self, table: &str, column: &str) -> String {
        self.tables
            .get(table)
            .and_then(|text| text.columns.get(column))
            .cloned()
            .unwrap_or_default()
    }

    /// Example queries for a table.
    pub fn examples(&self, table: &str) -> &[String] {
        self.tables
            .get(table)
            .map(|text| text.examples.as_slice())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

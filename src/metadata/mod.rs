//! Table metadata module.
//!
//! Discovers osquery tables and their columns through the same query
//! channel used for row queries.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      SchemaProvider                             │
//! │  - list_tables()     SELECT name FROM osquery_registry ...      │
//! │  - describe_table()  PRAGMA table_info(<table>);                │
//! │  - describe_tables() one result per table                       │
//! └─────────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      QueryChannel                               │
//! │              (JSON lines over a pty)                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod error;
mod introspect;
mod provider;
mod types;

pub use error::{MetadataResult, SchemaError};
pub use introspect::{describe_table, list_tables, parse_table_info, ChannelSchemaProvider};
pub use provider::SchemaProvider;
pub use types::*;

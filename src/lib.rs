//! # osquery-bridge
//!
//! Query osquery through a JSON-speaking extension driven over pseudo-terminals.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │     ConnectionRegistry (named connections, caches)       │
//! └─────────────────────────────────────────────────────────┘
//!            │                              │
//!            ▼ [table]                      ▼ [metadata]
//! ┌───────────────────────────┐  ┌──────────────────────────┐
//! │ TableDefinition, list/get │  │ PRAGMA table_info,       │
//! │ qualifiers → WHERE [sql]  │  │ osquery_registry         │
//! └───────────────────────────┘  └──────────────────────────┘
//!            │                              │
//!            └──────────────┬───────────────┘
//!                           ▼ [bridge]
//! ┌─────────────────────────────────────────────────────────┐
//! │   QueryChannel: {"query": ...} → {"data": ...} lines     │
//! └─────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼ [process]
//! ┌─────────────────────────────────────────────────────────┐
//! │        osqueryi + extension processes on ptys            │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod metadata;
pub mod process;
pub mod registry;
pub mod sql;
pub mod table;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::bridge::{
        Bridge, BridgeConfig, BridgeError, BridgeOptions, QueryChannel, QueryOptions,
        QueryResponse, Row,
    };
    pub use crate::catalog::DescriptionCatalog;
    pub use crate::config::Settings;
    pub use crate::metadata::{ColumnType, SchemaProvider, TableSchema};
    pub use crate::registry::ConnectionRegistry;
    pub use crate::sql::{QualValue, Qualifier, QualifierInput, QualifierSet, ValueRendering};
    pub use crate::table::TableDefinition;
}

//! Bridge to osquery over pseudo-terminals.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Bridge (Tokio)                          │
//! │  - Starts osqueryi, then the JSON extension (+ auxiliaries)     │
//! │  - Readiness probe before accepting queries                     │
//! │  - One request in flight, guarded by an async mutex             │
//! └─────────────────────────────────────────────────────────────────┘
//!          │ pty (never queried)              │ pty
//!          ▼                                  ▼
//! ┌──────────────────┐   extension   ┌──────────────────────────────┐
//! │     osqueryi     │◄──  socket ──►│       JSON extension         │
//! └──────────────────┘               │ {"query": ...} → {"data": …} │
//!                                    └──────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use osquery_bridge::bridge::{Bridge, BridgeConfig, QueryOptions};
//!
//! let bridge = Bridge::start(&BridgeConfig::new(osquery_cmd, extension_cmd)).await?;
//! let rows = bridge.send_query("SELECT pid, name FROM processes").await?.into_rows()?;
//!
//! // Explicit timeout for a single query
//! let options = QueryOptions::new().with_timeout(Duration::from_secs(5));
//! let response = bridge.send_query_with("SELECT * FROM uptime", &options).await?;
//!
//! bridge.stop();
//! ```

mod channel;
mod client;
mod error;
mod options;
pub mod protocol;
mod readiness;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use channel::{EphemeralBridge, QueryChannel};
pub use client::Bridge;
pub use error::{BridgeError, BridgeResult};
pub use options::{
    BridgeConfig, BridgeOptions, ProbePolicy, QueryOptions, Readiness, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SHELL_WARMUP,
};
pub use protocol::{QueryRequest, QueryResponse, Row};

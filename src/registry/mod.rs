//! Named connections and their per-connection caches.
//!
//! Replaces a process-wide bridge singleton: each configured connection gets
//! its own channel, started lazily on first use, and its own memoized table
//! schemas.
//!
//! ```ignore
//! let registry = ConnectionRegistry::from_settings(Settings::load()?)?;
//!
//! let schema = registry.table_schema("default", "processes").await?;
//! let rows = registry
//!     .list_rows("default", "processes", &QualifierInput::equality("pid = 1"))
//!     .await?;
//!
//! registry.close_all();
//! ```

mod error;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::bridge::{Bridge, EphemeralBridge, QueryChannel, Row};
use crate::catalog::DescriptionCatalog;
use crate::config::{BridgeMode, Settings};
use crate::metadata::{self, TableSchema};
use crate::sql::QualifierInput;
use crate::table::{self, TableDefinition};

pub use error::{RegistryError, RegistryResult};

type ChannelSlot = Arc<OnceCell<Arc<dyn QueryChannel>>>;

/// Owns every connection's query channel.
pub struct ConnectionRegistry {
    settings: Settings,
    channels: DashMap<String, ChannelSlot>,
    /// Keyed by (connection, table). Only successful lookups are stored.
    schemas: DashMap<(String, String), TableSchema>,
    descriptions: DescriptionCatalog,
}

impl ConnectionRegistry {
    pub fn new(settings: Settings) -> Self {
        Self::with_descriptions(settings, DescriptionCatalog::empty())
    }

    pub fn with_descriptions(settings: Settings, descriptions: DescriptionCatalog) -> Self {
        Self {
            settings,
            channels: DashMap::new(),
            schemas: DashMap::new(),
            descriptions,
        }
    }

    /// Build a registry, loading descriptions from `bridge.metadata_file`.
    pub fn from_settings(settings: Settings) -> RegistryResult<Self> {
        let descriptions = match settings.bridge.metadata_path()? {
            Some(path) => DescriptionCatalog::from_file(path)?,
            None => DescriptionCatalog::empty(),
        };
        Ok(Self::with_descriptions(settings, descriptions))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn descriptions(&self) -> &DescriptionCatalog {
        &self.descriptions
    }

    /// The channel for `name` if it has been started or inserted.
    pub fn get(&self, name: &str) -> Option<Arc<dyn QueryChannel>> {
        self.channels
            .get(name)
            .and_then(|slot| slot.get().cloned())
    }

    /// Register an already running channel, replacing any previous one.
    ///
    /// The replaced channel is returned, not stopped.
    pub fn insert(
        &self,
        name: impl Into<String>,
        channel: Arc<dyn QueryChannel>,
    ) -> Option<Arc<dyn QueryChannel>> {
        let name = name.into();
        self.forget_schemas(&name);
        let slot = Arc::new(OnceCell::new_with(Some(channel)));
        self.channels
            .insert(name, slot)
            .and_then(|previous| previous.get().cloned())
    }

    /// The channel for `name`, starting it from settings on first use.
    ///
    /// Concurrent first callers share one start. A failed start is not
    /// remembered; the next call tries again.
    pub async fn connect(&self, name: &str) -> RegistryResult<Arc<dyn QueryChannel>> {
        let existing = self.channels.get(name).map(|slot| Arc::clone(slot.value()));
        let slot = match existing {
            Some(slot) => slot,
            None => {
                // Unknown names must not leave an empty slot behind.
                self.settings.get_connection(name)?;
                Arc::clone(self.channels.entry(name.to_string()).or_default().value())
            }
        };

        let channel = slot
            .get_or_try_init(|| self.start_channel(name))
            .await?;
        Ok(Arc::clone(channel))
    }

    async fn start_channel(&self, name: &str) -> RegistryResult<Arc<dyn QueryChannel>> {
        let connection = self.settings.get_connection(name)?;
        let config = self.settings.bridge_config(name)?;

        let channel: Arc<dyn QueryChannel> = match connection.mode {
            BridgeMode::Persistent => Arc::new(Bridge::start(&config).await?),
            BridgeMode::PerQuery => Arc::new(EphemeralBridge::new(config)),
        };
        info!(connection = name, mode = ?connection.mode, "connection ready");
        Ok(channel)
    }

    /// Column metadata for a table, memoized per connection.
    pub async fn table_schema(&self, name: &str, table: &str) -> RegistryResult<TableSchema> {
        let key = (name.to_string(), table.to_string());
        if let Some(schema) = self.schemas.get(&key) {
            return Ok(schema.clone());
        }

        let channel = self.connect(name).await?;
        let schema = metadata::describe_table(channel.as_ref(), table).await?;
        debug!(connection = name, table, "caching table schema");
        self.schemas.insert(key, schema.clone());
        Ok(schema)
    }

    /// Host-facing definition of a table.
    pub async fn table_definition(&self, name: &str, table: &str) -> RegistryResult<TableDefinition> {
        let schema = self.table_schema(name, table).await?;
        Ok(TableDefinition::build(&schema, &self.descriptions))
    }

    pub async fn list_tables(&self, name: &str) -> RegistryResult<Vec<String>> {
        let channel = self.connect(name).await?;
        Ok(metadata::list_tables(channel.as_ref()).await?)
    }

    /// Rows of `table`, rendered with the configured value rendering.
    pub async fn list_rows(
        &self,
        name: &str,
        table: &str,
        qualifiers: &QualifierInput,
    ) -> RegistryResult<Vec<Row>> {
        let channel = self.connect(name).await?;
        let rendering = self.settings.bridge.value_rendering;
        Ok(table::list_rows(channel.as_ref(), table, qualifiers, rendering).await?)
    }

    pub async fn get_row(&self, name: &str, table: &str, equality: Option<&str>) -> RegistryResult<Row> {
        let channel = self.connect(name).await?;
        Ok(table::get_row(channel.as_ref(), table, equality).await?)
    }

    /// Raw SQL through the connection's channel.
    pub async fn query(&self, name: &str, sql: &str) -> RegistryResult<Vec<Row>> {
        let channel = self.connect(name).await?;
        let response = channel.send_query(sql).await?;
        Ok(response.into_rows().map_err(table::TableError::Parse)?)
    }

    /// Stop and forget one connection. Returns whether it was running.
    pub fn close(&self, name: &str) -> bool {
        self.forget_schemas(name);
        match self.channels.remove(name) {
            Some((_, slot)) => match slot.get() {
                Some(channel) => {
                    channel.stop();
                    info!(connection = name, "connection closed");
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Stop every connection.
    pub fn close_all(&self) {
        let names: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        for name in names {
            self.close(&name);
        }
    }

    fn forget_schemas(&self, name: &str) {
        self.schemas.retain(|(connection, _), _| connection != name);
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

//! SchemaProvider trait definition.
//!
//! The SchemaProvider trait abstracts over where table schemas come from.
//! The primary implementation queries osquery through a [`QueryChannel`].
//!
//! [`QueryChannel`]: crate::bridge::QueryChannel

use async_trait::async_trait;

use super::error::MetadataResult;
use super::types::TableSchema;

/// Trait for fetching osquery table metadata.
///
/// # Example
///
/// ```ignore
/// use osquery_bridge::metadata::SchemaProvider;
///
/// async fn example(provider: &impl SchemaProvider) -> MetadataResult<()> {
///     let tables = provider.list_tables().await?;
///     let processes = provider.describe_table("processes").await?;
///     let described = provider.describe_tables(&tables).await;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Names of every table osquery has registered.
    async fn list_tables(&self) -> MetadataResult<Vec<String>>;

    /// Columns and primary key of one table.
    async fn describe_table(&self, table: &str) -> MetadataResult<TableSchema>;

    /// Describe several tables.
    ///
    /// Each table gets its own result so a failure never hides the others.
    /// Queries still go out one at a time on a shared channel.
    async fn describe_tables(&self, tables: &[String]) -> Vec<(String, MetadataResult<TableSchema>)> {
        let futures: Vec<_> = tables.iter().map(|t| self.describe_table(t)).collect();
        let results = futures::future::join_all(futures).await;

        tables.iter().cloned().zip(results).collect()
    }
}

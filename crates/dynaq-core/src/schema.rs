//! Key schema lookup.

use async_trait::async_trait;
use dynaq_model::TableSchema;

/// Supplies a table's key schemas.
///
/// Implemented by whatever can describe tables, usually the same client that
/// executes reads.
#[async_trait]
pub trait KeySchemaProvider: Send + Sync {
    /// Describe the key schema of `table` and its secondary indexes.
    async fn table_schema(&self, table: &str) -> anyhow::Result<TableSchema>;
}

//! Catalog access: typed records and the read-only catalog source trait.

mod postgres;
mod records;

pub use postgres::PostgresCatalog;
pub use records::*;

use async_trait::async_trait;

use crate::error::Result;

/// Read-only source of schema-object metadata.
///
/// The export pipeline depends only on the record shapes, not on any
/// particular query text; tests substitute an in-memory implementation.
///
/// Ordering contract: `functions` and `fts_configurations` come back
/// sorted by name. The remaining kinds are also returned in a
/// deterministic order so artifact files are stable across runs.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// All user-defined enum types.
    async fn enum_types(&self) -> Result<Vec<EnumType>>;

    /// All user-defined composite types.
    async fn composite_types(&self) -> Result<Vec<CompositeType>>;

    /// All user-defined plain functions, sorted by name.
    async fn functions(&self) -> Result<Vec<Function>>;

    /// All user-defined normal aggregates, sorted by name.
    async fn aggregates(&self) -> Result<Vec<Aggregate>>;

    /// All full-text-search configurations, sorted by schema and name.
    async fn fts_configurations(&self) -> Result<Vec<FtsConfiguration>>;

    /// Non-internal triggers on one table, sorted by trigger name.
    async fn triggers(&self, table: &str) -> Result<Vec<Trigger>>;

    /// User table names, sorted. Drives the per-table trigger pass.
    async fn tables(&self) -> Result<Vec<String>>;

    /// Close the connection pool.
    async fn close(&self);
}

//! # pg-schema-export
//!
//! Export PostgreSQL schema objects that a generic ORM schema dump cannot
//! represent (enum and composite types, stored functions, text search
//! configurations, custom aggregates and row-level triggers) as
//! idempotent, replayable SQL artifacts reconstructed from live catalog
//! metadata.
//!
//! The pipeline reads typed records from the system catalogs, repairs
//! their textual definitions, assembles guarded `CREATE` / `CREATE OR
//! REPLACE` statements and persists them to deterministic per-object
//! files, then appends replay instructions to a caller-supplied snapshot
//! stream. Re-running an export against an already-migrated database
//! adds nothing.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pg_schema_export::{Config, Exporter, PostgresCatalog};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pg_schema_export::ExportError> {
//!     let config = Config::load("config.yaml")?;
//!     let catalog = PostgresCatalog::connect(&config.database, &config.export).await?;
//!     let mut exporter = Exporter::new(&config, Arc::new(catalog));
//!     let mut snapshot = std::fs::File::create("snapshot.sql")?;
//!     let report = exporter.run(&mut snapshot).await?;
//!     println!("Exported {} functions", report.functions);
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod reconstruct;
pub mod sanitize;
pub mod snapshot;
pub mod tls;

// Re-exports for convenient access
pub use artifact::{ArtifactKind, ArtifactStore};
pub use catalog::{CatalogSource, PostgresCatalog};
pub use config::{Config, DatabaseConfig, ExportConfig};
pub use error::{ExportError, Result};
pub use export::{ExportReport, Exporter, RunState};
pub use reconstruct::SqlReconstructor;
pub use snapshot::{LoaderEmitter, SnapshotStream};

//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Catalog database connection configuration.
    pub database: DatabaseConfig,

    /// Export behavior configuration.
    #[serde(default)]
    pub export: ExportConfig,
}

/// Catalog database (PostgreSQL) connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// SSL mode (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

/// Export behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Root directory for artifact files (default: "db").
    ///
    /// Artifacts land under `<output_root>/others`, `<output_root>/functions`
    /// and `<output_root>/triggers`.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Application schema whose qualification is rewritten to
    /// `target_schema` inside trigger definitions. No rewrite when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_schema: Option<String>,

    /// Canonical schema used when qualifying reconstructed aggregates and
    /// as the rewrite target for `source_schema` (default: "public").
    #[serde(default = "default_public_schema")]
    pub target_schema: String,

    /// Function languages to export (default: sql, plpgsql).
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            source_schema: None,
            target_schema: default_public_schema(),
            languages: default_languages(),
        }
    }
}

// Default value functions for serde

fn default_pg_port() -> u16 {
    5432
}

fn default_require() -> String {
    "require".to_string()
}

fn default_output_root() -> PathBuf {
    PathBuf::from("db")
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_languages() -> Vec<String> {
    vec!["sql".to_string(), "plpgsql".to_string()]
}

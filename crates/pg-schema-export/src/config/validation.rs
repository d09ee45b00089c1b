//! Configuration validation.

use super::Config;
use crate::error::{ExportError, Result};
use crate::tls::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Database validation
    if config.database.host.is_empty() {
        return Err(ExportError::Config("database.host is required".into()));
    }
    if config.database.database.is_empty() {
        return Err(ExportError::Config("database.database is required".into()));
    }
    if config.database.user.is_empty() {
        return Err(ExportError::Config("database.user is required".into()));
    }
    SslMode::parse(&config.database.ssl_mode)?;

    // Export validation
    if config.export.output_root.as_os_str().is_empty() {
        return Err(ExportError::Config(
            "export.output_root must not be empty".into(),
        ));
    }
    if config.export.target_schema.is_empty() {
        return Err(ExportError::Config(
            "export.target_schema must not be empty".into(),
        ));
    }
    if config.export.languages.is_empty() {
        return Err(ExportError::Config(
            "export.languages must list at least one language".into(),
        ));
    }

    if let Some(ref source) = config.export.source_schema {
        if source.is_empty() {
            return Err(ExportError::Config(
                "export.source_schema must not be empty when set".into(),
            ));
        }
        if source == &config.export.target_schema {
            return Err(ExportError::Config(
                "export.source_schema and export.target_schema must differ".into(),
            ));
        }
    }

    Ok(())
}

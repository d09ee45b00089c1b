//! Export run orchestration.
//!
//! Single-threaded, single-pass batch job: each object kind is processed
//! sequentially, and records sequentially within a kind. A failure aborts
//! the whole run; there is no partial-success mode.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::artifact::{ArtifactKind, ArtifactStore};
use crate::catalog::CatalogSource;
use crate::config::Config;
use crate::error::Result;
use crate::reconstruct::SqlReconstructor;
use crate::snapshot::{LoaderEmitter, SnapshotStream};

/// Per-run state passed explicitly to each stage.
///
/// Owns the "have the trigger artifacts been reset yet" flag so a reused
/// exporter never silently skips the wipe on its next run.
#[derive(Debug, Default)]
pub struct RunState {
    triggers_reset: bool,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    /// Enum types exported.
    pub enums: usize,

    /// Composite types exported.
    pub composites: usize,

    /// Functions exported.
    pub functions: usize,

    /// Aggregates exported.
    pub aggregates: usize,

    /// Text search configurations exported.
    pub fts_configurations: usize,

    /// Tables that had at least one trigger.
    pub tables_with_triggers: usize,

    /// Triggers exported.
    pub triggers: usize,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl ExportReport {
    /// Serialize the report to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Schema-object exporter: drives catalog records through sanitization
/// and reconstruction into the artifact store and the snapshot stream.
pub struct Exporter {
    catalog: Arc<dyn CatalogSource>,
    store: ArtifactStore,
    reconstructor: SqlReconstructor,
}

impl Exporter {
    /// Create an exporter over an already-connected catalog source.
    pub fn new(config: &Config, catalog: Arc<dyn CatalogSource>) -> Self {
        Self {
            catalog,
            store: ArtifactStore::new(config.export.output_root.clone()),
            reconstructor: SqlReconstructor::new(&config.export),
        }
    }

    /// Run a full export: types, functions, FTS configurations,
    /// aggregates, then a trigger pass over every user table.
    pub async fn run(&mut self, stream: &mut dyn SnapshotStream) -> Result<ExportReport> {
        let started = Instant::now();
        let mut run = RunState::new();

        self.store.begin_run()?;
        let (enums, composites) = self.export_types(stream).await?;
        let functions = self.export_functions(stream).await?;
        let fts_configurations = self.export_fts_configurations(stream).await?;
        let aggregates = self.export_aggregates(stream).await?;

        self.reset_triggers_root(&mut run)?;
        let tables = self.catalog.tables().await?;
        let mut triggers = 0;
        let mut tables_with_triggers = 0;
        for table in &tables {
            let count = self.export_table_triggers(table, &mut run, stream).await?;
            if count > 0 {
                tables_with_triggers += 1;
                triggers += count;
            }
        }

        let report = ExportReport {
            enums,
            composites,
            functions,
            aggregates,
            fts_configurations,
            tables_with_triggers,
            triggers,
            duration_seconds: started.elapsed().as_secs_f64(),
        };

        info!(
            "Export finished: {} enums, {} composites, {} functions, {} aggregates, \
             {} fts configurations, {} triggers across {} tables",
            report.enums,
            report.composites,
            report.functions,
            report.aggregates,
            report.fts_configurations,
            report.triggers,
            report.tables_with_triggers,
        );

        Ok(report)
    }

    /// Export enum and composite types into the shared types artifact.
    async fn export_types(&mut self, stream: &mut dyn SnapshotStream) -> Result<(usize, usize)> {
        let enums = self.catalog.enum_types().await?;
        for record in &enums {
            let sql = self.reconstructor.enum_type(record);
            self.store.emit(&ArtifactKind::Types, &sql)?;
        }

        let composites = self.catalog.composite_types().await?;
        for record in &composites {
            let sql = self.reconstructor.composite_type(record);
            self.store.emit(&ArtifactKind::Types, &sql)?;
        }

        if !enums.is_empty() || !composites.is_empty() {
            LoaderEmitter::emit_category(&self.store, &ArtifactKind::Types, "custom types", stream)?;
        }

        debug!(
            "Exported {} enum and {} composite types",
            enums.len(),
            composites.len()
        );
        Ok((enums.len(), composites.len()))
    }

    /// Export functions, one artifact file per function name.
    async fn export_functions(&mut self, stream: &mut dyn SnapshotStream) -> Result<usize> {
        let functions = self.catalog.functions().await?;
        for record in &functions {
            let sql = self.reconstructor.function(record);
            self.store
                .emit(&ArtifactKind::Function(record.name.clone()), &sql)?;
        }

        LoaderEmitter::emit_directory(&self.store, "functions", "functions", stream)?;

        debug!("Exported {} functions", functions.len());
        Ok(functions.len())
    }

    /// Export text search configurations into the shared fts artifact.
    async fn export_fts_configurations(
        &mut self,
        stream: &mut dyn SnapshotStream,
    ) -> Result<usize> {
        let configs = self.catalog.fts_configurations().await?;
        for record in &configs {
            let sql = self.reconstructor.fts_configuration(record);
            self.store.emit(&ArtifactKind::FtsConfigurations, &sql)?;
        }

        if !configs.is_empty() {
            LoaderEmitter::emit_category(
                &self.store,
                &ArtifactKind::FtsConfigurations,
                "text search configurations",
                stream,
            )?;
        }

        debug!("Exported {} FTS configurations", configs.len());
        Ok(configs.len())
    }

    /// Export aggregates into the shared aggregates artifact.
    async fn export_aggregates(&mut self, stream: &mut dyn SnapshotStream) -> Result<usize> {
        let aggregates = self.catalog.aggregates().await?;
        for record in &aggregates {
            let sql = self.reconstructor.aggregate(record);
            self.store.emit(&ArtifactKind::Aggregates, &sql)?;
        }

        if !aggregates.is_empty() {
            LoaderEmitter::emit_category(
                &self.store,
                &ArtifactKind::Aggregates,
                "aggregates",
                stream,
            )?;
        }

        debug!("Exported {} aggregates", aggregates.len());
        Ok(aggregates.len())
    }

    /// Wipe the trigger artifacts once per run. Later calls within the
    /// same run are no-ops; a new `RunState` wipes again.
    pub fn reset_triggers_root(&self, run: &mut RunState) -> Result<()> {
        if run.triggers_reset {
            return Ok(());
        }
        self.store.reset_triggers_root()?;
        run.triggers_reset = true;
        Ok(())
    }

    /// Per-table trigger pass: reconstruct each trigger on `table` into
    /// the table's artifact file and inline into the snapshot stream.
    /// Returns the number of triggers found.
    pub async fn export_table_triggers(
        &mut self,
        table: &str,
        run: &mut RunState,
        stream: &mut dyn SnapshotStream,
    ) -> Result<usize> {
        self.reset_triggers_root(run)?;

        let triggers = self.catalog.triggers(table).await?;
        if triggers.is_empty() {
            return Ok(0);
        }

        stream.append_line(&format!("-- triggers on {}", table))?;
        for record in &triggers {
            let sql = self.reconstructor.trigger(record);
            self.store.emit(&ArtifactKind::Trigger(table.to_string()), &sql)?;
            LoaderEmitter::emit_inline_sql(&sql, stream)?;
        }

        debug!("Exported {} triggers for {}", triggers.len(), table);
        Ok(triggers.len())
    }

    /// Close the underlying catalog source.
    pub async fn close(&self) {
        self.catalog.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        Aggregate, CatalogSource, CompositeType, EnumType, FtsConfiguration, Function, Trigger,
        Volatility,
    };
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// In-memory catalog for pipeline tests.
    #[derive(Default)]
    struct FakeCatalog {
        enums: Vec<EnumType>,
        composites: Vec<CompositeType>,
        functions: Vec<Function>,
        aggregates: Vec<Aggregate>,
        fts: Vec<FtsConfiguration>,
        triggers: Vec<Trigger>,
        tables: Vec<String>,
    }

    #[async_trait]
    impl CatalogSource for FakeCatalog {
        async fn enum_types(&self) -> Result<Vec<EnumType>> {
            Ok(self.enums.clone())
        }

        async fn composite_types(&self) -> Result<Vec<CompositeType>> {
            Ok(self.composites.clone())
        }

        async fn functions(&self) -> Result<Vec<Function>> {
            Ok(self.functions.clone())
        }

        async fn aggregates(&self) -> Result<Vec<Aggregate>> {
            Ok(self.aggregates.clone())
        }

        async fn fts_configurations(&self) -> Result<Vec<FtsConfiguration>> {
            Ok(self.fts.clone())
        }

        async fn triggers(&self, table: &str) -> Result<Vec<Trigger>> {
            Ok(self
                .triggers
                .iter()
                .filter(|t| t.table == table)
                .cloned()
                .collect())
        }

        async fn tables(&self) -> Result<Vec<String>> {
            Ok(self.tables.clone())
        }

        async fn close(&self) {}
    }

    fn function(name: &str, body: &str) -> Function {
        Function {
            name: name.into(),
            arguments: "a int".into(),
            return_type: "int".into(),
            body: body.into(),
            volatility: Volatility::Volatile,
            language: "plpgsql".into(),
        }
    }

    fn synthetic_catalog() -> FakeCatalog {
        FakeCatalog {
            enums: vec![
                EnumType {
                    name: "color".into(),
                    labels: vec!["'red'".into(), "'green'".into()],
                },
                EnumType {
                    name: "status".into(),
                    labels: vec!["'new'".into(), "'done'".into()],
                },
            ],
            functions: vec![
                function("add_one", "RETURN a + 1"),
                function("double_it", "RETURN a * 2"),
                function("negate", "BEGIN RETURN -a; END"),
            ],
            aggregates: vec![Aggregate {
                name: "accum".into(),
                argument_types: "int8".into(),
                state_type: "int8".into(),
                transition_fn: "int8_accum".into(),
                final_fn: None,
                combine_fn: None,
                serial_fn: None,
                deserial_fn: None,
                initial_value: Some("0".into()),
                finalfunc_modify: None,
            }],
            triggers: vec![Trigger {
                table: "orders".into(),
                name: "audit".into(),
                definition: "CREATE TRIGGER audit AFTER UPDATE ON myapp.orders \
                             FOR EACH ROW EXECUTE FUNCTION log_change()"
                    .into(),
            }],
            tables: vec!["orders".into(), "users".into()],
            ..FakeCatalog::default()
        }
    }

    fn test_config(root: &std::path::Path) -> Config {
        let mut config = Config::from_yaml(
            r#"
database:
  host: localhost
  database: appdb
  user: postgres
  password: secret
"#,
        )
        .unwrap();
        config.export.output_root = root.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_round_trip_counts_and_layout() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let mut exporter = Exporter::new(&config, Arc::new(synthetic_catalog()));

        let mut snapshot: Vec<u8> = Vec::new();
        let report = exporter.run(&mut snapshot).await.unwrap();

        assert_eq!(report.enums, 2);
        assert_eq!(report.functions, 3);
        assert_eq!(report.aggregates, 1);
        assert_eq!(report.triggers, 1);
        assert_eq!(report.tables_with_triggers, 1);

        assert!(dir.path().join("others/types.sql").is_file());
        assert!(dir.path().join("others/aggregates.sql").is_file());
        assert!(dir.path().join("functions/add_one.sql").is_file());
        assert!(dir.path().join("functions/double_it.sql").is_file());
        assert!(dir.path().join("functions/negate.sql").is_file());
        assert!(dir.path().join("triggers/orders.sql").is_file());
        // no fts configurations in the synthetic catalog; the category
        // file is still truncated to empty at run start
        let fts = std::fs::read_to_string(dir.path().join("others/fts.sql")).unwrap();
        assert!(fts.is_empty());
    }

    #[tokio::test]
    async fn test_every_statement_is_idempotent_or_replacing() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let mut exporter = Exporter::new(&config, Arc::new(synthetic_catalog()));

        let mut snapshot: Vec<u8> = Vec::new();
        exporter.run(&mut snapshot).await.unwrap();

        let types = std::fs::read_to_string(dir.path().join("others/types.sql")).unwrap();
        // both enums guarded
        assert_eq!(types.matches("IF NOT EXISTS").count(), 2);

        for name in ["add_one", "double_it", "negate"] {
            let sql =
                std::fs::read_to_string(dir.path().join(format!("functions/{name}.sql"))).unwrap();
            assert!(sql.starts_with("CREATE OR REPLACE FUNCTION"));
        }

        let aggregates =
            std::fs::read_to_string(dir.path().join("others/aggregates.sql")).unwrap();
        assert!(aggregates.starts_with("CREATE OR REPLACE AGGREGATE public.accum"));
        assert!(!aggregates.contains("FINALFUNC"));
        assert!(aggregates.contains("INITCOND = '0'"));
    }

    #[tokio::test]
    async fn test_second_run_on_same_exporter_produces_identical_bytes() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let mut exporter = Exporter::new(&config, Arc::new(synthetic_catalog()));

        let mut first_snapshot: Vec<u8> = Vec::new();
        exporter.run(&mut first_snapshot).await.unwrap();
        let first_types = std::fs::read(dir.path().join("others/types.sql")).unwrap();
        let first_fn = std::fs::read(dir.path().join("functions/add_one.sql")).unwrap();
        let first_trigger = std::fs::read(dir.path().join("triggers/orders.sql")).unwrap();

        // same exporter instance: the second run must truncate, not append
        let mut second_snapshot: Vec<u8> = Vec::new();
        exporter.run(&mut second_snapshot).await.unwrap();

        assert_eq!(first_types, std::fs::read(dir.path().join("others/types.sql")).unwrap());
        assert_eq!(first_fn, std::fs::read(dir.path().join("functions/add_one.sql")).unwrap());
        assert_eq!(
            first_trigger,
            std::fs::read(dir.path().join("triggers/orders.sql")).unwrap()
        );
        assert_eq!(first_snapshot, second_snapshot);

        let add_one = String::from_utf8(first_fn).unwrap();
        assert_eq!(add_one.matches("CREATE OR REPLACE FUNCTION").count(), 1);
    }

    #[tokio::test]
    async fn test_trigger_reaches_snapshot_only_inline() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let mut exporter = Exporter::new(&config, Arc::new(synthetic_catalog()));

        let mut snapshot: Vec<u8> = Vec::new();
        exporter.run(&mut snapshot).await.unwrap();
        let text = String::from_utf8(snapshot).unwrap();

        // triggers carry no existence guard, so the snapshot must execute
        // each one exactly once: inline, with no include line on top
        assert_eq!(text.matches("CREATE TRIGGER audit").count(), 1);
        assert!(!text
            .lines()
            .any(|line| line.starts_with("\\i") && line.contains("triggers/")));
        // the per-table artifact file is still written for the loader layout
        assert!(dir.path().join("triggers/orders.sql").is_file());
    }

    #[tokio::test]
    async fn test_snapshot_contains_sorted_function_includes_and_inline_triggers() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let mut exporter = Exporter::new(&config, Arc::new(synthetic_catalog()));

        let mut snapshot: Vec<u8> = Vec::new();
        exporter.run(&mut snapshot).await.unwrap();
        let text = String::from_utf8(snapshot).unwrap();

        let add_one = text.find("add_one.sql").unwrap();
        let double_it = text.find("double_it.sql").unwrap();
        let negate = text.find("negate.sql").unwrap();
        assert!(add_one < double_it && double_it < negate);

        assert!(text.contains("-- triggers on orders"));
        assert!(text.contains("CREATE TRIGGER audit"));
        // ON clause qualifier reduced in the inline variant too
        assert!(text.contains("ON orders"));
    }

    #[tokio::test]
    async fn test_trigger_reset_happens_once_per_run_state() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let exporter = Exporter::new(&config, Arc::new(FakeCatalog::default()));

        std::fs::create_dir_all(dir.path().join("triggers")).unwrap();
        std::fs::write(dir.path().join("triggers/stale.sql"), "stale;").unwrap();

        let mut run = RunState::new();
        exporter.reset_triggers_root(&mut run).unwrap();
        assert!(!dir.path().join("triggers/stale.sql").exists());

        // same run: later calls must not wipe freshly written artifacts
        std::fs::write(dir.path().join("triggers/fresh.sql"), "fresh;").unwrap();
        exporter.reset_triggers_root(&mut run).unwrap();
        assert!(dir.path().join("triggers/fresh.sql").exists());

        // a new run state wipes again
        let mut next_run = RunState::new();
        exporter.reset_triggers_root(&mut next_run).unwrap();
        assert!(!dir.path().join("triggers/fresh.sql").exists());
    }
}

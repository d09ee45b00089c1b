//! pg-schema-export CLI - export Postgres schema objects as idempotent SQL.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pg_schema_export::{CatalogSource, Config, ExportError, Exporter, PostgresCatalog};
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pg-schema-export")]
#[command(about = "Export Postgres types, functions, aggregates, FTS configs and triggers")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON report to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full schema-object export
    Export {
        /// Snapshot file for loader emission (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the artifact root directory
        #[arg(long)]
        output_root: Option<PathBuf>,

        /// Override the tenant schema rewritten in trigger definitions
        #[arg(long)]
        source_schema: Option<String>,

        /// Override the canonical target schema
        #[arg(long)]
        target_schema: Option<String>,
    },

    /// Test the catalog database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ExportError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Export {
            output,
            output_root,
            source_schema,
            target_schema,
        } => {
            // Apply overrides
            if let Some(root) = output_root {
                config.export.output_root = root;
            }
            if let Some(schema) = source_schema {
                config.export.source_schema = Some(schema);
            }
            if let Some(schema) = target_schema {
                config.export.target_schema = schema;
            }
            config.validate()?;

            let catalog = PostgresCatalog::connect(&config.database, &config.export).await?;
            let mut exporter = Exporter::new(&config, Arc::new(catalog));

            let report = match output {
                Some(ref path) => {
                    let file = std::fs::File::create(path)?;
                    let mut stream = std::io::BufWriter::new(file);
                    let report = exporter.run(&mut stream).await?;
                    stream.flush()?;
                    report
                }
                None => {
                    let mut stream = std::io::stdout().lock();
                    exporter.run(&mut stream).await?
                }
            };
            exporter.close().await;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                println!("\nExport completed!");
                println!("  Duration: {:.2}s", report.duration_seconds);
                println!("  Enum types: {}", report.enums);
                println!("  Composite types: {}", report.composites);
                println!("  Functions: {}", report.functions);
                println!("  Aggregates: {}", report.aggregates);
                println!("  FTS configurations: {}", report.fts_configurations);
                println!(
                    "  Triggers: {} (across {} tables)",
                    report.triggers, report.tables_with_triggers
                );
                if let Some(ref path) = output {
                    println!("  Snapshot: {:?}", path);
                }
                println!("  Artifacts: {:?}", config.export.output_root);
            }
        }

        Commands::HealthCheck => {
            let catalog = PostgresCatalog::connect(&config.database, &config.export).await?;
            catalog.close().await;
            println!("Catalog connection OK");
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG wins over --verbosity when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

//! Live PostgreSQL catalog source.
//!
//! Queries the system catalogs through a deadpool-postgres pool. Pure
//! read: nothing here mutates the database.

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info};

use crate::catalog::{
    optional_fn, Aggregate, CatalogSource, CompositeType, EnumType, FinalFuncModify,
    FtsConfiguration, Function, Trigger, Volatility, INVALID_FUNCTION_BODY,
};
use crate::config::{DatabaseConfig, ExportConfig};
use crate::error::{ExportError, Result};
use crate::tls::TlsBuilder;

use async_trait::async_trait;

/// Schemas that never hold exportable user objects.
const SYSTEM_SCHEMAS: [&str; 2] = ["pg_catalog", "information_schema"];

/// Grouped per (namespace, type name) so same-named composite types in
/// different schemas never have their attributes merged into one record.
const COMPOSITE_TYPES_QUERY: &str = r#"
    SELECT t.typname,
           string_agg(a.attname || ' ' || format_type(a.atttypid, a.atttypmod),
                      ', ' ORDER BY a.attnum)
    FROM pg_type t
    JOIN pg_class c ON c.oid = t.typrelid AND c.relkind = 'c'
    JOIN pg_attribute a ON a.attrelid = c.oid
         AND a.attnum > 0 AND NOT a.attisdropped
    JOIN pg_namespace n ON n.oid = t.typnamespace
    WHERE n.nspname <> ALL($1)
    GROUP BY n.nspname, t.typname
    ORDER BY n.nspname, t.typname
"#;

/// PostgreSQL catalog source implementation.
pub struct PostgresCatalog {
    pool: Pool,
    languages: Vec<String>,
}

impl PostgresCatalog {
    /// Connect to the catalog database.
    pub async fn connect(config: &DatabaseConfig, export: &ExportConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match TlsBuilder::parse(&config.ssl_mode)?.build()? {
            None => {
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(1)
                    .build()
                    .map_err(|e| ExportError::pool(e, "creating catalog pool"))?
            }
            Some(tls) => {
                let mgr = Manager::from_config(pg_config, tls, mgr_config);
                Pool::builder(mgr)
                    .max_size(1)
                    .build()
                    .map_err(|e| ExportError::pool(e, "creating catalog pool"))?
            }
        };

        // Test connection
        let client = pool
            .get()
            .await
            .map_err(|e| ExportError::pool(e, "testing catalog connection"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to catalog: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            languages: export.languages.clone(),
        })
    }

    async fn client(&self, context: &str) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| ExportError::pool(e, context))
    }
}

#[async_trait]
impl CatalogSource for PostgresCatalog {
    async fn enum_types(&self) -> Result<Vec<EnumType>> {
        let client = self.client("getting connection for enum_types").await?;

        let query = r#"
            SELECT t.typname,
                   array_agg(quote_literal(e.enumlabel) ORDER BY e.enumsortorder)
            FROM pg_type t
            JOIN pg_enum e ON t.oid = e.enumtypid
            WHERE t.typcategory = 'E'
            GROUP BY t.typname
            ORDER BY t.typname
        "#;

        let rows = client.query(query, &[]).await?;
        let enums = rows
            .iter()
            .map(|row| EnumType {
                name: row.get(0),
                labels: row.get(1),
            })
            .collect::<Vec<_>>();

        debug!("Loaded {} enum types", enums.len());
        Ok(enums)
    }

    async fn composite_types(&self) -> Result<Vec<CompositeType>> {
        let client = self.client("getting connection for composite_types").await?;

        let schemas: Vec<String> = SYSTEM_SCHEMAS.iter().map(|s| s.to_string()).collect();
        let rows = client.query(COMPOSITE_TYPES_QUERY, &[&schemas]).await?;
        let composites = rows
            .iter()
            .map(|row| CompositeType {
                name: row.get(0),
                attributes: row.get(1),
            })
            .collect::<Vec<_>>();

        debug!("Loaded {} composite types", composites.len());
        Ok(composites)
    }

    async fn functions(&self) -> Result<Vec<Function>> {
        let client = self.client("getting connection for functions").await?;

        // A NULL prosrc never fails the export; it degrades to the
        // sentinel body and is repaired downstream.
        let query = r#"
            SELECT p.proname,
                   pg_get_function_arguments(p.oid),
                   pg_get_function_result(p.oid),
                   COALESCE(p.prosrc, $1),
                   p.provolatile::text,
                   l.lanname
            FROM pg_proc p
            JOIN pg_namespace n ON n.oid = p.pronamespace
            JOIN pg_language l ON l.oid = p.prolang
            WHERE l.lanname::text = ANY($2)
              AND n.nspname <> ALL($3)
              AND p.proname NOT LIKE 'pg\_%'
              AND p.prokind = 'f'
            ORDER BY p.proname
        "#;

        let schemas: Vec<String> = SYSTEM_SCHEMAS.iter().map(|s| s.to_string()).collect();
        let rows = client
            .query(query, &[&INVALID_FUNCTION_BODY, &self.languages, &schemas])
            .await?;

        let functions = rows
            .iter()
            .map(|row| Function {
                name: row.get(0),
                arguments: row.get(1),
                return_type: row.get(2),
                body: row.get(3),
                volatility: Volatility::from_flag(row.get(4)),
                language: row.get(5),
            })
            .collect::<Vec<_>>();

        debug!("Loaded {} functions", functions.len());
        Ok(functions)
    }

    async fn aggregates(&self) -> Result<Vec<Aggregate>> {
        let client = self.client("getting connection for aggregates").await?;

        // Ordered-set aggregates (aggkind <> 'n') use a WITHIN GROUP
        // syntax this exporter does not reconstruct. Moving-aggregate
        // clauses (MSFUNC and friends) are not reconstructed either.
        let query = r#"
            SELECT p.proname,
                   pg_get_function_identity_arguments(p.oid),
                   format_type(a.aggtranstype, NULL),
                   (SELECT proname FROM pg_proc WHERE oid = a.aggtransfn),
                   (SELECT proname FROM pg_proc WHERE oid = a.aggfinalfn),
                   (SELECT proname FROM pg_proc WHERE oid = a.aggcombinefn),
                   (SELECT proname FROM pg_proc WHERE oid = a.aggserialfn),
                   (SELECT proname FROM pg_proc WHERE oid = a.aggdeserialfn),
                   a.agginitval,
                   a.aggfinalmodify::text
            FROM pg_aggregate a
            JOIN pg_proc p ON a.aggfnoid = p.oid
            JOIN pg_namespace n ON p.pronamespace = n.oid
            WHERE n.nspname <> ALL($1)
              AND a.aggkind = 'n'
            ORDER BY p.proname
        "#;

        let schemas: Vec<String> = SYSTEM_SCHEMAS.iter().map(|s| s.to_string()).collect();
        let rows = client.query(query, &[&schemas]).await?;

        let aggregates = rows
            .iter()
            .map(|row| {
                let final_fn = optional_fn(row.get(4));
                Aggregate {
                    name: row.get(0),
                    argument_types: row.get(1),
                    state_type: row.get(2),
                    transition_fn: row.get(3),
                    // FINALFUNC_MODIFY only makes sense alongside a final
                    // function; the catalog always carries a default flag.
                    finalfunc_modify: if final_fn.is_some() {
                        FinalFuncModify::from_flag(row.get(9))
                    } else {
                        None
                    },
                    final_fn,
                    combine_fn: optional_fn(row.get(5)),
                    serial_fn: optional_fn(row.get(6)),
                    deserial_fn: optional_fn(row.get(7)),
                    initial_value: row.get(8),
                }
            })
            .collect::<Vec<_>>();

        debug!("Loaded {} aggregates", aggregates.len());
        Ok(aggregates)
    }

    async fn fts_configurations(&self) -> Result<Vec<FtsConfiguration>> {
        let client = self
            .client("getting connection for fts_configurations")
            .await?;

        let query = r#"
            SELECT n.nspname, c.cfgname
            FROM pg_ts_config c
            JOIN pg_namespace n ON c.cfgnamespace = n.oid
            WHERE n.nspname <> ALL($1)
            ORDER BY n.nspname, c.cfgname
        "#;

        let schemas: Vec<String> = SYSTEM_SCHEMAS.iter().map(|s| s.to_string()).collect();
        let rows = client.query(query, &[&schemas]).await?;
        let configs = rows
            .iter()
            .map(|row| FtsConfiguration {
                schema: row.get(0),
                name: row.get(1),
            })
            .collect::<Vec<_>>();

        debug!("Loaded {} FTS configurations", configs.len());
        Ok(configs)
    }

    async fn triggers(&self, table: &str) -> Result<Vec<Trigger>> {
        let client = self.client("getting connection for triggers").await?;

        let query = r#"
            SELECT t.tgname, pg_get_triggerdef(t.oid)
            FROM pg_trigger t
            JOIN pg_class c ON c.oid = t.tgrelid
            WHERE c.relname = $1
              AND NOT t.tgisinternal
            ORDER BY t.tgname
        "#;

        let rows = client.query(query, &[&table]).await?;
        let triggers = rows
            .iter()
            .map(|row| Trigger {
                table: table.to_string(),
                name: row.get(0),
                definition: row.get(1),
            })
            .collect::<Vec<_>>();

        debug!("Loaded {} triggers for {}", triggers.len(), table);
        Ok(triggers)
    }

    async fn tables(&self) -> Result<Vec<String>> {
        let client = self.client("getting connection for tables").await?;

        let query = r#"
            SELECT c.relname
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relkind = 'r'
              AND n.nspname <> ALL($1)
            ORDER BY c.relname
        "#;

        let schemas: Vec<String> = SYSTEM_SCHEMAS.iter().map(|s| s.to_string()).collect();
        let rows = client.query(query, &[&schemas]).await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn close(&self) {
        self.pool.close();
    }
}

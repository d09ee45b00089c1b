//! Idempotent SQL statement assembly.
//!
//! One statement per catalog record: guarded `CREATE` for types and FTS
//! configurations, `CREATE OR REPLACE` for functions and aggregates, and
//! the sanitized definition verbatim for triggers (the caller drops all
//! triggers before replay). A shared formatting pass keeps emitted files
//! human-diffable.

use regex::Regex;
use std::sync::LazyLock;

use crate::catalog::{Aggregate, CompositeType, EnumType, FtsConfiguration, Function, Trigger};
use crate::config::ExportConfig;
use crate::sanitize::{
    apply_aggregate_rules, normalize_whitespace, sanitize_function_body, TriggerSanitizer,
};

static TYPE_KEYWORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(AS|BEGIN|END|LANGUAGE|CREATE)\b").expect("valid keyword set"));

static FUNCTION_KEYWORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(BEGIN|END|LANGUAGE|SET|WHERE)\b").expect("valid keyword set"));

static TRIGGER_KEYWORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(FOR EACH ROW|EXECUTE FUNCTION|AFTER|BEFORE|WHEN)\b")
        .expect("valid keyword set")
});

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid blank-run pattern"));

static TRAILING_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+\n").expect("valid trailing-space pattern"));

/// Keyword boundary set used by the formatting pass.
#[derive(Debug, Clone, Copy)]
pub enum KeywordSet {
    /// Types, FTS configurations, aggregates.
    Type,
    /// Stored functions.
    Function,
    /// Triggers.
    Trigger,
}

impl KeywordSet {
    fn regex(&self) -> &'static Regex {
        match self {
            KeywordSet::Type => &TYPE_KEYWORDS_RE,
            KeywordSet::Function => &FUNCTION_KEYWORDS_RE,
            KeywordSet::Trigger => &TRIGGER_KEYWORDS_RE,
        }
    }
}

/// Shared formatting pass: normalized whitespace, a newline before each
/// keyword boundary, exactly one trailing statement terminator.
pub fn format_statement(sql: &str, keywords: KeywordSet) -> String {
    let normalized = normalize_whitespace(sql);
    let broken = keywords.regex().replace_all(&normalized, "\n${1}");
    let stripped = TRAILING_SPACE_RE.replace_all(&broken, "\n");
    let collapsed = BLANK_RUN_RE.replace_all(&stripped, "\n");
    let body = collapsed.trim().trim_end_matches(';').trim_end();
    format!("{};", body)
}

/// Assembles the final idempotent statement for each object kind.
pub struct SqlReconstructor {
    target_schema: String,
    trigger_sanitizer: TriggerSanitizer,
}

impl SqlReconstructor {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            target_schema: config.target_schema.clone(),
            trigger_sanitizer: TriggerSanitizer::new(
                config.source_schema.as_deref(),
                &config.target_schema,
            ),
        }
    }

    /// Guarded enum type creation.
    pub fn enum_type(&self, record: &EnumType) -> String {
        let statement = format!(
            "DO $$\nBEGIN\nIF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = '{name}') THEN\n\
             CREATE TYPE {name} AS ENUM ({labels});\nEND IF;\nEND\n$$;",
            name = record.name,
            labels = record.labels.join(", "),
        );
        format_statement(&statement, KeywordSet::Type)
    }

    /// Guarded composite type creation.
    pub fn composite_type(&self, record: &CompositeType) -> String {
        let statement = format!(
            "DO $$\nBEGIN\nIF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = '{name}') THEN\n\
             CREATE TYPE {name} AS ({attributes});\nEND IF;\nEND\n$$;",
            name = record.name,
            attributes = record.attributes,
        );
        format_statement(&statement, KeywordSet::Type)
    }

    /// `CREATE OR REPLACE FUNCTION`, inherently idempotent.
    ///
    /// A wrapped body forces PL/pgSQL; the catalog language is kept
    /// otherwise.
    pub fn function(&self, record: &Function) -> String {
        let body = sanitize_function_body(&record.body);
        let language = if body.wrapped {
            "plpgsql"
        } else {
            record.language.as_str()
        };

        let statement = format!(
            "CREATE OR REPLACE FUNCTION {}({})\nRETURNS {} AS $$\n{}\n$$ LANGUAGE {} {};",
            record.name,
            record.arguments,
            record.return_type,
            body.text,
            language,
            record.volatility.as_str(),
        );
        format_statement(&statement, KeywordSet::Function)
    }

    /// `CREATE OR REPLACE AGGREGATE` with optional clauses present only
    /// when the corresponding record field is set, then one pass of the
    /// aggregate repair rules.
    pub fn aggregate(&self, record: &Aggregate) -> String {
        let mut clauses = vec![
            format!("SFUNC = {}", record.transition_fn),
            format!("STYPE = {}", record.state_type),
        ];
        if let Some(ref f) = record.final_fn {
            clauses.push(format!("FINALFUNC = {}", f));
        }
        if let Some(modify) = record.finalfunc_modify {
            clauses.push(format!("FINALFUNC_MODIFY = {}", modify.as_str()));
        }
        if let Some(ref f) = record.combine_fn {
            clauses.push(format!("COMBINEFUNC = {}", f));
        }
        if let Some(ref f) = record.serial_fn {
            clauses.push(format!("SERIALFUNC = {}", f));
        }
        if let Some(ref f) = record.deserial_fn {
            clauses.push(format!("DESERIALFUNC = {}", f));
        }
        if let Some(ref init) = record.initial_value {
            clauses.push(format!("INITCOND = '{}'", init.replace('\'', "''")));
        }

        let statement = format!(
            "CREATE OR REPLACE AGGREGATE {}.{} ({}) ({});",
            self.target_schema,
            record.name,
            record.argument_types,
            clauses.join(", "),
        );
        format_statement(&apply_aggregate_rules(&statement), KeywordSet::Type)
    }

    /// Guarded text search configuration creation.
    pub fn fts_configuration(&self, record: &FtsConfiguration) -> String {
        let statement = format!(
            "DO $$ BEGIN \
             IF NOT EXISTS (SELECT 1 FROM pg_ts_config WHERE cfgname = '{name}') THEN \
             CREATE TEXT SEARCH CONFIGURATION {name} (COPY = simple); \
             END IF; \
             END $$;",
            name = record.name,
        );
        format_statement(&statement, KeywordSet::Type)
    }

    /// Sanitized trigger definition, no existence guard.
    pub fn trigger(&self, record: &Trigger) -> String {
        let sanitized = self.trigger_sanitizer.sanitize(&record.definition);
        format_statement(&sanitized, KeywordSet::Trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FinalFuncModify, Volatility};
    use crate::config::ExportConfig;

    fn reconstructor() -> SqlReconstructor {
        SqlReconstructor::new(&ExportConfig::default())
    }

    fn sample_aggregate() -> Aggregate {
        Aggregate {
            name: "accum".into(),
            argument_types: "int8".into(),
            state_type: "int8".into(),
            transition_fn: "int8_accum".into(),
            final_fn: None,
            combine_fn: None,
            serial_fn: None,
            deserial_fn: None,
            initial_value: None,
            finalfunc_modify: None,
        }
    }

    #[test]
    fn test_enum_type_is_guarded() {
        let sql = reconstructor().enum_type(&EnumType {
            name: "order_status".into(),
            labels: vec!["'new'".into(), "'shipped'".into()],
        });
        assert!(sql.contains("IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'order_status')"));
        assert!(sql.contains("TYPE order_status"));
        assert!(sql.contains("ENUM ('new', 'shipped')"));
        assert!(sql.ends_with("$$;"));
        // exactly one CREATE so a second execution is a no-op
        assert_eq!(sql.matches("CREATE").count(), 1);
    }

    #[test]
    fn test_composite_type_attributes() {
        let sql = reconstructor().composite_type(&CompositeType {
            name: "money_amount".into(),
            attributes: "amount numeric, currency text".into(),
        });
        assert!(sql.contains("typname = 'money_amount'"));
        assert!(sql.contains("(amount numeric, currency text);"));
    }

    #[test]
    fn test_function_wrap_scenario() {
        let sql = reconstructor().function(&Function {
            name: "f".into(),
            arguments: "a int".into(),
            return_type: "int".into(),
            body: "RETURN a + 1".into(),
            volatility: Volatility::Volatile,
            language: "sql".into(),
        });
        assert_eq!(
            sql,
            "CREATE OR REPLACE FUNCTION f(a int)\nRETURNS int AS $$\nBEGIN\nRETURN a + 1;\n\
             END;\n$$\nLANGUAGE plpgsql VOLATILE;"
        );
    }

    #[test]
    fn test_function_with_begin_keeps_language() {
        let sql = reconstructor().function(&Function {
            name: "touch".into(),
            arguments: "".into(),
            return_type: "trigger".into(),
            body: "BEGIN NEW.updated_at := now(); RETURN NEW; END".into(),
            volatility: Volatility::Volatile,
            language: "plpgsql".into(),
        });
        assert!(sql.starts_with("CREATE OR REPLACE FUNCTION touch()"));
        assert!(sql.contains("LANGUAGE plpgsql VOLATILE;"));
        // body reused as-is, not re-wrapped
        assert_eq!(sql.matches("BEGIN").count(), 1);
    }

    #[test]
    fn test_aggregate_minimal_clauses() {
        let sql = reconstructor().aggregate(&sample_aggregate());
        assert_eq!(
            sql,
            "CREATE OR REPLACE AGGREGATE public.accum (int8) (SFUNC = int8_accum, STYPE = int8);"
        );
    }

    #[test]
    fn test_aggregate_absent_finalfunc_not_emitted() {
        let mut record = sample_aggregate();
        record.initial_value = Some("0".into());
        let sql = reconstructor().aggregate(&record);
        assert!(!sql.contains("FINALFUNC"));
        assert!(!sql.contains("COMBINEFUNC"));
        assert!(sql.contains("INITCOND = '0'"));
    }

    #[test]
    fn test_aggregate_full_clauses() {
        let mut record = sample_aggregate();
        record.final_fn = Some("int8_final".into());
        record.finalfunc_modify = Some(FinalFuncModify::ReadOnly);
        record.combine_fn = Some("int8_combine".into());
        let sql = reconstructor().aggregate(&record);
        assert!(sql.contains("FINALFUNC = int8_final"));
        assert!(sql.contains("FINALFUNC_MODIFY = READ_ONLY"));
        assert!(sql.contains("COMBINEFUNC = int8_combine"));
        // no moving-aggregate clauses are reconstructed, so a modifier
        // for them must never appear either
        assert!(!sql.contains("MFINALFUNC_MODIFY"));
    }

    #[test]
    fn test_fts_configuration_is_guarded() {
        let sql = reconstructor().fts_configuration(&FtsConfiguration {
            schema: "public".into(),
            name: "unaccent_search".into(),
        });
        assert!(sql.contains("IF NOT EXISTS (SELECT 1 FROM pg_ts_config WHERE cfgname = 'unaccent_search')"));
        assert!(sql.contains("TEXT SEARCH CONFIGURATION unaccent_search (COPY = simple)"));
    }

    #[test]
    fn test_trigger_formatting_breaks_keywords() {
        let config = ExportConfig {
            source_schema: Some("myapp".into()),
            ..ExportConfig::default()
        };
        let sql = SqlReconstructor::new(&config).trigger(&Trigger {
            table: "orders".into(),
            name: "audit".into(),
            definition: "CREATE TRIGGER audit AFTER UPDATE ON myapp.orders \
                         FOR EACH ROW EXECUTE FUNCTION myapp.log_change()"
                .into(),
        });
        assert_eq!(
            sql,
            "CREATE TRIGGER audit\nAFTER UPDATE ON orders\nFOR EACH ROW\n\
             EXECUTE FUNCTION public.log_change();"
        );
    }

    #[test]
    fn test_format_statement_single_terminator() {
        let out = format_statement("SELECT 1;;", KeywordSet::Type);
        assert_eq!(out, "SELECT 1;");
    }
}

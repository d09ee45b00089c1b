//! Per-kind definition sanitizers.
//!
//! Pure text-to-text transforms that turn raw catalog-extracted
//! definitions into syntactically coherent SQL fragments. The fragments
//! are always catalog-generated, never arbitrary user SQL, so regex
//! surgery is sufficient here.

mod rules;

pub use rules::{apply_aggregate_rules, RewriteRule, AGGREGATE_RULES};

use regex::Regex;
use std::sync::LazyLock;

static BEGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*BEGIN\b").expect("valid BEGIN pattern"));

static ON_QUALIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bON\s+(?:[A-Za-z_][A-Za-z0-9_$]*\.)+([A-Za-z_][A-Za-z0-9_$]*)")
        .expect("valid ON qualifier pattern")
});

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid blank-run pattern"));

static LINE_INDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]+").expect("valid indent pattern"));

/// A function body after repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedBody {
    pub text: String,
    /// True when the body had to be wrapped in `BEGIN .. END;`.
    /// A wrapped body is PL/pgSQL regardless of the catalog language.
    pub wrapped: bool,
}

/// Repair a raw `prosrc` function body.
///
/// Trailing semicolons are stripped and a single terminator restored. A
/// body that does not already open with `BEGIN` (case-insensitive,
/// leading whitespace ignored) is wrapped in an explicit block.
pub fn sanitize_function_body(raw: &str) -> SanitizedBody {
    let stripped = raw.trim().trim_end_matches(';').trim_end();

    if BEGIN_RE.is_match(stripped) {
        SanitizedBody {
            text: format!("{};", stripped),
            wrapped: false,
        }
    } else {
        SanitizedBody {
            text: format!("BEGIN\n{};\nEND;", stripped),
            wrapped: true,
        }
    }
}

/// Trigger definition sanitizer.
///
/// Reduces dotted qualifiers in the `ON <schema.>table` clause to the
/// bare table name and rewrites the configured application schema to the
/// canonical target schema everywhere else in the definition.
pub struct TriggerSanitizer {
    rewrite: Option<(Regex, String)>,
}

impl TriggerSanitizer {
    /// Build a sanitizer. `source_schema` is the tenant schema to
    /// rewrite; no schema rewrite happens when it is `None`.
    pub fn new(source_schema: Option<&str>, target_schema: &str) -> Self {
        let rewrite = source_schema.map(|schema| {
            let pattern = Regex::new(&format!(r"\b{}\.", regex::escape(schema)))
                .expect("valid schema rewrite pattern");
            (pattern, format!("{}.", target_schema))
        });
        Self { rewrite }
    }

    /// Sanitize one raw trigger definition.
    pub fn sanitize(&self, definition: &str) -> String {
        let bare = ON_QUALIFIER_RE.replace_all(definition, "ON ${1}");
        match &self.rewrite {
            Some((pattern, target)) => pattern.replace_all(&bare, target.as_str()).into_owned(),
            None => bare.into_owned(),
        }
    }
}

/// Collapse runs of newlines to one and strip leading indentation per
/// line. Shared by every emitted statement.
pub fn normalize_whitespace(sql: &str) -> String {
    let collapsed = BLANK_RUN_RE.replace_all(sql, "\n");
    LINE_INDENT_RE.replace_all(&collapsed, "").trim().to_string()
}

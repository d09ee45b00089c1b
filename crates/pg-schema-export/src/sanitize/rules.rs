//! Aggregate clause-repair rule table.
//!
//! Each rule is a named (pattern -> replacement) pair so it can be unit
//! tested on its own. The table runs exactly once, in order, over an
//! assembled aggregate definition; there is no second stripping pass at
//! reconstruction time.

use regex::Regex;
use std::sync::LazyLock;

/// One textual repair rule.
pub struct RewriteRule {
    /// Stable name used in tests.
    pub name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

impl RewriteRule {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("valid rewrite rule pattern"),
            replacement,
        }
    }

    /// Apply this rule to the input, replacing every occurrence.
    pub fn apply(&self, input: &str) -> String {
        self.pattern.replace_all(input, self.replacement).into_owned()
    }
}

const OPTIONAL_CLAUSES: &str =
    "FINALFUNC|FINALFUNC_MODIFY|COMBINEFUNC|SERIALFUNC|DESERIALFUNC";

/// Repair rules for aggregate definitions, applied in order.
pub static AGGREGATE_RULES: LazyLock<Vec<RewriteRule>> = LazyLock::new(|| {
    vec![
        // Optional clause whose value is the catalog's "no function" marker
        RewriteRule::new(
            "drop-marker-clause",
            &format!(r",\s*(?:{OPTIONAL_CLAUSES})\s*=\s*-"),
            "",
        ),
        // Same, when the clause has no leading comma (first in the list)
        RewriteRule::new(
            "drop-dangling-marker-clause",
            &format!(r"\b(?:{OPTIONAL_CLAUSES})\s*=\s*-\s*,?"),
            "",
        ),
        // Optional clause with an empty value
        RewriteRule::new(
            "drop-empty-clause",
            &format!(r",\s*(?:{OPTIONAL_CLAUSES})\s*=\s*([,)])"),
            "${1}",
        ),
        // Missing separator between the transition-fn and state-type clauses
        RewriteRule::new(
            "insert-sfunc-stype-comma",
            r"(SFUNC\s*=\s*[^\s,]+)\s+(STYPE)",
            "${1}, ${2}",
        ),
        // Trailing comma left behind before the closing parenthesis
        RewriteRule::new("strip-trailing-comma", r",\s*\)", ")"),
        // Doubled statement terminator
        RewriteRule::new("collapse-terminator", r";{2,}", ";"),
        // Whitespace runs
        RewriteRule::new("collapse-whitespace", r"\s{2,}", " "),
    ]
});

/// Run the full aggregate rule table over one definition.
pub fn apply_aggregate_rules(sql: &str) -> String {
    let repaired = AGGREGATE_RULES
        .iter()
        .fold(sql.to_string(), |acc, rule| rule.apply(&acc));
    repaired.trim().to_string()
}

//! Typed catalog records.
//!
//! Every record is built fresh at the catalog boundary for a single export
//! run and consumed read-only downstream. Optional aggregate slots use
//! `Option` instead of the catalog's `"-"` marker; the marker never leaves
//! this module.

use serde::{Deserialize, Serialize};

/// Sentinel body stored when the catalog has no source for a function.
pub const INVALID_FUNCTION_BODY: &str = "Invalid Function Body";

/// Catalog marker meaning "no function configured" for an aggregate slot.
pub const NO_FUNCTION_MARKER: &str = "-";

/// Function volatility classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Volatility {
    Immutable,
    Stable,
    Volatile,
    Unknown,
}

impl Volatility {
    /// Decode the single-char `pg_proc.provolatile` flag.
    pub fn from_flag(flag: &str) -> Self {
        match flag {
            "i" => Volatility::Immutable,
            "s" => Volatility::Stable,
            "v" => Volatility::Volatile,
            _ => Volatility::Unknown,
        }
    }

    /// SQL keyword for the reconstructed statement.
    pub fn as_str(&self) -> &'static str {
        match self {
            Volatility::Immutable => "IMMUTABLE",
            Volatility::Stable => "STABLE",
            Volatility::Volatile => "VOLATILE",
            Volatility::Unknown => "UNKNOWN",
        }
    }
}

/// FINALFUNC_MODIFY flag of an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalFuncModify {
    ReadOnly,
    Shareable,
    ReadWrite,
}

impl FinalFuncModify {
    /// Decode the single-char `pg_aggregate.aggfinalmodify` flag.
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "r" => Some(FinalFuncModify::ReadOnly),
            "s" => Some(FinalFuncModify::Shareable),
            "w" => Some(FinalFuncModify::ReadWrite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinalFuncModify::ReadOnly => "READ_ONLY",
            FinalFuncModify::Shareable => "SHAREABLE",
            FinalFuncModify::ReadWrite => "READ_WRITE",
        }
    }
}

/// An enum type with its ordered, already-quoted label literals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    /// Label literals as returned by `quote_literal`, in sort order.
    pub labels: Vec<String>,
}

/// A composite type with its attribute-list text (`name type, ...`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeType {
    pub name: String,
    pub attributes: String,
}

/// A stored function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// Argument-list text from `pg_get_function_arguments`.
    pub arguments: String,
    /// Return-type text from `pg_get_function_result`.
    pub return_type: String,
    /// Raw `prosrc`; [`INVALID_FUNCTION_BODY`] when the catalog has none.
    pub body: String,
    pub volatility: Volatility,
    pub language: String,
}

/// A custom aggregate. Absent optional slots are `None` and must be
/// omitted entirely from the reconstructed SQL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregate {
    pub name: String,
    /// Argument-type text from `pg_get_function_identity_arguments`.
    pub argument_types: String,
    pub state_type: String,
    pub transition_fn: String,
    pub final_fn: Option<String>,
    pub combine_fn: Option<String>,
    pub serial_fn: Option<String>,
    pub deserial_fn: Option<String>,
    pub initial_value: Option<String>,
    pub finalfunc_modify: Option<FinalFuncModify>,
}

/// A full-text-search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtsConfiguration {
    pub schema: String,
    pub name: String,
}

/// A row-level trigger on one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    /// Owning table, bare name.
    pub table: String,
    pub name: String,
    /// Raw definition text from `pg_get_triggerdef`.
    pub definition: String,
}

/// Normalize an optional catalog function slot: NULL, empty and the
/// `"-"` marker all mean "not configured".
pub fn optional_fn(value: Option<String>) -> Option<String> {
    match value {
        Some(v) if v.is_empty() || v == NO_FUNCTION_MARKER => None,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatility_decoding() {
        assert_eq!(Volatility::from_flag("i"), Volatility::Immutable);
        assert_eq!(Volatility::from_flag("s"), Volatility::Stable);
        assert_eq!(Volatility::from_flag("v"), Volatility::Volatile);
        assert_eq!(Volatility::from_flag("x"), Volatility::Unknown);
        assert_eq!(Volatility::Volatile.as_str(), "VOLATILE");
    }

    #[test]
    fn test_finalfunc_modify_decoding() {
        assert_eq!(
            FinalFuncModify::from_flag("r"),
            Some(FinalFuncModify::ReadOnly)
        );
        assert_eq!(
            FinalFuncModify::from_flag("w"),
            Some(FinalFuncModify::ReadWrite)
        );
        assert_eq!(FinalFuncModify::from_flag("?"), None);
        assert_eq!(FinalFuncModify::Shareable.as_str(), "SHAREABLE");
    }

    #[test]
    fn test_optional_fn_normalization() {
        assert_eq!(optional_fn(None), None);
        assert_eq!(optional_fn(Some("-".into())), None);
        assert_eq!(optional_fn(Some(String::new())), None);
        assert_eq!(optional_fn(Some("int8_sum".into())), Some("int8_sum".into()));
    }
}

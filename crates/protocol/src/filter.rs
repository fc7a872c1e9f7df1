use crate::record::{CatalogRecord, FieldValue};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Compiled `Matches` patterns, shared by every evaluation. A pattern is
/// compiled once per process; a malformed one is logged once and matches
/// nothing thereafter.
static COMPILED_PATTERNS: Lazy<Mutex<HashMap<String, Option<Regex>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn compiled(pattern: &str) -> Option<Regex> {
    let mut cache = COMPILED_PATTERNS.lock().expect("pattern cache lock");
    cache
        .entry(pattern.to_string())
        .or_insert_with(|| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(err) => {
                log::warn!("malformed filter pattern `{pattern}`: {err}");
                None
            }
        })
        .clone()
}

/// Declarative record predicate.
///
/// This is the entire query surface the engine is allowed to use: remote
/// adapters translate it into their own dialect, and [`Filter::matches`]
/// gives the reference in-memory semantics every adapter must agree with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Filter {
    All,
    Equals { field: String, value: FieldValue },
    IsNull { field: String },
    Matches { field: String, pattern: String },
    InSet { field: String, values: Vec<String> },
    And { clauses: Vec<Filter> },
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: FieldValue) -> Self {
        Filter::Equals {
            field: field.into(),
            value,
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Filter::IsNull {
            field: field.into(),
        }
    }

    pub fn matches(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Matches {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn and(clauses: Vec<Filter>) -> Self {
        Filter::And { clauses }
    }

    /// Reference evaluation against one record. An absent field counts as
    /// null. A malformed `Matches` pattern matches nothing.
    pub fn matches_record(&self, record: &CatalogRecord) -> bool {
        match self {
            Filter::All => true,
            Filter::Equals { field, value } => {
                record.field(field).unwrap_or(&FieldValue::Null) == value
            }
            Filter::IsNull { field } => record
                .field(field)
                .map_or(true, FieldValue::is_null),
            Filter::Matches { field, pattern } => {
                let Some(text) = record.text(field) else {
                    return false;
                };
                compiled(pattern).is_some_and(|re| re.is_match(text))
            }
            Filter::InSet { field, values } => record
                .text(field)
                .is_some_and(|text| values.iter().any(|v| v == text)),
            Filter::And { clauses } => clauses.iter().all(|c| c.matches_record(record)),
        }
    }
}

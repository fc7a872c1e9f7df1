use serde::{Deserialize, Serialize};

pub mod filter;
pub mod record;
pub mod report;

pub use filter::Filter;
pub use record::{
    CatalogRecord, CategoryView, FieldValue, ProductView, ProfileView, RecordId, RecordKind, Role,
    VariantView, ALL_KINDS,
};
pub use report::{FailedItem, ManualReviewItem, ReportNote, RunMode, RunReport};

/// Slug shape accepted everywhere a slug is read or written.
pub const SLUG_PATTERN: &str = "^[a-z0-9]+(-[a-z0-9]+)*$";

/// Minimal field-level diff proposed by a rule for one record.
///
/// A patch never carries fields whose value already matches the record;
/// [`PatchBuilder`] drops those at construction time so an "empty" repair
/// silently collapses into a compliant verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patch {
    pub rule: String,
    pub reason: String,
    pub changes: std::collections::BTreeMap<String, FieldValue>,
    /// Fields whose final value must be store-unique for the record's kind.
    /// The applier re-verifies these after a commit to close the window
    /// between resolution and write.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_fields: Vec<String>,
}

impl Patch {
    pub fn builder(rule: impl Into<String>, record: &CatalogRecord) -> PatchBuilder<'_> {
        PatchBuilder {
            rule: rule.into(),
            record,
            reason: String::new(),
            changes: std::collections::BTreeMap::new(),
            unique_fields: Vec::new(),
        }
    }
}

/// Builds a [`Patch`] against a specific record, keeping only real diffs.
pub struct PatchBuilder<'a> {
    rule: String,
    record: &'a CatalogRecord,
    reason: String,
    changes: std::collections::BTreeMap<String, FieldValue>,
    unique_fields: Vec<String>,
}

impl PatchBuilder<'_> {
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn set(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        let field = field.into();
        if self.record.field(&field) != Some(&value) {
            self.changes.insert(field, value);
        }
        self
    }

    pub fn unique(mut self, field: impl Into<String>) -> Self {
        self.unique_fields.push(field.into());
        self
    }

    /// Finish the patch, or `None` when every proposed value already holds.
    pub fn build(self) -> Option<Patch> {
        if self.changes.is_empty() {
            return None;
        }
        let unique_fields = self
            .unique_fields
            .into_iter()
            .filter(|f| self.changes.contains_key(f))
            .collect();
        Some(Patch {
            rule: self.rule,
            reason: self.reason,
            changes: self.changes,
            unique_fields,
        })
    }
}

/// Result of evaluating one rule against one record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum RuleVerdict {
    /// No defect this rule recognizes.
    Compliant,
    /// Corrective diff to apply.
    Patch(Patch),
    /// Defect detected but not auto-correctable; surfaced to the operator.
    ManualReview { rule: String, reason: String },
    /// Reporting-only finding; no write ever follows.
    Report { rule: String, note: String },
}

/// Outcome of pushing one patch at the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ApplyOutcome {
    Applied,
    /// Dry-run: the patch was computed and reported, nothing was written.
    SkippedDryRun,
    Failed { kind: FailureKind, detail: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Optimistic-version mismatch; the record changed since read.
    /// Recovery is re-evaluation on the next run, never blind retry.
    Conflict,
    /// Transport timeout / 5xx-equivalent that survived bounded retries.
    Transient,
    /// Suffix probing ran out of attempts for a store-unique value.
    UniquenessExhausted,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            FailureKind::Conflict => "conflict",
            FailureKind::Transient => "transient",
            FailureKind::UniquenessExhausted => "uniqueness_exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn product(slug: Option<&str>) -> CatalogRecord {
        let mut rec = CatalogRecord::new(RecordId::from("p1"), RecordKind::Product, 3);
        rec.set_field("name", FieldValue::text("Widget"));
        match slug {
            Some(s) => rec.set_field("slug", FieldValue::text(s)),
            None => rec.set_field("slug", FieldValue::Null),
        }
        rec
    }

    #[test]
    fn builder_drops_unchanged_fields() {
        let rec = product(Some("widget"));
        let patch = Patch::builder("slug", &rec)
            .reason("derive slug")
            .set("slug", FieldValue::text("widget"))
            .build();
        assert_eq!(patch, None);
    }

    #[test]
    fn builder_keeps_real_diffs() {
        let rec = product(None);
        let patch = Patch::builder("slug", &rec)
            .reason("derive slug")
            .set("slug", FieldValue::text("widget"))
            .unique("slug")
            .build()
            .expect("non-empty patch");
        assert_eq!(patch.changes.len(), 1);
        assert_eq!(patch.unique_fields, vec!["slug".to_string()]);
    }

    #[test]
    fn unique_marker_requires_a_change() {
        let rec = product(Some("widget"));
        let patch = Patch::builder("slug", &rec)
            .set("slug", FieldValue::text("widget"))
            .set("is_active", FieldValue::Bool(true))
            .unique("slug")
            .build()
            .expect("is_active still differs");
        assert!(patch.unique_fields.is_empty());
        assert!(patch.changes.contains_key("is_active"));
    }
}

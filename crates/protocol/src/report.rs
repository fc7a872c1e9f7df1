use crate::record::{RecordId, RecordKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    DryRun,
    Commit,
}

impl RunMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            RunMode::DryRun => "dry_run",
            RunMode::Commit => "commit",
        }
    }

    pub const fn is_commit(self) -> bool {
        matches!(self, RunMode::Commit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualReviewItem {
    pub kind: RecordKind,
    pub id: RecordId,
    pub rule: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedItem {
    pub kind: RecordKind,
    pub id: RecordId,
    pub rule: String,
    pub failure: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportNote {
    pub kind: RecordKind,
    pub id: RecordId,
    pub rule: String,
    pub note: String,
}

/// Structured summary of one reconciliation run.
///
/// Per-record failures live here instead of aborting the run; only a
/// source-level failure flips `aborted`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub mode: RunMode,
    pub scanned: u64,
    pub patched: u64,
    pub skipped: u64,
    pub manual_review: Vec<ManualReviewItem>,
    pub failed: Vec<FailedItem>,
    pub report_notes: Vec<ReportNote>,
    pub rule_counts: BTreeMap<String, u64>,
    pub aborted: bool,
}

impl RunReport {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            scanned: 0,
            patched: 0,
            skipped: 0,
            manual_review: Vec::new(),
            failed: Vec::new(),
            report_notes: Vec::new(),
            rule_counts: BTreeMap::new(),
            aborted: false,
        }
    }

    pub fn count_rule(&mut self, rule: &str) {
        *self.rule_counts.entry(rule.to_string()).or_insert(0) += 1;
    }

    /// Fold a page-level (or kind-level) report into the run total.
    pub fn merge(&mut self, other: RunReport) {
        self.scanned += other.scanned;
        self.patched += other.patched;
        self.skipped += other.skipped;
        self.manual_review.extend(other.manual_review);
        self.failed.extend(other.failed);
        self.report_notes.extend(other.report_notes);
        for (rule, count) in other.rule_counts {
            *self.rule_counts.entry(rule).or_insert(0) += count;
        }
        self.aborted |= other.aborted;
    }

    /// A run "completed" when it reached the end of its scan, even if some
    /// individual records failed. Exit codes key off this.
    pub fn completed(&self) -> bool {
        !self.aborted
    }
}

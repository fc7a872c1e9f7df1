use crate::applier::PatchApplier;
use crate::cancel::CancellationFlag;
use crate::config::EngineConfig;
use catalog_protocol::{
    ApplyOutcome, CatalogRecord, FailedItem, Filter, ManualReviewItem, RecordKind, ReportNote,
    RuleVerdict, RunMode, RunReport,
};
use catalog_rules::{InvariantRule, RuleContext, RuleError, RuleRegistry};
use catalog_store::{CatalogStore, PrincipalDirectory, RecordSource, Throttle};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run lifecycle, visible in logs at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scanning(RecordKind),
    Evaluating,
    Applying,
    Reporting,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Scanning(kind) => write!(f, "scanning({kind})"),
            RunState::Evaluating => f.write_str("evaluating"),
            RunState::Applying => f.write_str("applying"),
            RunState::Reporting => f.write_str("reporting"),
            RunState::Done => f.write_str("done"),
            RunState::Aborted => f.write_str("aborted"),
        }
    }
}

/// Orchestrates one reconciliation pass: paginate each kind, evaluate the
/// registry per record, apply the first non-compliant verdict, aggregate
/// the run report.
///
/// Per-record failures never abort the run; a source failure that
/// survives page-level retries does.
pub struct Reconciler {
    source: RecordSource,
    registry: Arc<RuleRegistry>,
    ctx: Arc<RuleContext>,
    applier: Arc<PatchApplier>,
    config: EngineConfig,
    cancel: CancellationFlag,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        principals: Arc<dyn PrincipalDirectory>,
        registry: RuleRegistry,
        config: EngineConfig,
    ) -> Self {
        let settings = Arc::new(config.rules.clone());
        let ctx = Arc::new(RuleContext::new(
            store.clone(),
            principals,
            settings.clone(),
        ));
        let throttle = Arc::new(Throttle::new(config.throttle_interval()));
        let applier = Arc::new(PatchApplier::new(
            store.clone(),
            throttle,
            config.retry_policy(),
            config.request_timeout(),
            settings.max_suffix_attempts,
        ));
        let source = RecordSource::new(
            store,
            config.retry_policy(),
            config.page_size,
            config.request_timeout(),
        );
        Self {
            source,
            registry: Arc::new(registry),
            ctx,
            applier,
            config,
            cancel: CancellationFlag::new(),
        }
    }

    /// Handle for cooperative cancellation between records.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub async fn run(&self, mode: RunMode) -> RunReport {
        let mut state = RunState::Idle;
        let mut report = RunReport::new(mode);
        log::info!(
            "reconciliation run starting ({}, rules: {:?})",
            mode.as_str(),
            self.registry.rule_names()
        );

        for kind in self.config.scan_order.clone() {
            if self.cancel.is_cancelled() {
                log::info!("run cancelled before scanning {kind}");
                break;
            }
            advance(&mut state, RunState::Scanning(kind));
            if !self.scan_kind(kind, mode, &mut report).await {
                advance(&mut state, RunState::Aborted);
                report.aborted = true;
                return report;
            }
        }

        advance(&mut state, RunState::Reporting);
        log::info!(
            "run complete: scanned={} patched={} skipped={} manual_review={} failed={}",
            report.scanned,
            report.patched,
            report.skipped,
            report.manual_review.len(),
            report.failed.len()
        );
        advance(&mut state, RunState::Done);
        report
    }

    /// Returns false when the kind's scan hit a fatal source failure.
    async fn scan_kind(&self, kind: RecordKind, mode: RunMode, report: &mut RunReport) -> bool {
        let mut cursor = None;
        loop {
            let page = match self.source.fetch_page(kind, &Filter::All, cursor).await {
                Ok(page) => page,
                Err(err) => {
                    log::error!("aborting run: cannot scan {kind}: {err}");
                    return false;
                }
            };
            let next_cursor = page.next_cursor.clone();
            self.process_page(page.records, mode, report).await;
            if self.cancel.is_cancelled() {
                log::info!("run cancelled during {kind} scan");
                return true;
            }
            match next_cursor {
                Some(next) => cursor = Some(next),
                None => return true,
            }
        }
    }

    /// Evaluate and apply a page of independent records with a bounded
    /// worker pool.
    async fn process_page(&self, records: Vec<CatalogRecord>, mode: RunMode, report: &mut RunReport) {
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = JoinSet::new();
        for record in records {
            if self.cancel.is_cancelled() {
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .unwrap_or_else(|_| unreachable!("worker semaphore closed"));
            let rules = self.registry.clone();
            let ctx = self.ctx.clone();
            let applier = self.applier.clone();
            tasks.spawn(async move {
                let _permit = permit;
                process_record(record, &rules, &ctx, &applier, mode).await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => fold_outcome(report, outcome),
                Err(err) => log::error!("record task panicked: {err}"),
            }
        }
    }
}

enum RecordOutcome {
    Clean,
    Patched { rule: String },
    Manual(ManualReviewItem),
    Note(ReportNote),
    Failed(FailedItem),
}

async fn process_record(
    record: CatalogRecord,
    registry: &RuleRegistry,
    ctx: &RuleContext,
    applier: &PatchApplier,
    mode: RunMode,
) -> RecordOutcome {
    for rule in registry.rules() {
        if !rule.applies_to(record.kind) || !rule.applies(&record) {
            continue;
        }
        let verdict = match rule.evaluate(&record, ctx).await {
            Ok(verdict) => verdict,
            Err(err) => return RecordOutcome::Failed(failed_item(&record, rule.as_ref(), err)),
        };
        match verdict {
            RuleVerdict::Compliant => continue,
            RuleVerdict::Patch(patch) => {
                let rule_name = patch.rule.clone();
                return match applier.apply(&record, &patch, mode).await {
                    ApplyOutcome::Applied | ApplyOutcome::SkippedDryRun => {
                        RecordOutcome::Patched { rule: rule_name }
                    }
                    ApplyOutcome::Failed { kind, detail } => RecordOutcome::Failed(FailedItem {
                        kind: record.kind,
                        id: record.id.clone(),
                        rule: rule_name,
                        failure: kind.as_str().to_string(),
                        detail,
                    }),
                };
            }
            RuleVerdict::ManualReview { rule, reason } => {
                return RecordOutcome::Manual(ManualReviewItem {
                    kind: record.kind,
                    id: record.id.clone(),
                    rule,
                    reason,
                })
            }
            RuleVerdict::Report { rule, note } => {
                return RecordOutcome::Note(ReportNote {
                    kind: record.kind,
                    id: record.id.clone(),
                    rule,
                    note,
                })
            }
        }
    }
    RecordOutcome::Clean
}

fn failed_item(record: &CatalogRecord, rule: &dyn InvariantRule, err: RuleError) -> FailedItem {
    let failure = match &err {
        RuleError::UniquenessExhausted { .. } => "uniqueness_exhausted",
        RuleError::Store(_) => "transient",
    };
    log::error!(
        "{} {} failed in rule `{}`: {err}",
        record.kind,
        record.id,
        rule.name()
    );
    FailedItem {
        kind: record.kind,
        id: record.id.clone(),
        rule: rule.name().to_string(),
        failure: failure.to_string(),
        detail: err.to_string(),
    }
}

fn fold_outcome(report: &mut RunReport, outcome: RecordOutcome) {
    report.scanned += 1;
    match outcome {
        RecordOutcome::Clean => report.skipped += 1,
        RecordOutcome::Patched { rule } => {
            report.patched += 1;
            report.count_rule(&rule);
        }
        RecordOutcome::Manual(item) => {
            report.count_rule(&item.rule);
            report.manual_review.push(item);
        }
        RecordOutcome::Note(note) => {
            report.count_rule(&note.rule);
            report.report_notes.push(note);
        }
        RecordOutcome::Failed(item) => {
            report.count_rule(&item.rule);
            report.failed.push(item);
        }
    }
}

fn advance(state: &mut RunState, next: RunState) {
    log::debug!("run state: {state} -> {next}");
    *state = next;
}

use catalog_protocol::RunReport;

/// Human summary of a run, printed after every invocation.
pub fn render_report(report: &RunReport) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Reconciliation report ({})\n\n", report.mode.as_str()));
    md.push_str(&format!("- Scanned: `{}`\n", report.scanned));
    md.push_str(&format!("- Patched: `{}`\n", report.patched));
    md.push_str(&format!("- Skipped (clean): `{}`\n", report.skipped));
    md.push_str(&format!(
        "- Manual review: `{}`\n",
        report.manual_review.len()
    ));
    md.push_str(&format!("- Failed: `{}`\n", report.failed.len()));
    md.push_str(&format!(
        "- Completed: `{}`\n\n",
        if report.aborted { "no (aborted)" } else { "yes" }
    ));

    if !report.rule_counts.is_empty() {
        md.push_str("## Rule activity\n\n");
        md.push_str("| rule | records |\n|---|---:|\n");
        for (rule, count) in &report.rule_counts {
            md.push_str(&format!("| `{rule}` | `{count}` |\n"));
        }
        md.push('\n');
    }

    if !report.manual_review.is_empty() {
        md.push_str("## Manual review required\n\n");
        md.push_str("| kind | id | rule | reason |\n|---|---|---|---|\n");
        for item in &report.manual_review {
            md.push_str(&format!(
                "| `{}` | `{}` | `{}` | {} |\n",
                item.kind,
                item.id,
                item.rule,
                escape_cell(&item.reason)
            ));
        }
        md.push('\n');
    }

    if !report.failed.is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| kind | id | rule | failure | detail |\n|---|---|---|---|---|\n");
        for item in &report.failed {
            md.push_str(&format!(
                "| `{}` | `{}` | `{}` | `{}` | {} |\n",
                item.kind,
                item.id,
                item.rule,
                item.failure,
                escape_cell(&item.detail)
            ));
        }
        md.push('\n');
    }

    if !report.report_notes.is_empty() {
        md.push_str("## Notes\n\n");
        for note in &report.report_notes {
            md.push_str(&format!(
                "- `{}` `{}` ({}): {}\n",
                note.kind,
                note.id,
                note.rule,
                escape_cell(&note.note)
            ));
        }
        md.push('\n');
    }

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

//! One-screen text summary of a format report.
use super::FormatReport;
use crate::config::{BaselineSource, FormatMode};
use crate::format::{FormatFingerprint, IssueCode, Severity};
use serde_json::Value;
use std::collections::BTreeMap;

const TOP_CODES: usize = 5;
const SHOWN_FIX_CHANGES: usize = 3;

/// Render `report` for a terminal. `command_base` is the invocation the
/// suggested next command extends.
pub fn render_summary(report: &FormatReport, command_base: &str) -> String {
    let summary = &report.summary;
    let mut lines = vec![
        "format_summary:".to_string(),
        format!(
            "format_mode={} format_fix_mode={} format_baseline={}",
            summary.mode, summary.fix_mode, summary.baseline_source
        ),
        format!(
            "result={}",
            if report.passed() { "PASSED" } else { "FAILED" }
        ),
    ];
    if summary.skipped {
        lines.push("format skipped: only replacement performed".to_string());
        lines.push("suggestion: none".to_string());
        lines.push("next_cmd: none".to_string());
        return lines.join("\n");
    }

    lines.push(format!(
        "observed: has_tables {}->{}",
        summary.template_observed.table_present, summary.rendered_observed.table_present
    ));
    lines.push(format!(
        "dominant_indent: {}->{}",
        dominant_indent(&summary.template_observed),
        dominant_indent(&summary.rendered_observed)
    ));

    let all = count_codes(report, None);
    let errors = count_codes(report, Some(Severity::Error));
    let warnings = count_codes(report, Some(Severity::Warn));
    lines.push(format!("issues: {}", top_codes(&all)));
    lines.push(format!("errors: {}", top_codes(&errors)));
    lines.push(format!("warnings: {}", top_codes(&warnings)));

    if summary.fix_changes.is_empty() {
        lines.push("fix: none".to_string());
    } else {
        lines.push(format!("fix: applied {} changes", summary.fix_changes.len()));
        for change in summary.fix_changes.iter().take(SHOWN_FIX_CHANGES) {
            lines.push(format!(
                "fix_change: {} {} {}->{}",
                change.paragraph_path,
                change.field,
                value_text(&change.before),
                value_text(&change.after)
            ));
        }
    }

    let (suggestion, next) = next_step(
        summary.mode,
        summary.baseline_source,
        !errors.is_empty(),
        !warnings.is_empty(),
    );
    lines.push(format!("suggestion: {suggestion}"));
    lines.push(format!(
        "next_cmd: {}",
        next.map_or_else(|| "none".to_string(), |flags| format!("{command_base} {flags}"))
    ));
    lines.join("\n")
}

fn dominant_indent(fingerprint: &FormatFingerprint) -> String {
    fingerprint
        .dominant_first_line_indent_twips
        .map_or_else(|| "none".to_string(), |twips| twips.to_string())
}

fn count_codes(report: &FormatReport, severity: Option<Severity>) -> BTreeMap<IssueCode, usize> {
    let mut counts = BTreeMap::new();
    for issue in &report.summary.diff {
        if severity.is_some_and(|wanted| wanted != issue.severity) {
            continue;
        }
        *counts.entry(issue.code).or_insert(0) += 1;
    }
    counts
}

fn top_codes(counts: &BTreeMap<IssueCode, usize>) -> String {
    if counts.is_empty() {
        return "none".to_string();
    }
    let mut items: Vec<(&IssueCode, &usize)> = counts.iter().collect();
    items.sort_by(|(a_code, a_count), (b_code, b_count)| {
        b_count
            .cmp(a_count)
            .then_with(|| a_code.as_str().cmp(b_code.as_str()))
    });
    items
        .into_iter()
        .take(TOP_CODES)
        .map(|(code, count)| format!("{code}={count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn next_step(
    mode: FormatMode,
    baseline: BaselineSource,
    has_errors: bool,
    has_warnings: bool,
) -> (&'static str, Option<&'static str>) {
    if has_errors {
        if mode == FormatMode::Strict {
            return (
                "strict mode failed on error-level issues; try --preset template or adjust policy. Use --format-report json for quieter output.",
                Some("--preset template"),
            );
        }
        return (
            "error-level issues detected; try --preset strict for gatekeeping. Use --format-report json for quieter output.",
            Some("--preset strict"),
        );
    }
    if !has_warnings {
        return ("none", None);
    }
    match baseline {
        BaselineSource::Policy => (
            "warn-only issues detected; output is usable. Try --format-baseline template. Use --format-report json for quieter output.",
            Some("--format-baseline template"),
        ),
        BaselineSource::Template => (
            "warn-only issues detected; output is usable. Try --preset template. Use --format-report json for quieter output.",
            Some("--preset template"),
        ),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "none".to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

//! Run artifacts: the format report and the four-artifact bundle.
use crate::config::{BaselineSource, FixMode, FormatMode, FormatOptions};
use crate::error::ExitStatus;
use crate::format::{
    Diagnostics, DiffIssue, FixChange, FormatFingerprint, ObservedDelta, PolicyBaseline, Severity,
};
use crate::substitute::{MissingFieldRecord, ReplaceLogEntry, SubstitutionStatus};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub mod human;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatSummary {
    pub mode: FormatMode,
    pub baseline_source: BaselineSource,
    pub fix_mode: FixMode,
    pub skipped: bool,
    pub passed: bool,
    pub error_count: usize,
    pub warn_count: usize,
    pub template_observed: FormatFingerprint,
    pub rendered_observed: FormatFingerprint,
    pub diff: Vec<DiffIssue>,
    pub observed_delta: ObservedDelta,
    pub baseline: Option<PolicyBaseline>,
    pub effective_policy_overrides: BTreeMap<String, Value>,
    pub diagnostics: Diagnostics,
    pub fix_changes: Vec<FixChange>,
    pub template_fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatReport {
    pub summary: FormatSummary,
}

/// Format-stage results the report is assembled from.
pub struct FormatOutcome {
    pub template_observed: FormatFingerprint,
    pub rendered_observed: FormatFingerprint,
    pub issues: Vec<DiffIssue>,
    pub baseline: Option<PolicyBaseline>,
    pub effective_policy_overrides: BTreeMap<String, Value>,
    pub diagnostics: Diagnostics,
    pub fix_changes: Vec<FixChange>,
}

impl FormatReport {
    pub fn build(options: FormatOptions, outcome: FormatOutcome, template_fingerprint: String) -> Self {
        let count = |severity: Severity| {
            outcome
                .issues
                .iter()
                .filter(|issue| issue.severity == severity)
                .count()
        };
        let error_count = count(Severity::Error);
        let warn_count = count(Severity::Warn);
        let skipped = options.mode == FormatMode::Off;
        let passed = skipped || options.mode == FormatMode::Report || error_count == 0;
        let observed_delta =
            crate::format::observed_delta(&outcome.template_observed, &outcome.rendered_observed);
        Self {
            summary: FormatSummary {
                mode: options.mode,
                baseline_source: options.baseline,
                fix_mode: options.fix,
                skipped,
                passed,
                error_count,
                warn_count,
                template_observed: outcome.template_observed,
                rendered_observed: outcome.rendered_observed,
                diff: outcome.issues,
                observed_delta,
                baseline: outcome.baseline,
                effective_policy_overrides: outcome.effective_policy_overrides,
                diagnostics: outcome.diagnostics,
                fix_changes: outcome.fix_changes,
                template_fingerprint,
            },
        }
    }

    pub fn passed(&self) -> bool {
        self.summary.passed
    }
}

/// Everything one successful invocation hands back.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub document: Vec<u8>,
    pub replace_log: Vec<ReplaceLogEntry>,
    pub missing_fields: Vec<MissingFieldRecord>,
    pub format_report: FormatReport,
    pub suggested_policy: Option<String>,
    pub status: ExitStatus,
}

/// Unsupported beats missing, missing beats a strict format failure.
pub fn final_status(substitution: SubstitutionStatus, format_passed: bool) -> ExitStatus {
    match substitution {
        SubstitutionStatus::TemplateUnsupported => ExitStatus::TemplateUnsupported,
        SubstitutionStatus::MissingRequired => ExitStatus::MissingRequired,
        SubstitutionStatus::Ok if !format_passed => ExitStatus::FormatFailure,
        SubstitutionStatus::Ok => ExitStatus::Ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::diff::DimensionValue;
    use crate::format::{IssueCode, Observability};

    fn issue(severity: Severity) -> DiffIssue {
        DiffIssue {
            code: IssueCode::RunFontMismatch,
            severity,
            observability: Observability::Observed,
            location: "p0:r0".to_string(),
            paragraph_path: None,
            run_refs: Vec::new(),
            observed_value: DimensionValue::Flag(true),
            expected_value: DimensionValue::Flag(false),
            fixable: false,
            suggestion: String::new(),
        }
    }

    fn outcome(issues: Vec<DiffIssue>) -> FormatOutcome {
        FormatOutcome {
            template_observed: FormatFingerprint::default(),
            rendered_observed: FormatFingerprint::default(),
            diagnostics: crate::format::summarize(&issues),
            issues,
            baseline: None,
            effective_policy_overrides: BTreeMap::new(),
            fix_changes: Vec::new(),
        }
    }

    #[test]
    fn strict_mode_fails_only_on_errors() {
        let strict = crate::config::Preset::Strict.options();
        let report = FormatReport::build(strict, outcome(vec![issue(Severity::Warn)]), String::new());
        assert!(report.passed());
        assert_eq!(report.summary.warn_count, 1);

        let report = FormatReport::build(strict, outcome(vec![issue(Severity::Error)]), String::new());
        assert!(!report.passed());
        assert_eq!(report.summary.error_count, 1);
    }

    #[test]
    fn report_mode_records_errors_without_failing() {
        let quick = crate::config::Preset::Quick.options();
        let report = FormatReport::build(quick, outcome(vec![issue(Severity::Error)]), String::new());
        assert!(report.passed());
        assert_eq!(report.summary.error_count, 1);
    }

    #[test]
    fn status_precedence() {
        assert_eq!(
            final_status(SubstitutionStatus::TemplateUnsupported, false),
            ExitStatus::TemplateUnsupported
        );
        assert_eq!(
            final_status(SubstitutionStatus::MissingRequired, false),
            ExitStatus::MissingRequired
        );
        assert_eq!(final_status(SubstitutionStatus::Ok, false), ExitStatus::FormatFailure);
        assert_eq!(final_status(SubstitutionStatus::Ok, true), ExitStatus::Ok);
    }

    #[test]
    fn summary_serializes_the_contract_keys() {
        let report = FormatReport::build(FormatOptions::default(), outcome(Vec::new()), "abc".to_string());
        let value = serde_json::to_value(&report).unwrap();
        for key in [
            "template_observed",
            "rendered_observed",
            "diff",
            "baseline",
            "effective_policy_overrides",
            "diagnostics",
        ] {
            assert!(value["summary"].get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["summary"]["template_fingerprint"], "abc");
    }
}

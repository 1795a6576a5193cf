use super::baseline::{ExpectedRunStyle, FontAliases, FontExpectation, FontName, PolicyBaseline};
use super::observe::{FormatFingerprint, ParagraphSnapshot, RunStyleSnapshot};
use crate::docx::{ParagraphPath, RunId};
use crate::substitute::TouchedRuns;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    TableForbidden,
    NumberingPresent,
    RunFontMismatch,
    RunSizeMismatch,
    FirstLineIndentMismatch,
    LineSpacingMismatch,
}

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::TableForbidden => "TABLE_FORBIDDEN",
            IssueCode::NumberingPresent => "NUMBERING_PRESENT",
            IssueCode::RunFontMismatch => "RUN_FONT_MISMATCH",
            IssueCode::RunSizeMismatch => "RUN_SIZE_MISMATCH",
            IssueCode::FirstLineIndentMismatch => "FIRST_LINE_INDENT_MISMATCH",
            IssueCode::LineSpacingMismatch => "LINE_SPACING_MISMATCH",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warn,
}

/// Whether the compared value was read directly or is inherited from styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Observability {
    Observed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DimensionValue {
    Flag(bool),
    Twips(Option<i64>),
    SizePt(Option<f64>),
    Fonts {
        latin: Option<String>,
        east_asia: Option<String>,
    },
}

impl fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_inherited<T: fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map_or_else(|| "inherited".to_string(), |value| value.to_string())
        }
        match self {
            DimensionValue::Flag(flag) => write!(f, "{flag}"),
            DimensionValue::Twips(twips) => write!(f, "{}", or_inherited(twips)),
            DimensionValue::SizePt(size) => write!(f, "{}", or_inherited(size)),
            DimensionValue::Fonts { latin, east_asia } => write!(
                f,
                "latin={} east_asia={}",
                or_inherited(latin),
                or_inherited(east_asia)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffIssue {
    pub code: IssueCode,
    pub severity: Severity,
    pub observability: Observability,
    pub location: String,
    pub paragraph_path: Option<ParagraphPath>,
    pub run_refs: Vec<RunId>,
    pub observed_value: DimensionValue,
    pub expected_value: DimensionValue,
    pub fixable: bool,
    pub suggestion: String,
}

/// Compare a rendered fingerprint against `baseline`.
///
/// Only paragraphs and runs in `touched` are inspected. Table presence is the
/// one document-level check; when tables are forbidden it is also the only
/// code cell content can produce.
pub fn diff(
    rendered: &FormatFingerprint,
    baseline: &PolicyBaseline,
    touched: &TouchedRuns,
) -> Vec<DiffIssue> {
    let mut issues = Vec::new();

    if baseline.forbid_tables && rendered.table_present {
        for table in 0..rendered.table_count {
            issues.push(DiffIssue {
                code: IssueCode::TableForbidden,
                severity: Severity::Error,
                observability: Observability::Observed,
                location: format!("t{table}"),
                paragraph_path: None,
                run_refs: touched
                    .run_ids()
                    .filter(|run| run.paragraph.table() == Some(table))
                    .cloned()
                    .collect(),
                observed_value: DimensionValue::Flag(true),
                expected_value: DimensionValue::Flag(false),
                fixable: false,
                suggestion: suggestion_for(IssueCode::TableForbidden, baseline),
            });
        }
    }

    for (path, snapshot) in &rendered.touched_paragraphs {
        if baseline.forbid_tables && path.in_table() {
            continue;
        }
        let runs: Vec<(&RunId, &RunStyleSnapshot)> = rendered
            .touched_runs
            .iter()
            .filter(|(run, _)| &run.paragraph == path && touched.contains(run))
            .collect();
        if runs.is_empty() {
            continue;
        }
        let run_refs: Vec<RunId> = runs.iter().map(|(run, _)| (*run).clone()).collect();
        paragraph_issues(path, snapshot, &run_refs, baseline, &mut issues);
        for (run, style) in runs {
            run_issues(path, run, style, baseline, &mut issues);
        }
    }
    issues
}

fn paragraph_issues(
    path: &ParagraphPath,
    snapshot: &ParagraphSnapshot,
    run_refs: &[RunId],
    baseline: &PolicyBaseline,
    issues: &mut Vec<DiffIssue>,
) {
    let paragraph_issue = |code, severity, observability, observed, expected| DiffIssue {
        code,
        severity,
        observability,
        location: path.to_string(),
        paragraph_path: Some(path.clone()),
        run_refs: run_refs.to_vec(),
        observed_value: observed,
        expected_value: expected,
        fixable: true,
        suggestion: suggestion_for(code, baseline),
    };

    if baseline.forbid_numbering && snapshot.has_direct_numbering {
        issues.push(paragraph_issue(
            IssueCode::NumberingPresent,
            Severity::Error,
            Observability::Observed,
            DimensionValue::Flag(true),
            DimensionValue::Flag(false),
        ));
    }
    let tolerance = baseline.twips_tolerance;
    for (code, observed, expected) in [
        (
            IssueCode::FirstLineIndentMismatch,
            snapshot.first_line_indent_twips,
            baseline.first_line_indent_twips,
        ),
        (
            IssueCode::LineSpacingMismatch,
            snapshot.line_spacing_twips,
            baseline.line_spacing_twips,
        ),
    ] {
        let Some(expected) = expected else {
            continue;
        };
        let observability = match observed {
            Some(actual) if (actual - expected).abs() <= tolerance => continue,
            Some(_) => Observability::Observed,
            None => Observability::Unknown,
        };
        issues.push(paragraph_issue(
            code,
            Severity::Warn,
            observability,
            DimensionValue::Twips(observed),
            DimensionValue::Twips(Some(expected)),
        ));
    }
}

/// Outcome of comparing one run dimension group.
#[derive(Debug, Default, Clone, Copy)]
struct Verdict {
    observed_mismatch: bool,
    inherited: bool,
}

impl Verdict {
    fn merge(self, other: Verdict) -> Verdict {
        Verdict {
            observed_mismatch: self.observed_mismatch || other.observed_mismatch,
            inherited: self.inherited || other.inherited,
        }
    }

    fn classify(self, treat_inherited_as_error: bool) -> Option<(Severity, Observability)> {
        if self.observed_mismatch {
            Some((Severity::Error, Observability::Observed))
        } else if self.inherited {
            let severity = if treat_inherited_as_error {
                Severity::Error
            } else {
                Severity::Warn
            };
            Some((severity, Observability::Unknown))
        } else {
            None
        }
    }
}

/// Template snapshots may legitimately leave a value inherited, so a missing
/// expectation only flags a directly set value.
fn compare_with_template<T: PartialEq>(expected: Option<&T>, actual: Option<&T>) -> Verdict {
    match (expected, actual) {
        (None, None) => Verdict::default(),
        (None, Some(_)) => Verdict {
            observed_mismatch: true,
            inherited: false,
        },
        (Some(_), None) => Verdict {
            observed_mismatch: false,
            inherited: true,
        },
        (Some(expected), Some(actual)) => Verdict {
            observed_mismatch: expected != actual,
            inherited: false,
        },
    }
}

fn compare_with_policy<T: PartialEq>(expected: Option<&T>, actual: Option<&T>) -> Verdict {
    match (expected, actual) {
        (None, _) => Verdict::default(),
        (Some(_), None) => Verdict {
            observed_mismatch: false,
            inherited: true,
        },
        (Some(expected), Some(actual)) => Verdict {
            observed_mismatch: expected != actual,
            inherited: false,
        },
    }
}

fn compare<T: PartialEq>(from_template: bool, expected: Option<&T>, actual: Option<&T>) -> Verdict {
    if from_template {
        compare_with_template(expected, actual)
    } else {
        compare_with_policy(expected, actual)
    }
}

fn canonical_font(aliases: &FontAliases, name: Option<&String>) -> Option<FontName> {
    name.map(|name| aliases.canonical(name))
}

fn run_issues(
    path: &ParagraphPath,
    run: &RunId,
    style: &RunStyleSnapshot,
    baseline: &PolicyBaseline,
    issues: &mut Vec<DiffIssue>,
) {
    let latin = canonical_font(&baseline.font_aliases, style.latin_font.as_ref());
    let east_asia = canonical_font(&baseline.font_aliases, style.east_asia_font.as_ref());

    let (expected, from_template) = match &baseline.fonts {
        FontExpectation::Policy {
            latin_font,
            east_asia_font,
            size_half_points,
        } => (
            ExpectedRunStyle {
                latin_font: latin_font.clone(),
                east_asia_font: east_asia_font.clone(),
                size_half_points: *size_half_points,
            },
            false,
        ),
        FontExpectation::TemplateRuns { runs } => (runs.get(run).cloned().unwrap_or_default(), true),
    };
    let expected_latin = expected.latin_font.as_ref();
    let expected_east_asia = expected.east_asia_font.as_ref();
    let expected_size = expected.size_half_points.as_ref();

    let font_verdict = compare(from_template, expected_latin, latin.as_ref()).merge(compare(
        from_template,
        expected_east_asia,
        east_asia.as_ref(),
    ));
    if let Some((severity, observability)) = font_verdict.classify(baseline.treat_inherited_as_error)
    {
        issues.push(DiffIssue {
            code: IssueCode::RunFontMismatch,
            severity,
            observability,
            location: run.to_string(),
            paragraph_path: Some(path.clone()),
            run_refs: vec![run.clone()],
            observed_value: DimensionValue::Fonts {
                latin: style.latin_font.clone(),
                east_asia: style.east_asia_font.clone(),
            },
            expected_value: DimensionValue::Fonts {
                latin: expected_latin.map(|name| name.as_str().to_string()),
                east_asia: expected_east_asia.map(|name| name.as_str().to_string()),
            },
            fixable: false,
            suggestion: suggestion_for(IssueCode::RunFontMismatch, baseline),
        });
    }

    let actual_size = style.size_half_points.as_ref();
    let size_verdict = compare(from_template, expected_size, actual_size);
    if let Some((severity, observability)) = size_verdict.classify(baseline.treat_inherited_as_error)
    {
        issues.push(DiffIssue {
            code: IssueCode::RunSizeMismatch,
            severity,
            observability,
            location: run.to_string(),
            paragraph_path: Some(path.clone()),
            run_refs: vec![run.clone()],
            observed_value: DimensionValue::SizePt(style.size_half_points.map(half_points_to_pt)),
            expected_value: DimensionValue::SizePt(expected_size.copied().map(half_points_to_pt)),
            fixable: false,
            suggestion: suggestion_for(IssueCode::RunSizeMismatch, baseline),
        });
    }
}

pub fn half_points_to_pt(half_points: u32) -> f64 {
    f64::from(half_points) / 2.0
}

/// One actionable suggestion per issue code.
pub fn suggestion_for(code: IssueCode, baseline: &PolicyBaseline) -> String {
    match code {
        IssueCode::TableForbidden => {
            "Use the template baseline for table-based templates, or set forbid_tables: false in the policy.".to_string()
        }
        IssueCode::NumberingPresent => {
            "Remove direct paragraph numbering (w:numPr) from the placeholder paragraph, or run with the safe fix mode.".to_string()
        }
        IssueCode::RunFontMismatch => {
            "Set the placeholder run's fonts in the template to match the baseline, or align run_font_latin/run_font_east_asia in the policy.".to_string()
        }
        IssueCode::RunSizeMismatch => {
            "Set the placeholder run's size in the template to match the baseline, or align run_size_pt in the policy.".to_string()
        }
        IssueCode::FirstLineIndentMismatch => format!(
            "Align first_line_indent_twips with the dominant template indent (expected {}, tolerance {}).",
            twips_text(baseline.first_line_indent_twips),
            baseline.twips_tolerance
        ),
        IssueCode::LineSpacingMismatch => format!(
            "Align line_spacing_twips with the template (expected {}, tolerance {}).",
            twips_text(baseline.line_spacing_twips),
            baseline.twips_tolerance
        ),
    }
}

fn twips_text(value: Option<i64>) -> String {
    value.map_or_else(|| "unset".to_string(), |twips| twips.to_string())
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;

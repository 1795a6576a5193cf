use super::diff::{DiffIssue, DimensionValue, IssueCode, Severity};
use crate::docx::RunId;
use serde::Serialize;
use std::collections::BTreeMap;

pub const MAX_EXAMPLES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueExample {
    pub location: String,
    pub run_id: Option<RunId>,
    pub observed_value: DimensionValue,
    pub expected_value: DimensionValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeDiagnostics {
    pub count: usize,
    pub severity: Severity,
    pub examples: Vec<IssueExample>,
    pub suggestion: String,
}

/// Issues grouped by code for the report and the terminal summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub issue_count: usize,
    pub codes: Vec<IssueCode>,
    pub by_code: BTreeMap<IssueCode, CodeDiagnostics>,
}

pub fn summarize(issues: &[DiffIssue]) -> Diagnostics {
    let mut by_code: BTreeMap<IssueCode, CodeDiagnostics> = BTreeMap::new();
    for issue in issues {
        let entry = by_code.entry(issue.code).or_insert_with(|| CodeDiagnostics {
            count: 0,
            severity: issue.severity,
            examples: Vec::new(),
            suggestion: issue.suggestion.clone(),
        });
        entry.count += 1;
        if issue.severity == Severity::Error {
            entry.severity = Severity::Error;
        }
        if entry.examples.len() < MAX_EXAMPLES {
            entry.examples.push(IssueExample {
                location: issue.location.clone(),
                run_id: issue.run_refs.first().cloned(),
                observed_value: issue.observed_value.clone(),
                expected_value: issue.expected_value.clone(),
            });
        }
    }
    Diagnostics {
        issue_count: issues.len(),
        codes: by_code.keys().copied().collect(),
        by_code,
    }
}

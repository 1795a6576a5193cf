//! Safe paragraph-level corrections scoped to substituted paragraphs.
use super::baseline::PolicyBaseline;
use super::diff::{DiffIssue, IssueCode};
use crate::docx::{Body, EditSet, ParagraphPatch, ParagraphPath};
use crate::substitute::TouchedRuns;
use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const SAFE_FIX_REASON: &str = "safe_fix_to_baseline";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixChange {
    pub paragraph_path: ParagraphPath,
    pub field: &'static str,
    pub before: Value,
    pub after: Value,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct FixPlan {
    pub edits: EditSet,
    pub changes: Vec<FixChange>,
}

impl FixPlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Plan corrections for the fixable issues of a rendered body.
///
/// Only paragraphs holding a touched run are eligible. Cell paragraphs are
/// left alone while tables are forbidden. Fonts and sizes are never fixed.
pub fn plan_fixes(
    body: &Body,
    issues: &[DiffIssue],
    baseline: &PolicyBaseline,
    touched: &TouchedRuns,
) -> Result<FixPlan> {
    let mut patches: BTreeMap<&ParagraphPath, (ParagraphPatch, Vec<FixChange>)> = BTreeMap::new();

    for issue in issues.iter().filter(|issue| issue.fixable) {
        let Some(path) = issue.paragraph_path.as_ref() else {
            continue;
        };
        if !touched.covers_paragraph(path) || (baseline.forbid_tables && path.in_table()) {
            continue;
        }
        let paragraph = body
            .paragraph(path)
            .ok_or_else(|| anyhow!("paragraph {path} is not in the rendered document"))?;
        let (patch, changes) = patches.entry(path).or_default();
        let change = |field: &'static str, before: Value, after: Value| FixChange {
            paragraph_path: path.clone(),
            field,
            before,
            after,
            reason: SAFE_FIX_REASON,
        };
        match issue.code {
            IssueCode::FirstLineIndentMismatch => {
                let Some(target) = baseline.first_line_indent_twips else {
                    continue;
                };
                patch.first_line_indent = Some(target);
                changes.push(change(
                    "first_line_indent_twips",
                    json!(paragraph.props.first_line_indent),
                    json!(target),
                ));
            }
            IssueCode::LineSpacingMismatch => {
                let Some(target) = baseline.line_spacing_twips else {
                    continue;
                };
                patch.line_spacing = Some(target);
                changes.push(change(
                    "line_spacing_twips",
                    json!(paragraph.props.line_spacing),
                    json!(target),
                ));
            }
            IssueCode::NumberingPresent => {
                patch.remove_numbering = true;
                changes.push(change("numbering", json!(true), json!(false)));
            }
            IssueCode::TableForbidden | IssueCode::RunFontMismatch | IssueCode::RunSizeMismatch => {}
        }
    }

    let mut plan = FixPlan::default();
    for (path, (patch, changes)) in patches {
        if patch.is_empty() {
            continue;
        }
        let paragraph = body
            .paragraph(path)
            .ok_or_else(|| anyhow!("paragraph {path} is not in the rendered document"))?;
        plan.edits.patch_paragraph(paragraph, &patch)?;
        plan.changes.extend(changes);
    }
    Ok(plan)
}

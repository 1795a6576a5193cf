//! The engine entry point: scan, substitute, observe, diff, fix, report.
//!
//! One call is a pure function of its inputs. Nothing is written to disk here;
//! the caller decides where the bundle goes.
use crate::config::{BaselineSource, BracketMode, FixMode, FormatMode, FormatOptions};
use crate::docx::Document;
use crate::error::EngineError;
use crate::format::{
    self, diff, observe, plan_fixes, resolve_policy, template_baseline, FormatPolicy,
    PolicyBaseline,
};
use crate::placeholder::{scan_body, template_fingerprint};
use crate::report::{final_status, ArtifactBundle, FormatOutcome, FormatReport};
use crate::skills::SkillRegistry;
use crate::substitute::{substitute, TouchedRuns};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Inputs for one invocation.
#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    pub template: &'a [u8],
    pub skill_id: &'a str,
    pub payload: &'a Map<String, Value>,
    pub format: FormatOptions,
    pub bracket_mode: BracketMode,
    /// Policy YAML. The built-in policy applies when absent.
    pub policy_text: Option<&'a str>,
    /// Also derive a suggested policy from the template.
    pub suggest_policy: bool,
}

impl<'a> RunRequest<'a> {
    pub fn new(template: &'a [u8], skill_id: &'a str, payload: &'a Map<String, Value>) -> Self {
        Self {
            template,
            skill_id,
            payload,
            format: FormatOptions::default(),
            bracket_mode: BracketMode::default(),
            policy_text: None,
            suggest_policy: false,
        }
    }
}

/// Run the full pipeline.
///
/// Policy problems fail before the template is read. An unsupported
/// template fails before anything is rendered. Every other outcome,
/// including missing fields and strict format failures, is a bundle.
pub fn run(request: &RunRequest<'_>, skills: &dyn SkillRegistry) -> Result<ArtifactBundle, EngineError> {
    let skill = skills
        .lookup(request.skill_id)
        .ok_or_else(|| EngineError::UnknownSkill(request.skill_id.to_string()))?;
    let policy = match request.policy_text {
        Some(text) => format::parse_policy(text)?,
        None => format::default_policy()?,
    };
    let policy_baseline = resolve_policy(&policy)?;

    tracing::info!(
        skill = skill.name,
        format_mode = %request.format.mode,
        baseline = %request.format.baseline,
        fix_mode = %request.format.fix,
        template_bytes = request.template.len(),
        "docops run start"
    );

    let template = Document::from_bytes(request.template.to_vec()).map_err(EngineError::Package)?;
    let tokens = scan_body(template.body());
    tracing::debug!(
        paragraphs = template.body().paragraphs.len(),
        tokens = tokens.len(),
        "scanned template"
    );
    let fingerprint = template_fingerprint(template.body(), &tokens)?;

    let substitution = substitute(
        template.body(),
        &tokens,
        skill,
        request.payload,
        request.bracket_mode,
    )?;
    if !substitution.blocking.is_empty() {
        tracing::info!(
            unsupported = substitution.blocking.len(),
            "template unsupported"
        );
        return Err(EngineError::TemplateUnsupported {
            tokens: substitution.blocking,
        });
    }
    let rendered = template.apply(&substitution.edits)?;

    let (rendered, outcome) = check_format(
        &template,
        rendered,
        &substitution.touched,
        request.format,
        &policy_baseline,
    )?;
    let suggested_policy = if request.suggest_policy {
        let template_observed = observe(template.body(), &substitution.touched);
        Some(suggested_policy_text(&template_observed, &policy)?)
    } else {
        None
    };

    let format_report = FormatReport::build(request.format, outcome, fingerprint);
    let status = final_status(substitution.status(), format_report.passed());
    let document = rendered.to_bytes().map_err(EngineError::Package)?;
    tracing::info!(
        status = %status,
        touched_runs = substitution.touched.len(),
        missing_fields = substitution.missing_fields.len(),
        issues = format_report.summary.diff.len(),
        fix_changes = format_report.summary.fix_changes.len(),
        "docops run complete"
    );

    Ok(ArtifactBundle {
        document,
        replace_log: substitution.replace_log,
        missing_fields: substitution.missing_fields,
        format_report,
        suggested_policy,
        status,
    })
}

fn check_format(
    template: &Document,
    rendered: Document,
    touched: &TouchedRuns,
    options: FormatOptions,
    policy: &PolicyBaseline,
) -> Result<(Document, FormatOutcome), EngineError> {
    let template_observed = observe(template.body(), touched);
    if options.mode == FormatMode::Off {
        let rendered_observed = observe(rendered.body(), touched);
        let outcome = FormatOutcome {
            template_observed,
            rendered_observed,
            issues: Vec::new(),
            baseline: None,
            effective_policy_overrides: BTreeMap::new(),
            diagnostics: format::Diagnostics::default(),
            fix_changes: Vec::new(),
        };
        return Ok((rendered, outcome));
    }

    let (baseline, overrides) = match options.baseline {
        BaselineSource::Policy => (policy.clone(), BTreeMap::new()),
        BaselineSource::Template => template_baseline(policy, &template_observed),
    };

    let mut rendered = rendered;
    let mut rendered_observed = observe(rendered.body(), touched);
    let mut issues = diff(&rendered_observed, &baseline, touched);
    let mut fix_changes = Vec::new();
    if options.fix == FixMode::Safe {
        let plan = plan_fixes(rendered.body(), &issues, &baseline, touched)?;
        if !plan.is_empty() {
            for change in &plan.changes {
                tracing::debug!(
                    paragraph = %change.paragraph_path,
                    field = change.field,
                    before = %change.before,
                    after = %change.after,
                    "safe fix"
                );
            }
            rendered = rendered.apply(&plan.edits)?;
            rendered_observed = observe(rendered.body(), touched);
            issues = diff(&rendered_observed, &baseline, touched);
            fix_changes = plan.changes;
        }
    }

    let outcome = FormatOutcome {
        template_observed,
        rendered_observed,
        diagnostics: format::summarize(&issues),
        issues,
        baseline: Some(baseline),
        effective_policy_overrides: overrides,
        fix_changes,
    };
    Ok((rendered, outcome))
}

fn suggested_policy_text(
    template_observed: &format::FormatFingerprint,
    policy: &FormatPolicy,
) -> Result<String, EngineError> {
    format::render_suggested_policy(template_observed, policy)
        .map_err(|err| EngineError::Internal(anyhow::Error::new(err).context("render suggested policy")))
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;

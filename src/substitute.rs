//! Substitution engine: payload values into matched placeholder runs.
//!
//! Produces the edit set for the rendered document plus the touched-run set
//! that authorizes every later formatting correction.
use crate::config::BracketMode;
use crate::docx::{Body, EditSet, ParagraphPath, RunId};
use crate::placeholder::{MatchClass, PlaceholderToken, UnsupportedToken};
use crate::skills::SkillSpec;
use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Provenance of one rewritten run. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TouchedRun {
    run: RunId,
    field_name: String,
    original_text: String,
    new_text: String,
}

impl TouchedRun {
    pub fn run(&self) -> &RunId {
        &self.run
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn new_text(&self) -> &str {
        &self.new_text
    }
}

/// Runs rewritten by substitution. Only this module can add to it, so any
/// value in hand is proof that its runs were legitimately substituted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchedRuns {
    records: Vec<TouchedRun>,
    runs: BTreeSet<RunId>,
}

impl TouchedRuns {
    fn record(&mut self, record: TouchedRun) {
        self.runs.insert(record.run.clone());
        self.records.push(record);
    }

    pub fn contains(&self, run: &RunId) -> bool {
        self.runs.contains(run)
    }

    pub fn covers_paragraph(&self, path: &ParagraphPath) -> bool {
        self.runs.iter().any(|run| &run.paragraph == path)
    }

    pub fn run_ids(&self) -> impl Iterator<Item = &RunId> {
        self.runs.iter()
    }

    pub fn records(&self) -> &[TouchedRun] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceStatus {
    Replaced,
    Missing,
    Skipped,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaceLogEntry {
    pub field_name: Option<String>,
    pub run_location: Option<String>,
    pub old_text: String,
    pub new_text: Option<String>,
    pub status: ReplaceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MissingFieldRecord {
    pub field_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionStatus {
    Ok,
    MissingRequired,
    TemplateUnsupported,
}

#[derive(Debug, Clone, Default)]
pub struct Substitution {
    pub edits: EditSet,
    pub touched: TouchedRuns,
    pub replace_log: Vec<ReplaceLogEntry>,
    pub missing_fields: Vec<MissingFieldRecord>,
    /// Tokens that make the template unsupported under the bracket mode.
    pub blocking: Vec<UnsupportedToken>,
}

impl Substitution {
    /// Unsupported beats missing; missing beats ok.
    pub fn status(&self) -> SubstitutionStatus {
        if !self.blocking.is_empty() {
            SubstitutionStatus::TemplateUnsupported
        } else if !self.missing_fields.is_empty() {
            SubstitutionStatus::MissingRequired
        } else {
            SubstitutionStatus::Ok
        }
    }
}

struct PendingReplacement<'t> {
    token: &'t PlaceholderToken,
    start: usize,
    end: usize,
    text: String,
}

/// Apply `payload` to every matched token of `tokens`.
///
/// Missing fields accumulate; the caller decides what a blocking token means.
pub fn substitute(
    body: &Body,
    tokens: &[PlaceholderToken],
    skill: &SkillSpec,
    payload: &Map<String, Value>,
    mode: BracketMode,
) -> Result<Substitution> {
    let mut out = Substitution::default();
    let mut missing: BTreeSet<String> = BTreeSet::new();
    let mut by_run: BTreeMap<&RunId, Vec<PendingReplacement<'_>>> = BTreeMap::new();

    for token in tokens {
        match &token.class {
            MatchClass::Matched { run, start, end } => {
                let Some(field) = skill.field_for_placeholder(&token.field_name) else {
                    out.replace_log.push(skipped(token, "unmapped_field"));
                    continue;
                };
                match payload
                    .get(field.payload_key)
                    .and_then(|value| skill.render_value(field, value))
                {
                    Some(text) => by_run.entry(run).or_default().push(PendingReplacement {
                        token,
                        start: *start,
                        end: *end,
                        text,
                    }),
                    None if field.required => {
                        tracing::debug!(field = field.payload_key, run = %run, "required field missing");
                        missing.insert(field.payload_key.to_string());
                        out.replace_log.push(ReplaceLogEntry {
                            field_name: Some(token.field_name.clone()),
                            run_location: Some(run.to_string()),
                            old_text: token.text.clone(),
                            new_text: None,
                            status: ReplaceStatus::Missing,
                            reason: Some("missing_field".to_string()),
                        });
                    }
                    None => out.replace_log.push(skipped(token, "optional_field_absent")),
                }
            }
            MatchClass::CrossRun { .. } | MatchClass::Malformed { .. } => {
                let Some(unsupported) = token.to_unsupported() else {
                    continue;
                };
                if token.blocks(mode) {
                    out.blocking.push(unsupported.clone());
                } else {
                    tracing::warn!(
                        location = %unsupported.location,
                        reason = %unsupported.reason,
                        "skipping malformed placeholder"
                    );
                }
                out.replace_log.push(ReplaceLogEntry {
                    field_name: None,
                    run_location: token.first_run().map(RunId::to_string),
                    old_text: unsupported.text,
                    new_text: None,
                    status: ReplaceStatus::Unsupported,
                    reason: Some(unsupported.reason.as_str().to_string()),
                });
            }
        }
    }

    for (run_id, mut pending) in by_run {
        let run = body
            .run(run_id)
            .ok_or_else(|| anyhow!("matched run {run_id} is not in the document"))?;
        pending.sort_by_key(|replacement| replacement.start);
        for replacement in &pending {
            let slice = run
                .text
                .get(replacement.start..replacement.end)
                .ok_or_else(|| anyhow!("token offsets out of range in run {run_id}"))?;
            if slice != replacement.token.text {
                return Err(anyhow!(
                    "run {run_id} text changed under token {:?}",
                    replacement.token.text
                ));
            }
        }
        let ranges: Vec<(std::ops::Range<usize>, &str)> = pending
            .iter()
            .map(|replacement| (replacement.start..replacement.end, replacement.text.as_str()))
            .collect();
        out.edits.replace_in_run(run, &ranges)?;
        for replacement in &pending {
            tracing::debug!(run = %run_id, field = %replacement.token.field_name, "replaced placeholder");
            out.touched.record(TouchedRun {
                run: run_id.clone(),
                field_name: replacement.token.field_name.clone(),
                original_text: replacement.token.text.clone(),
                new_text: replacement.text.clone(),
            });
            out.replace_log.push(ReplaceLogEntry {
                field_name: Some(replacement.token.field_name.clone()),
                run_location: Some(run_id.to_string()),
                old_text: replacement.token.text.clone(),
                new_text: Some(replacement.text.clone()),
                status: ReplaceStatus::Replaced,
                reason: None,
            });
        }
    }

    out.missing_fields = missing
        .into_iter()
        .map(|field_name| MissingFieldRecord { field_name })
        .collect();
    Ok(out)
}

fn skipped(token: &PlaceholderToken, reason: &str) -> ReplaceLogEntry {
    ReplaceLogEntry {
        field_name: Some(token.field_name.clone()),
        run_location: token.first_run().map(RunId::to_string),
        old_text: token.text.clone(),
        new_text: None,
        status: ReplaceStatus::Skipped,
        reason: Some(reason.to_string()),
    }
}

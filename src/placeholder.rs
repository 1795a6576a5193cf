//! Placeholder token recognition over paragraph runs.
//!
//! A placeholder is `【FIELD】` with `FIELD` drawn from `A-Z`, `0-9` and `_`,
//! and it is only replaceable when both markers sit in the same run. Every
//! other bracket shape is classified, never silently ignored.
use crate::config::BracketMode;
use crate::docx::{Body, Paragraph, ParagraphPath, RunId};
use crate::util::sha256_hex;
use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

pub const OPEN_MARKER: char = '【';
pub const CLOSE_MARKER: char = '】';

fn field_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9_]+$").expect("regex for field names"))
}

fn horizontal_space_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[ \t]+").expect("regex for horizontal space"))
}

pub fn is_valid_field_name(name: &str) -> bool {
    field_name_pattern().is_match(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    InvalidFieldName,
    UnclosedMarker,
    StrayCloseMarker,
}

/// Why a token cannot be substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedReason {
    CrossRun,
    InvalidFieldName,
    UnclosedMarker,
    StrayCloseMarker,
}

impl UnsupportedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            UnsupportedReason::CrossRun => "cross_run",
            UnsupportedReason::InvalidFieldName => "invalid_field_name",
            UnsupportedReason::UnclosedMarker => "unclosed_marker",
            UnsupportedReason::StrayCloseMarker => "stray_close_marker",
        }
    }
}

impl From<MalformedReason> for UnsupportedReason {
    fn from(reason: MalformedReason) -> Self {
        match reason {
            MalformedReason::InvalidFieldName => UnsupportedReason::InvalidFieldName,
            MalformedReason::UnclosedMarker => UnsupportedReason::UnclosedMarker,
            MalformedReason::StrayCloseMarker => UnsupportedReason::StrayCloseMarker,
        }
    }
}

impl fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchClass {
    /// Both markers in one run; `start..end` are byte offsets in its text.
    Matched { run: RunId, start: usize, end: usize },
    CrossRun { runs: Vec<RunId> },
    Malformed {
        reason: MalformedReason,
        runs: Vec<RunId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    /// Text between the markers, as written.
    pub field_name: String,
    /// Full token text including markers.
    pub text: String,
    pub paragraph: ParagraphPath,
    /// Character offsets within the paragraph's concatenated run text.
    pub paragraph_start: usize,
    pub paragraph_end: usize,
    pub class: MatchClass,
}

impl PlaceholderToken {
    pub fn first_run(&self) -> Option<&RunId> {
        match &self.class {
            MatchClass::Matched { run, .. } => Some(run),
            MatchClass::CrossRun { runs } | MatchClass::Malformed { runs, .. } => runs.first(),
        }
    }

    pub fn location(&self) -> String {
        self.first_run()
            .map_or_else(|| self.paragraph.to_string(), RunId::to_string)
    }

    pub fn unsupported_reason(&self) -> Option<UnsupportedReason> {
        match &self.class {
            MatchClass::Matched { .. } => None,
            MatchClass::CrossRun { .. } => Some(UnsupportedReason::CrossRun),
            MatchClass::Malformed { reason, .. } => Some((*reason).into()),
        }
    }

    /// Whether this token makes the whole template unsupported.
    pub fn blocks(&self, mode: BracketMode) -> bool {
        match &self.class {
            MatchClass::Matched { .. } => false,
            MatchClass::CrossRun { .. } => true,
            MatchClass::Malformed { .. } => mode == BracketMode::Strict,
        }
    }

    pub fn to_unsupported(&self) -> Option<UnsupportedToken> {
        self.unsupported_reason().map(|reason| UnsupportedToken {
            text: self.text.clone(),
            location: self.location(),
            reason,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsupportedToken {
    pub text: String,
    pub location: String,
    pub reason: UnsupportedReason,
}

struct OpenMarker {
    first_run: usize,
    last_run: usize,
    byte: usize,
    char_start: usize,
    text: String,
}

impl OpenMarker {
    fn runs(&self, paragraph: &Paragraph) -> Vec<RunId> {
        paragraph.runs[self.first_run..=self.last_run]
            .iter()
            .map(|run| run.id.clone())
            .collect()
    }
}

/// Scan every modeled paragraph in document order.
pub fn scan_body(body: &Body) -> Vec<PlaceholderToken> {
    body.paragraphs.iter().flat_map(scan_paragraph).collect()
}

pub fn scan_paragraph(paragraph: &Paragraph) -> Vec<PlaceholderToken> {
    let mut tokens = Vec::new();
    let mut open: Option<OpenMarker> = None;
    let mut position = 0usize;

    for (run_index, run) in paragraph.runs.iter().enumerate() {
        for (byte, ch) in run.text.char_indices() {
            match ch {
                OPEN_MARKER => {
                    if let Some(previous) = open.take() {
                        tokens.push(malformed(
                            paragraph,
                            &previous,
                            MalformedReason::UnclosedMarker,
                            position,
                        ));
                    }
                    open = Some(OpenMarker {
                        first_run: run_index,
                        last_run: run_index,
                        byte,
                        char_start: position,
                        text: ch.to_string(),
                    });
                }
                CLOSE_MARKER => match open.take() {
                    Some(mut marker) => {
                        marker.text.push(ch);
                        marker.last_run = run_index;
                        tokens.push(closed(
                            paragraph,
                            marker,
                            byte + ch.len_utf8(),
                            position + 1,
                        ));
                    }
                    None => tokens.push(PlaceholderToken {
                        field_name: String::new(),
                        text: ch.to_string(),
                        paragraph: paragraph.path.clone(),
                        paragraph_start: position,
                        paragraph_end: position + 1,
                        class: MatchClass::Malformed {
                            reason: MalformedReason::StrayCloseMarker,
                            runs: vec![run.id.clone()],
                        },
                    }),
                },
                _ => {
                    if let Some(marker) = open.as_mut() {
                        marker.text.push(ch);
                        marker.last_run = run_index;
                    }
                }
            }
            position += 1;
        }
    }
    if let Some(marker) = open {
        tokens.push(malformed(
            paragraph,
            &marker,
            MalformedReason::UnclosedMarker,
            position,
        ));
    }
    tokens
}

fn malformed(
    paragraph: &Paragraph,
    marker: &OpenMarker,
    reason: MalformedReason,
    end: usize,
) -> PlaceholderToken {
    PlaceholderToken {
        field_name: marker
            .text
            .trim_start_matches(OPEN_MARKER)
            .to_string(),
        text: marker.text.clone(),
        paragraph: paragraph.path.clone(),
        paragraph_start: marker.char_start,
        paragraph_end: end,
        class: MatchClass::Malformed {
            reason,
            runs: marker.runs(paragraph),
        },
    }
}

fn closed(
    paragraph: &Paragraph,
    marker: OpenMarker,
    byte_end: usize,
    char_end: usize,
) -> PlaceholderToken {
    let inner = marker
        .text
        .strip_prefix(OPEN_MARKER)
        .and_then(|rest| rest.strip_suffix(CLOSE_MARKER))
        .unwrap_or_default()
        .to_string();
    // Markers in different runs are cross-run whatever the name looks like.
    let class = if marker.first_run != marker.last_run {
        MatchClass::CrossRun {
            runs: marker.runs(paragraph),
        }
    } else if !is_valid_field_name(&inner) {
        MatchClass::Malformed {
            reason: MalformedReason::InvalidFieldName,
            runs: marker.runs(paragraph),
        }
    } else {
        MatchClass::Matched {
            run: paragraph.runs[marker.first_run].id.clone(),
            start: marker.byte,
            end: byte_end,
        }
    };
    PlaceholderToken {
        field_name: inner,
        text: marker.text,
        paragraph: paragraph.path.clone(),
        paragraph_start: marker.char_start,
        paragraph_end: char_end,
        class,
    }
}

#[derive(Serialize)]
struct FingerprintParagraph {
    paragraph_path: String,
    text: String,
}

#[derive(Serialize)]
struct FingerprintOccurrence {
    paragraph_path: String,
    start: usize,
    end: usize,
    field_name: String,
}

#[derive(Serialize)]
struct FingerprintUnsupported {
    paragraph_path: String,
    start: usize,
    end: usize,
    reason: UnsupportedReason,
    text: String,
}

#[derive(Serialize)]
struct FingerprintPayload {
    paragraphs: Vec<FingerprintParagraph>,
    occurrences: Vec<FingerprintOccurrence>,
    unsupported: Vec<FingerprintUnsupported>,
}

fn normalize_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    horizontal_space_pattern()
        .replace_all(&unified, " ")
        .trim()
        .to_string()
}

/// SHA-256 over paragraph text and token placement, insensitive to how the
/// text is split into runs.
pub fn template_fingerprint(body: &Body, tokens: &[PlaceholderToken]) -> Result<String> {
    let paragraphs = body
        .paragraphs
        .iter()
        .map(|paragraph| FingerprintParagraph {
            paragraph_path: paragraph.path.to_string(),
            text: normalize_whitespace(&paragraph.text()),
        })
        .collect();
    let mut occurrences = Vec::new();
    let mut unsupported = Vec::new();
    for token in tokens {
        match token.unsupported_reason() {
            None => occurrences.push(FingerprintOccurrence {
                paragraph_path: token.paragraph.to_string(),
                start: token.paragraph_start,
                end: token.paragraph_end,
                field_name: token.field_name.clone(),
            }),
            Some(reason) => unsupported.push(FingerprintUnsupported {
                paragraph_path: token.paragraph.to_string(),
                start: token.paragraph_start,
                end: token.paragraph_end,
                reason,
                text: normalize_whitespace(&token.text),
            }),
        }
    }
    let payload = FingerprintPayload {
        paragraphs,
        occurrences,
        unsupported,
    };
    let serialized = serde_json::to_vec(&payload)?;
    Ok(sha256_hex(&serialized))
}

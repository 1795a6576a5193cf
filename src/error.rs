//! Engine error taxonomy and the exit-status contract.
//!
//! Only faults that prevent the four-artifact bundle are errors here.
//! `MissingRequired` and `FormatFailure` are outcomes carried by the bundle.
use crate::format::PolicyError;
use crate::placeholder::UnsupportedToken;
use crate::util::truncate_string;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Final process status for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Ok,
    InternalFault,
    MissingRequired,
    TemplateUnsupported,
    FormatFailure,
}

impl ExitStatus {
    /// Numeric exit code other systems depend on.
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Ok => 0,
            ExitStatus::InternalFault => 1,
            ExitStatus::MissingRequired => 2,
            ExitStatus::TemplateUnsupported => 3,
            ExitStatus::FormatFailure => 4,
        }
    }

    /// Return the stable string identifier used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ExitStatus::Ok => "ok",
            ExitStatus::InternalFault => "internal_fault",
            ExitStatus::MissingRequired => "missing_required",
            ExitStatus::TemplateUnsupported => "template_unsupported",
            ExitStatus::FormatFailure => "format_failure",
        }
    }

    /// Whether the four-artifact bundle accompanies this status.
    pub fn produces_artifacts(self) -> bool {
        matches!(
            self,
            ExitStatus::Ok | ExitStatus::MissingRequired | ExitStatus::FormatFailure
        )
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(
        "template has {} unsupported placeholder(s): {}",
        .tokens.len(),
        summarize_tokens(.tokens)
    )]
    TemplateUnsupported { tokens: Vec<UnsupportedToken> },

    #[error("policy configuration: {0}")]
    PolicyConfiguration(#[from] PolicyError),

    #[error("unsupported skill: {0}")]
    UnknownSkill(String),

    #[error("document package: {0:#}")]
    Package(anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            EngineError::TemplateUnsupported { .. } => ExitStatus::TemplateUnsupported,
            _ => ExitStatus::InternalFault,
        }
    }
}

const TOKEN_PREVIEW_BYTES: usize = 60;

fn summarize_tokens(tokens: &[UnsupportedToken]) -> String {
    const PREVIEW: usize = 5;
    let mut parts: Vec<String> = tokens
        .iter()
        .take(PREVIEW)
        .map(|token| {
            format!(
                "{} {} {:?}",
                token.location,
                token.reason,
                truncate_string(&token.text, TOKEN_PREVIEW_BYTES)
            )
        })
        .collect();
    if tokens.len() > PREVIEW {
        parts.push(format!("and {} more", tokens.len() - PREVIEW));
    }
    parts.join("; ")
}

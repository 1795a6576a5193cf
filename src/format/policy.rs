use crate::templates;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const MAX_TWIPS: i64 = 31_680;
pub const MAX_SIZE_PT: u32 = 400;
pub const DEFAULT_TWIPS_TOLERANCE: i64 = 20;

/// Format policy as written in YAML, before font alias resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatPolicy {
    #[serde(default)]
    pub forbid_tables: bool,
    #[serde(default)]
    pub forbid_numbering: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_font_latin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_font_east_asia: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_size_pt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_spacing_twips: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_line_indent_twips: Option<i64>,
    #[serde(default = "default_tolerance")]
    pub twips_tolerance: i64,
    #[serde(default)]
    pub treat_inherited_as_error: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub font_aliases: BTreeMap<String, String>,
}

fn default_tolerance() -> i64 {
    DEFAULT_TWIPS_TOLERANCE
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid policy YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{field} must not be empty")]
    EmptyFontName { field: String },

    #[error("{field} refers to unknown font alias {alias:?}")]
    UnresolvedAlias { field: String, alias: String },

    #[error("font alias {alias:?} points at another alias {target:?}")]
    ChainedAlias { alias: String, target: String },
}

impl FormatPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        check_range("twips_tolerance", self.twips_tolerance, 0, MAX_TWIPS)?;
        if let Some(size) = self.run_size_pt {
            check_range("run_size_pt", i64::from(size), 1, i64::from(MAX_SIZE_PT))?;
        }
        if let Some(twips) = self.line_spacing_twips {
            check_range("line_spacing_twips", twips, 0, MAX_TWIPS)?;
        }
        if let Some(twips) = self.first_line_indent_twips {
            check_range("first_line_indent_twips", twips, 0, MAX_TWIPS)?;
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), PolicyError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(PolicyError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Parse and range-check policy YAML.
pub fn parse_policy(text: &str) -> Result<FormatPolicy, PolicyError> {
    let policy: FormatPolicy = serde_yaml::from_str(text)?;
    policy.validate()?;
    Ok(policy)
}

pub fn default_policy() -> Result<FormatPolicy, PolicyError> {
    parse_policy(templates::DEFAULT_POLICY_YAML)
}

pub fn render_policy(policy: &FormatPolicy) -> Result<String, PolicyError> {
    Ok(serde_yaml::to_string(policy)?)
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;

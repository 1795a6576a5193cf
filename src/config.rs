//! Caller-facing knobs: format options, presets and bracket handling.
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;

/// Whether format findings are reported, enforced, or not computed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FormatMode {
    Report,
    Strict,
    Off,
}

/// Where the expected format values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    Template,
    Policy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FixMode {
    None,
    Safe,
}

/// Treatment of malformed bracket tokens. Cross-run tokens are fatal in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BracketMode {
    #[default]
    Strict,
    Lenient,
}

impl FormatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FormatMode::Report => "report",
            FormatMode::Strict => "strict",
            FormatMode::Off => "off",
        }
    }
}

impl BaselineSource {
    pub fn as_str(self) -> &'static str {
        match self {
            BaselineSource::Template => "template",
            BaselineSource::Policy => "policy",
        }
    }
}

impl FixMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FixMode::None => "none",
            FixMode::Safe => "safe",
        }
    }
}

impl fmt::Display for FormatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BaselineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FixMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatOptions {
    pub mode: FormatMode,
    pub baseline: BaselineSource,
    pub fix: FixMode,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Preset::default().options()
    }
}

/// Named bundles of format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Preset {
    /// Report against the template baseline and apply safe fixes.
    #[default]
    Quick,
    /// Report against the template baseline without fixing.
    Template,
    /// Enforce the policy baseline after safe fixes.
    Strict,
}

impl Preset {
    pub fn options(self) -> FormatOptions {
        match self {
            Preset::Quick => FormatOptions {
                mode: FormatMode::Report,
                baseline: BaselineSource::Template,
                fix: FixMode::Safe,
            },
            Preset::Template => FormatOptions {
                mode: FormatMode::Report,
                baseline: BaselineSource::Template,
                fix: FixMode::None,
            },
            Preset::Strict => FormatOptions {
                mode: FormatMode::Strict,
                baseline: BaselineSource::Policy,
                fix: FixMode::Safe,
            },
        }
    }
}

use super::observe::FormatFingerprint;
use super::policy::{FormatPolicy, PolicyError};
use crate::config::BaselineSource;
use crate::docx::RunId;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Legacy font names that render as a newer face.
const LEGACY_FONT_ALIASES: &[(&str, &str)] = &[
    ("仿宋_GB2312", "仿宋"),
    ("楷体_GB2312", "楷体"),
    ("FangSong_GB2312", "FangSong"),
    ("KaiTi_GB2312", "KaiTi"),
];

const ALIAS_PREFIX: char = '@';

/// A canonical font name. Only alias resolution produces one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FontName(String);

impl FontName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FontName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved alias table: every key maps straight to a canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FontAliases {
    table: BTreeMap<String, FontName>,
}

impl FontAliases {
    fn resolve(policy: &FormatPolicy) -> Result<Self, PolicyError> {
        let mut table: BTreeMap<String, FontName> = LEGACY_FONT_ALIASES
            .iter()
            .map(|(alias, target)| (alias.to_string(), FontName(target.to_string())))
            .collect();
        for (alias, target) in &policy.font_aliases {
            let alias = alias.trim();
            let target = target.trim();
            let alias_key = alias.trim_start_matches(ALIAS_PREFIX);
            if alias_key.is_empty() {
                return Err(PolicyError::EmptyFontName {
                    field: "font_aliases key".to_string(),
                });
            }
            if target.is_empty() {
                return Err(PolicyError::EmptyFontName {
                    field: format!("font_aliases.{alias_key}"),
                });
            }
            if target.starts_with(ALIAS_PREFIX) {
                return Err(PolicyError::ChainedAlias {
                    alias: alias_key.to_string(),
                    target: target.to_string(),
                });
            }
            table.insert(alias_key.to_string(), FontName(target.to_string()));
        }
        Ok(Self { table })
    }

    /// Resolve a font value written in policy text.
    fn resolve_value(&self, field: &str, value: &str) -> Result<FontName, PolicyError> {
        let value = value.trim();
        if let Some(alias) = value.strip_prefix(ALIAS_PREFIX) {
            return self
                .table
                .get(alias)
                .cloned()
                .ok_or_else(|| PolicyError::UnresolvedAlias {
                    field: field.to_string(),
                    alias: alias.to_string(),
                });
        }
        if value.is_empty() {
            return Err(PolicyError::EmptyFontName {
                field: field.to_string(),
            });
        }
        Ok(self.canonical(value))
    }

    /// Canonical name for a font observed in a document.
    pub fn canonical(&self, observed: &str) -> FontName {
        self.table
            .get(observed)
            .cloned()
            .unwrap_or_else(|| FontName(observed.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpectedRunStyle {
    pub latin_font: Option<FontName>,
    pub east_asia_font: Option<FontName>,
    pub size_half_points: Option<u32>,
}

/// Expected run fonts: fixed policy values, or a per-run template snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FontExpectation {
    Policy {
        latin_font: Option<FontName>,
        east_asia_font: Option<FontName>,
        size_half_points: Option<u32>,
    },
    TemplateRuns {
        runs: BTreeMap<RunId, ExpectedRunStyle>,
    },
}

/// Expected format values a rendered document is diffed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyBaseline {
    pub source: BaselineSource,
    pub forbid_tables: bool,
    pub forbid_numbering: bool,
    pub first_line_indent_twips: Option<i64>,
    pub line_spacing_twips: Option<i64>,
    pub twips_tolerance: i64,
    pub treat_inherited_as_error: bool,
    pub fonts: FontExpectation,
    pub font_aliases: FontAliases,
}

/// Resolve a parsed policy into a policy-sourced baseline.
///
/// Every alias reference is checked here, before any document is touched.
pub fn resolve_policy(policy: &FormatPolicy) -> Result<PolicyBaseline, PolicyError> {
    policy.validate()?;
    let font_aliases = FontAliases::resolve(policy)?;
    let latin_font = policy
        .run_font_latin
        .as_deref()
        .map(|value| font_aliases.resolve_value("run_font_latin", value))
        .transpose()?;
    let east_asia_font = policy
        .run_font_east_asia
        .as_deref()
        .map(|value| font_aliases.resolve_value("run_font_east_asia", value))
        .transpose()?;
    Ok(PolicyBaseline {
        source: BaselineSource::Policy,
        forbid_tables: policy.forbid_tables,
        forbid_numbering: policy.forbid_numbering,
        first_line_indent_twips: policy.first_line_indent_twips,
        line_spacing_twips: policy.line_spacing_twips,
        twips_tolerance: policy.twips_tolerance,
        treat_inherited_as_error: policy.treat_inherited_as_error,
        fonts: FontExpectation::Policy {
            latin_font,
            east_asia_font,
            size_half_points: policy.run_size_pt.map(|pt| pt * 2),
        },
        font_aliases,
    })
}

/// Derive a baseline from the template itself.
///
/// Policy values the template contradicts are overridden, and each override
/// is returned keyed by policy field so the report can show it.
pub fn template_baseline(
    policy: &PolicyBaseline,
    template: &FormatFingerprint,
) -> (PolicyBaseline, BTreeMap<String, Value>) {
    let mut baseline = policy.clone();
    let mut overrides = BTreeMap::new();
    baseline.source = BaselineSource::Template;

    if baseline.forbid_tables && template.table_present {
        baseline.forbid_tables = false;
        overrides.insert("forbid_tables".to_string(), json!(false));
    }
    let indent = template.dominant_first_line_indent_twips;
    if indent != baseline.first_line_indent_twips {
        overrides.insert("first_line_indent_twips".to_string(), json!(indent));
        baseline.first_line_indent_twips = indent;
    }
    let spacing = template.dominant_line_spacing_twips;
    if spacing != baseline.line_spacing_twips {
        overrides.insert("line_spacing_twips".to_string(), json!(spacing));
        baseline.line_spacing_twips = spacing;
    }

    let runs: BTreeMap<RunId, ExpectedRunStyle> = template
        .touched_runs
        .iter()
        .map(|(run, style)| {
            let expected = ExpectedRunStyle {
                latin_font: style
                    .latin_font
                    .as_deref()
                    .map(|name| policy.font_aliases.canonical(name)),
                east_asia_font: style
                    .east_asia_font
                    .as_deref()
                    .map(|name| policy.font_aliases.canonical(name)),
                size_half_points: style.size_half_points,
            };
            (run.clone(), expected)
        })
        .collect();
    overrides.insert("run_fonts".to_string(), json!("template_runs"));
    baseline.fonts = FontExpectation::TemplateRuns { runs };
    (baseline, overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::observe::RunStyleSnapshot;
    use crate::format::policy::parse_policy;

    fn resolve(yaml: &str) -> Result<PolicyBaseline, PolicyError> {
        resolve_policy(&parse_policy(yaml).unwrap())
    }

    fn policy_fonts(baseline: &PolicyBaseline) -> (Option<&str>, Option<&str>, Option<u32>) {
        match &baseline.fonts {
            FontExpectation::Policy {
                latin_font,
                east_asia_font,
                size_half_points,
            } => (
                latin_font.as_ref().map(FontName::as_str),
                east_asia_font.as_ref().map(FontName::as_str),
                *size_half_points,
            ),
            FontExpectation::TemplateRuns { .. } => panic!("expected policy fonts"),
        }
    }

    #[test]
    fn resolves_alias_references_and_legacy_names() {
        let baseline = resolve(
            "run_font_latin: '@body_latin'\nrun_font_east_asia: 仿宋_GB2312\nrun_size_pt: 16\nfont_aliases:\n  body_latin: Times New Roman\n",
        )
        .unwrap();
        assert_eq!(
            policy_fonts(&baseline),
            (Some("Times New Roman"), Some("仿宋"), Some(32))
        );
        assert_eq!(baseline.font_aliases.canonical("楷体_GB2312").as_str(), "楷体");
        assert_eq!(baseline.font_aliases.canonical("Arial").as_str(), "Arial");
    }

    #[test]
    fn unresolved_alias_is_configuration_error() {
        let err = resolve("run_font_latin: '@missing'\n").unwrap_err();
        assert!(
            matches!(err, PolicyError::UnresolvedAlias { ref alias, .. } if alias == "missing"),
            "{err}"
        );
    }

    #[test]
    fn chained_alias_is_configuration_error() {
        let err = resolve("font_aliases:\n  a: '@b'\n  b: Arial\n").unwrap_err();
        assert!(matches!(err, PolicyError::ChainedAlias { .. }), "{err}");
    }

    #[test]
    fn empty_font_name_is_configuration_error() {
        let err = resolve("run_font_east_asia: ''\n").unwrap_err();
        assert!(matches!(err, PolicyError::EmptyFontName { .. }), "{err}");
    }

    #[test]
    fn template_baseline_overrides_policy_with_template_values() {
        let policy = resolve("forbid_tables: true\nfirst_line_indent_twips: 640\n").unwrap();
        let run = RunId {
            paragraph: crate::docx::ParagraphPath::Body { index: 0 },
            run: 0,
        };
        let template = FormatFingerprint {
            table_present: true,
            table_count: 1,
            dominant_first_line_indent_twips: Some(420),
            touched_runs: [(
                run.clone(),
                RunStyleSnapshot {
                    latin_font: None,
                    east_asia_font: Some("仿宋_GB2312".to_string()),
                    size_half_points: Some(32),
                },
            )]
            .into_iter()
            .collect(),
            ..FormatFingerprint::default()
        };
        let (baseline, overrides) = template_baseline(&policy, &template);
        assert_eq!(baseline.source, BaselineSource::Template);
        assert!(!baseline.forbid_tables);
        assert_eq!(baseline.first_line_indent_twips, Some(420));
        assert_eq!(overrides.get("forbid_tables"), Some(&json!(false)));
        assert_eq!(overrides.get("first_line_indent_twips"), Some(&json!(420)));
        let FontExpectation::TemplateRuns { runs } = &baseline.fonts else {
            panic!("expected template runs");
        };
        let expected = runs.get(&run).unwrap();
        assert_eq!(expected.east_asia_font.as_ref().map(FontName::as_str), Some("仿宋"));
        assert_eq!(expected.size_half_points, Some(32));
    }
}

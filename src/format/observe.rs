use crate::docx::{Body, Paragraph, ParagraphPath, RunId, RunStyle};
use crate::substitute::TouchedRuns;
use serde::Serialize;
use std::collections::BTreeMap;

/// Indents below this many twips never count as a document's dominant indent.
pub const MIN_DOMINANT_INDENT_TWIPS: i64 = 200;

const NONE_KEY: &str = "none";
const UNKNOWN_KEY: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStyleSnapshot {
    pub latin_font: Option<String>,
    pub east_asia_font: Option<String>,
    pub size_half_points: Option<u32>,
}

impl From<&RunStyle> for RunStyleSnapshot {
    fn from(style: &RunStyle) -> Self {
        Self {
            latin_font: style.latin_font.clone(),
            east_asia_font: style.east_asia_font.clone(),
            size_half_points: style.size_half_points,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParagraphSnapshot {
    pub first_line_indent_twips: Option<i64>,
    pub line_spacing_twips: Option<i64>,
    pub has_direct_numbering: bool,
}

/// Structural format summary of one document, scoped to a touched-run set
/// for the per-run and per-paragraph snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormatFingerprint {
    pub dominant_first_line_indent_twips: Option<i64>,
    pub dominant_line_spacing_twips: Option<i64>,
    pub first_line_indent_twips_hist: BTreeMap<String, usize>,
    pub line_spacing_twips_hist: BTreeMap<String, usize>,
    pub run_font_latin_hist: BTreeMap<String, usize>,
    pub run_font_east_asia_hist: BTreeMap<String, usize>,
    pub run_size_half_points_hist: BTreeMap<String, usize>,
    pub table_present: bool,
    pub table_count: usize,
    pub numbering_present: bool,
    pub paragraph_count: usize,
    pub run_count: usize,
    pub touched_paragraphs: BTreeMap<ParagraphPath, ParagraphSnapshot>,
    pub touched_runs: BTreeMap<RunId, RunStyleSnapshot>,
}

impl FormatFingerprint {
    /// Most frequent direct latin or east-asian font, ignoring inherited runs.
    pub fn dominant_latin_font(&self) -> Option<&str> {
        dominant_key(&self.run_font_latin_hist, &[NONE_KEY])
    }

    pub fn dominant_east_asia_font(&self) -> Option<&str> {
        dominant_key(&self.run_font_east_asia_hist, &[NONE_KEY, UNKNOWN_KEY])
    }

    pub fn dominant_size_half_points(&self) -> Option<u32> {
        dominant_key(&self.run_size_half_points_hist, &[NONE_KEY]).and_then(|key| key.parse().ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservedDelta {
    pub table_present_changed: bool,
    pub numbering_present_changed: bool,
    pub first_line_indent_twips_hist_delta: BTreeMap<String, i64>,
}

pub fn observe(body: &Body, scope: &TouchedRuns) -> FormatFingerprint {
    let mut fingerprint = FormatFingerprint {
        table_present: body.table_count > 0,
        table_count: body.table_count,
        paragraph_count: body.paragraphs.len(),
        ..FormatFingerprint::default()
    };

    for paragraph in &body.paragraphs {
        let props = &paragraph.props;
        fingerprint.numbering_present |= props.has_direct_numbering;
        bump(
            &mut fingerprint.first_line_indent_twips_hist,
            twips_key(props.first_line_indent),
        );
        bump(
            &mut fingerprint.line_spacing_twips_hist,
            twips_key(props.line_spacing),
        );
        for run in &paragraph.runs {
            fingerprint.run_count += 1;
            let style = &run.style;
            bump(
                &mut fingerprint.run_font_latin_hist,
                style.latin_font.clone().unwrap_or_else(|| NONE_KEY.to_string()),
            );
            bump(
                &mut fingerprint.run_font_east_asia_hist,
                style
                    .east_asia_font
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_KEY.to_string()),
            );
            bump(
                &mut fingerprint.run_size_half_points_hist,
                style
                    .size_half_points
                    .map_or_else(|| NONE_KEY.to_string(), |size| size.to_string()),
            );
            if scope.contains(&run.id) {
                fingerprint
                    .touched_runs
                    .insert(run.id.clone(), RunStyleSnapshot::from(style));
                fingerprint
                    .touched_paragraphs
                    .entry(paragraph.path.clone())
                    .or_insert_with(|| ParagraphSnapshot {
                        first_line_indent_twips: props.first_line_indent,
                        line_spacing_twips: props.line_spacing,
                        has_direct_numbering: props.has_direct_numbering,
                    });
            }
        }
    }

    fingerprint.dominant_first_line_indent_twips = dominant_body_first(body, |paragraph| {
        paragraph.props.first_line_indent
    }, MIN_DOMINANT_INDENT_TWIPS);
    fingerprint.dominant_line_spacing_twips =
        dominant_body_first(body, |paragraph| paragraph.props.line_spacing, 0);
    fingerprint
}

/// Template-to-rendered change summary.
pub fn observed_delta(template: &FormatFingerprint, rendered: &FormatFingerprint) -> ObservedDelta {
    let mut delta = BTreeMap::new();
    for key in template
        .first_line_indent_twips_hist
        .keys()
        .chain(rendered.first_line_indent_twips_hist.keys())
    {
        let before = count_of(&template.first_line_indent_twips_hist, key);
        let after = count_of(&rendered.first_line_indent_twips_hist, key);
        delta.insert(key.clone(), after - before);
    }
    ObservedDelta {
        table_present_changed: template.table_present != rendered.table_present,
        numbering_present_changed: template.numbering_present != rendered.numbering_present,
        first_line_indent_twips_hist_delta: delta,
    }
}

/// Pick the dominant value from a twips histogram: highest count wins, ties
/// go to the smaller value. `none` and values below `min_twips` are ignored.
pub fn pick_dominant_twips(hist: &BTreeMap<String, usize>, min_twips: i64) -> Option<i64> {
    hist.iter()
        .filter_map(|(key, count)| key.parse::<i64>().ok().map(|twips| (twips, *count)))
        .filter(|(twips, _)| *twips >= min_twips)
        .min_by(|(a_twips, a_count), (b_twips, b_count)| {
            b_count.cmp(a_count).then(a_twips.cmp(b_twips))
        })
        .map(|(twips, _)| twips)
}

fn dominant_body_first(
    body: &Body,
    value: impl Fn(&Paragraph) -> Option<i64>,
    min_twips: i64,
) -> Option<i64> {
    let histogram = |in_table: bool| {
        let mut hist = BTreeMap::new();
        for paragraph in body
            .paragraphs
            .iter()
            .filter(|paragraph| paragraph.path.in_table() == in_table)
        {
            bump(&mut hist, twips_key(value(paragraph)));
        }
        hist
    };
    pick_dominant_twips(&histogram(false), min_twips)
        .or_else(|| pick_dominant_twips(&histogram(true), min_twips))
}

fn dominant_key<'a>(hist: &'a BTreeMap<String, usize>, ignored: &[&str]) -> Option<&'a str> {
    hist.iter()
        .filter(|(key, _)| !ignored.contains(&key.as_str()))
        .min_by(|(a_key, a_count), (b_key, b_count)| b_count.cmp(a_count).then(a_key.cmp(b_key)))
        .map(|(key, _)| key.as_str())
}

fn twips_key(value: Option<i64>) -> String {
    value.map_or_else(|| NONE_KEY.to_string(), |twips| twips.to_string())
}

fn bump(hist: &mut BTreeMap<String, usize>, key: String) {
    *hist.entry(key).or_insert(0) += 1;
}

fn count_of(hist: &BTreeMap<String, usize>, key: &str) -> i64 {
    hist.get(key)
        .and_then(|count| i64::try_from(*count).ok())
        .unwrap_or(0)
}

use super::model::{Paragraph, PropsChild, Run, SegmentSource};
use anyhow::{anyhow, Result};
use quick_xml::escape::escape;
use std::ops::Range;

/// `w:pPr` children in schema order. Inserted elements go before the first
/// existing sibling that ranks later.
const PARAGRAPH_PROPS_ORDER: &[&str] = &[
    "pStyle",
    "keepNext",
    "keepLines",
    "pageBreakBefore",
    "framePr",
    "widowControl",
    "numPr",
    "suppressLineNumbers",
    "pBdr",
    "shd",
    "tabs",
    "suppressAutoHyphens",
    "kinsoku",
    "wordWrap",
    "overflowPunct",
    "topLinePunct",
    "autoSpaceDE",
    "autoSpaceDN",
    "bidi",
    "adjustRightInd",
    "snapToGrid",
    "spacing",
    "ind",
    "contextualSpacing",
    "mirrorIndents",
    "suppressOverlap",
    "jc",
    "textDirection",
    "textAlignment",
    "textboxTightWrap",
    "outlineLvl",
    "divId",
    "cnfStyle",
    "rPr",
    "sectPr",
    "pPrChange",
];

fn schema_rank(qualified: &str) -> usize {
    let local = qualified.rsplit(':').next().unwrap_or(qualified);
    PARAGRAPH_PROPS_ORDER
        .iter()
        .position(|name| *name == local)
        .unwrap_or(PARAGRAPH_PROPS_ORDER.len())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Splice {
    start: usize,
    end: usize,
    order: usize,
    text: String,
}

/// Paragraph-level corrections. `None` leaves the property alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParagraphPatch {
    pub first_line_indent: Option<i64>,
    pub line_spacing: Option<i64>,
    pub remove_numbering: bool,
}

impl ParagraphPatch {
    pub fn is_empty(&self) -> bool {
        self.first_line_indent.is_none() && self.line_spacing.is_none() && !self.remove_numbering
    }
}

/// Ordered, non-overlapping byte splices against one document part.
#[derive(Debug, Clone, Default)]
pub struct EditSet {
    splices: Vec<Splice>,
}

impl EditSet {
    pub fn is_empty(&self) -> bool {
        self.splices.is_empty()
    }

    fn push(&mut self, start: usize, end: usize, text: String) {
        let order = self.splices.len();
        self.splices.push(Splice {
            start,
            end,
            order,
            text,
        });
    }

    /// Replace byte ranges of a run's text, leaving its properties and its
    /// tab and break elements where they are.
    ///
    /// Only `w:t` elements a range touches are rewritten. A range spanning
    /// several `w:t` elements puts its value in the first one.
    pub fn replace_in_run(&mut self, run: &Run, replacements: &[(Range<usize>, &str)]) -> Result<()> {
        let mut ordered = replacements.to_vec();
        ordered.sort_by_key(|(range, _)| range.start);
        for pair in ordered.windows(2) {
            if pair[0].0.end > pair[1].0.start {
                return Err(anyhow!("overlapping replacements in run {}", run.id));
            }
        }
        for (range, _) in &ordered {
            if range.is_empty() || range.end > run.text.len() {
                return Err(anyhow!("replacement {range:?} is out of range in run {}", run.id));
            }
            let crosses_control = run.segments.iter().any(|segment| {
                segment.source == SegmentSource::Control
                    && segment.range.start < range.end
                    && range.start < segment.range.end
            });
            if crosses_control {
                return Err(anyhow!(
                    "replacement {range:?} crosses a tab or break in run {}",
                    run.id
                ));
            }
        }

        for segment in &run.segments {
            let SegmentSource::Text(span) = segment.source else {
                continue;
            };
            let mut rewritten = String::new();
            let mut cursor = segment.range.start;
            let mut changed = false;
            for (range, value) in &ordered {
                if range.end <= segment.range.start || range.start >= segment.range.end {
                    continue;
                }
                let cut_start = range.start.max(segment.range.start);
                rewritten.push_str(run_text(run, cursor..cut_start)?);
                if range.start >= segment.range.start {
                    rewritten.push_str(value);
                }
                cursor = range.end.min(segment.range.end);
                changed = true;
            }
            if !changed {
                continue;
            }
            rewritten.push_str(run_text(run, cursor..segment.range.end)?);
            let element = if rewritten.is_empty() {
                "<w:t/>".to_string()
            } else {
                format!("<w:t xml:space=\"preserve\">{}</w:t>", escape(rewritten.as_str()))
            };
            self.push(span.start, span.end, element);
        }
        Ok(())
    }

    pub fn patch_paragraph(&mut self, paragraph: &Paragraph, patch: &ParagraphPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        if paragraph.self_closing {
            return Err(anyhow!("paragraph {} has no content to patch", paragraph.path));
        }
        let Some(layout) = paragraph.layout.as_ref() else {
            let inserts = [
                patch.line_spacing.map(spacing_element),
                patch.first_line_indent.map(indent_element),
            ];
            let children: String = inserts.into_iter().flatten().collect();
            if !children.is_empty() {
                let at = paragraph.open_tag.end;
                self.push(at, at, format!("<w:pPr>{children}</w:pPr>"));
            }
            return Ok(());
        };

        let mut inserts: Vec<(usize, String)> = Vec::new();
        if let Some(value) = patch.line_spacing {
            match find_child(&layout.children, "w:spacing") {
                Some(child) => self.rewrite_start_tag(child, |attrs| {
                    set_attr(attrs, "w:line", value.to_string());
                    set_attr(attrs, "w:lineRule", "exact".to_string());
                }),
                None => inserts.push((schema_rank("w:spacing"), spacing_element(value))),
            }
        }
        if let Some(value) = patch.first_line_indent {
            match find_child(&layout.children, "w:ind") {
                Some(child) => self.rewrite_start_tag(child, |attrs| {
                    attrs.retain(|(key, _)| {
                        !matches!(key.as_str(), "w:hanging" | "w:hangingChars" | "w:firstLineChars")
                    });
                    set_attr(attrs, "w:firstLine", value.to_string());
                }),
                None => inserts.push((schema_rank("w:ind"), indent_element(value))),
            }
        }
        if patch.remove_numbering {
            if let Some(child) = find_child(&layout.children, "w:numPr") {
                self.push(child.span.start, child.span.end, String::new());
            }
        }
        if inserts.is_empty() {
            return Ok(());
        }

        if layout.self_closing {
            let children: String = inserts.into_iter().map(|(_, xml)| xml).collect();
            self.push(
                layout.span.start,
                layout.span.end,
                format!("<w:pPr>{children}</w:pPr>"),
            );
            return Ok(());
        }
        for (rank, xml) in inserts {
            let at = layout
                .children
                .iter()
                .find(|child| schema_rank(&child.name) > rank)
                .map_or(layout.content_end, |child| child.span.start);
            self.push(at, at, xml);
        }
        Ok(())
    }

    fn rewrite_start_tag(&mut self, child: &PropsChild, update: impl FnOnce(&mut Vec<(String, String)>)) {
        let mut attrs = child.attrs.clone();
        update(&mut attrs);
        self.push(
            child.start_tag.start,
            child.start_tag.end,
            render_start_tag(&child.name, &attrs, child.self_closing),
        );
    }

    /// Apply all splices to `xml`. Overlapping edits are rejected.
    pub fn apply(&self, xml: &str) -> Result<String> {
        let mut ordered: Vec<&Splice> = self.splices.iter().collect();
        ordered.sort_by_key(|splice| (splice.start, splice.end, splice.order));
        let mut out = String::with_capacity(xml.len());
        let mut cursor = 0usize;
        for splice in ordered {
            if splice.start < cursor {
                return Err(anyhow!(
                    "overlapping edits at bytes {}..{}",
                    splice.start,
                    splice.end
                ));
            }
            let keep = xml
                .get(cursor..splice.start)
                .ok_or_else(|| anyhow!("edit start {} is out of range", splice.start))?;
            out.push_str(keep);
            out.push_str(&splice.text);
            cursor = splice.end;
        }
        let tail = xml
            .get(cursor..)
            .ok_or_else(|| anyhow!("edit end {cursor} is out of range"))?;
        out.push_str(tail);
        Ok(out)
    }
}

fn run_text(run: &Run, range: Range<usize>) -> Result<&str> {
    run.text
        .get(range.clone())
        .ok_or_else(|| anyhow!("text range {range:?} splits a character in run {}", run.id))
}

fn find_child<'a>(children: &'a [PropsChild], name: &str) -> Option<&'a PropsChild> {
    children.iter().find(|child| child.name == name)
}

fn set_attr(attrs: &mut Vec<(String, String)>, key: &str, value: String) {
    match attrs.iter_mut().find(|(name, _)| name == key) {
        Some(slot) => slot.1 = value,
        None => attrs.push((key.to_string(), value)),
    }
}

fn render_start_tag(name: &str, attrs: &[(String, String)], self_closing: bool) -> String {
    let mut out = format!("<{name}");
    for (key, value) in attrs {
        out.push_str(&format!(" {key}=\"{}\"", escape(value.as_str())));
    }
    out.push_str(if self_closing { "/>" } else { ">" });
    out
}

fn spacing_element(twips: i64) -> String {
    format!("<w:spacing w:line=\"{twips}\" w:lineRule=\"exact\"/>")
}

fn indent_element(twips: i64) -> String {
    format!("<w:ind w:firstLine=\"{twips}\"/>")
}

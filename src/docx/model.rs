use anyhow::{anyhow, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Range;

/// Byte range into `word/document.xml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Stable address of a paragraph: body order, or table/row/cell order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParagraphPath {
    Body {
        index: usize,
    },
    Cell {
        table: usize,
        row: usize,
        cell: usize,
        index: usize,
    },
}

impl ParagraphPath {
    pub fn table(&self) -> Option<usize> {
        match self {
            ParagraphPath::Body { .. } => None,
            ParagraphPath::Cell { table, .. } => Some(*table),
        }
    }

    pub fn in_table(&self) -> bool {
        self.table().is_some()
    }
}

impl fmt::Display for ParagraphPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParagraphPath::Body { index } => write!(f, "p{index}"),
            ParagraphPath::Cell {
                table,
                row,
                cell,
                index,
            } => write!(f, "t{table}.r{row}.c{cell}.p{index}"),
        }
    }
}

impl Serialize for ParagraphPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Run address: its paragraph plus the run's position among direct children.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId {
    pub paragraph: ParagraphPath,
    pub run: usize,
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:r{}", self.paragraph, self.run)
    }
}

impl Serialize for RunId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Direct run properties. `None` means the value is inherited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub latin_font: Option<String>,
    pub east_asia_font: Option<String>,
    pub size_half_points: Option<u32>,
    pub bold: bool,
    pub italic: bool,
}

/// Direct paragraph properties, in twips.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParagraphProps {
    pub first_line_indent: Option<i64>,
    pub line_spacing: Option<i64>,
    pub has_direct_numbering: bool,
}

/// Origin of one slice of a run's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentSource {
    /// A `w:t` element at this span of the part.
    Text(Span),
    /// `w:tab`, `w:br` or `w:cr`, read as `\t` or `\n`.
    Control,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub(crate) source: SegmentSource,
    /// Byte range in `Run::text`.
    pub(crate) range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: RunId,
    /// Visible text in element order, with tabs and line breaks inline.
    pub text: String,
    pub style: RunStyle,
    pub(crate) segments: Vec<Segment>,
}

/// One direct child element of `w:pPr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropsChild {
    pub name: String,
    pub span: Span,
    pub start_tag: Span,
    pub attrs: Vec<(String, String)>,
    pub self_closing: bool,
}

/// Byte layout of a `w:pPr` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropsLayout {
    pub span: Span,
    pub content_end: usize,
    pub self_closing: bool,
    pub children: Vec<PropsChild>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub path: ParagraphPath,
    pub props: ParagraphProps,
    pub runs: Vec<Run>,
    pub(crate) open_tag: Span,
    pub(crate) self_closing: bool,
    pub(crate) layout: Option<PropsLayout>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

/// Paragraphs of the main story in document order (body, then each table as
/// it appears), plus the table count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    pub paragraphs: Vec<Paragraph>,
    pub table_count: usize,
}

impl Body {
    pub fn paragraph(&self, path: &ParagraphPath) -> Option<&Paragraph> {
        self.paragraphs
            .iter()
            .find(|paragraph| &paragraph.path == path)
    }

    pub fn run(&self, id: &RunId) -> Option<&Run> {
        self.paragraph(&id.paragraph)
            .and_then(|paragraph| paragraph.runs.get(id.run))
    }
}

pub(crate) fn parse_body(xml: &str) -> Result<Body> {
    BodyParser::new(xml).parse()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Paragraph,
    Run,
    Text,
    Tab,
    Break,
    ParagraphProps,
    RunProps,
    Table,
    Row,
    Cell,
    Other,
}

fn classify(name: &[u8]) -> Tag {
    match name {
        b"w:p" => Tag::Paragraph,
        b"w:r" => Tag::Run,
        b"w:t" => Tag::Text,
        b"w:tab" => Tag::Tab,
        b"w:br" | b"w:cr" => Tag::Break,
        b"w:pPr" => Tag::ParagraphProps,
        b"w:rPr" => Tag::RunProps,
        b"w:tbl" => Tag::Table,
        b"w:tr" => Tag::Row,
        b"w:tc" => Tag::Cell,
        _ => Tag::Other,
    }
}

struct TableCursor {
    index: usize,
    row: Option<usize>,
    cell: Option<usize>,
    paragraph: usize,
}

struct ParagraphBuilder {
    path: ParagraphPath,
    depth: usize,
    open_tag: Span,
    self_closing: bool,
    props: ParagraphProps,
    layout: Option<PropsLayout>,
    layout_depth: usize,
    layout_open: bool,
    runs: Vec<Run>,
}

struct RunBuilder {
    index: usize,
    depth: usize,
    text: String,
    style: RunStyle,
    segments: Vec<Segment>,
    /// Part offset and text offset of the open `w:t`.
    open_text: Option<(usize, usize)>,
    props_open: bool,
}

impl RunBuilder {
    fn push_control(&mut self, ch: char) {
        let start = self.text.len();
        self.text.push(ch);
        self.segments.push(Segment {
            source: SegmentSource::Control,
            range: start..self.text.len(),
        });
    }
}

struct BodyParser<'x> {
    reader: Reader<&'x [u8]>,
    stack: Vec<Tag>,
    tables: Vec<TableCursor>,
    table_count: usize,
    body_index: usize,
    paragraphs: Vec<Paragraph>,
    paragraph: Option<ParagraphBuilder>,
    run: Option<RunBuilder>,
    nested_paragraphs: usize,
}

impl<'x> BodyParser<'x> {
    fn new(xml: &'x str) -> Self {
        Self {
            reader: Reader::from_str(xml),
            stack: Vec::new(),
            tables: Vec::new(),
            table_count: 0,
            body_index: 0,
            paragraphs: Vec::new(),
            paragraph: None,
            run: None,
            nested_paragraphs: 0,
        }
    }

    fn position(&self) -> Result<usize> {
        usize::try_from(self.reader.buffer_position())
            .map_err(|_| anyhow!("document offset exceeds address space"))
    }

    fn parse(mut self) -> Result<Body> {
        loop {
            let start = self.position()?;
            let event = self
                .reader
                .read_event()
                .map_err(|err| anyhow!("malformed XML near byte {start}: {err}"))?;
            let end = self.position()?;
            let span = Span { start, end };
            match event {
                Event::Start(tag) => {
                    let kind = classify(tag.name().as_ref());
                    self.open(kind, &tag, span, false)?;
                    self.stack.push(kind);
                }
                Event::Empty(tag) => {
                    let kind = classify(tag.name().as_ref());
                    self.open(kind, &tag, span, true)?;
                    self.close(kind, span);
                }
                Event::End(_) => {
                    let kind = self
                        .stack
                        .pop()
                        .ok_or_else(|| anyhow!("unbalanced end tag near byte {start}"))?;
                    self.close(kind, span);
                }
                Event::Text(text) => {
                    if self.collecting_text() {
                        let decoded = text
                            .unescape()
                            .map_err(|err| anyhow!("decode text near byte {start}: {err}"))?;
                        if let Some(run) = self.run.as_mut() {
                            run.text.push_str(&decoded);
                        }
                    }
                }
                Event::CData(data) => {
                    if self.collecting_text() {
                        let raw = String::from_utf8_lossy(&data).into_owned();
                        if let Some(run) = self.run.as_mut() {
                            run.text.push_str(&raw);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if !self.stack.is_empty() {
            return Err(anyhow!("document ended with {} open element(s)", self.stack.len()));
        }
        if self.nested_paragraphs > 0 {
            tracing::warn!(
                count = self.nested_paragraphs,
                "ignoring paragraphs nested inside runs"
            );
        }
        Ok(Body {
            paragraphs: self.paragraphs,
            table_count: self.table_count,
        })
    }

    fn inside_run_content(&self) -> bool {
        self.stack.contains(&Tag::Run)
    }

    fn collecting_text(&self) -> bool {
        self.stack.last() == Some(&Tag::Text)
            && self
                .run
                .as_ref()
                .is_some_and(|run| run.open_text.is_some() && run.depth + 2 == self.stack.len())
    }

    fn open(&mut self, kind: Tag, tag: &BytesStart<'_>, span: Span, empty: bool) -> Result<()> {
        let depth = self.stack.len();
        if let Some(paragraph) = self.paragraph.as_mut() {
            if paragraph.layout_open && paragraph.layout_depth + 1 == depth {
                let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                let attrs = attributes(tag)?;
                apply_paragraph_property(&mut paragraph.props, &name, &attrs);
                if let Some(layout) = paragraph.layout.as_mut() {
                    layout.children.push(PropsChild {
                        name,
                        span,
                        start_tag: span,
                        attrs,
                        self_closing: empty,
                    });
                }
                return Ok(());
            }
        }
        if let Some(run) = self.run.as_mut() {
            if run.props_open && run.depth + 2 == depth {
                let name = tag.name();
                let attrs = attributes(tag)?;
                apply_run_property(&mut run.style, name.as_ref(), &attrs);
                return Ok(());
            }
        }

        match kind {
            Tag::Table if !self.inside_run_content() => {
                self.tables.push(TableCursor {
                    index: self.table_count,
                    row: None,
                    cell: None,
                    paragraph: 0,
                });
                self.table_count += 1;
            }
            Tag::Row if !self.inside_run_content() => {
                if let Some(table) = self.tables.last_mut() {
                    table.row = Some(table.row.map_or(0, |row| row + 1));
                    table.cell = None;
                }
            }
            Tag::Cell if !self.inside_run_content() => {
                if let Some(table) = self.tables.last_mut() {
                    table.cell = Some(table.cell.map_or(0, |cell| cell + 1));
                    table.paragraph = 0;
                }
            }
            Tag::Paragraph if self.paragraph.is_none() && !self.inside_run_content() => {
                let path = match self.tables.last_mut() {
                    Some(table) => {
                        let path = ParagraphPath::Cell {
                            table: table.index,
                            row: table.row.unwrap_or(0),
                            cell: table.cell.unwrap_or(0),
                            index: table.paragraph,
                        };
                        table.paragraph += 1;
                        path
                    }
                    None => {
                        let path = ParagraphPath::Body {
                            index: self.body_index,
                        };
                        self.body_index += 1;
                        path
                    }
                };
                self.paragraph = Some(ParagraphBuilder {
                    path,
                    depth,
                    open_tag: span,
                    self_closing: empty,
                    props: ParagraphProps::default(),
                    layout: None,
                    layout_depth: 0,
                    layout_open: false,
                    runs: Vec::new(),
                });
            }
            Tag::Paragraph if self.inside_run_content() => {
                self.nested_paragraphs += 1;
            }
            Tag::ParagraphProps => {
                if let Some(paragraph) = self.paragraph.as_mut() {
                    if paragraph.depth + 1 == depth && paragraph.layout.is_none() {
                        paragraph.layout = Some(PropsLayout {
                            span,
                            content_end: span.end,
                            self_closing: empty,
                            children: Vec::new(),
                        });
                        paragraph.layout_depth = depth;
                        paragraph.layout_open = !empty;
                    }
                }
            }
            Tag::Run => {
                if let Some(paragraph) = self.paragraph.as_ref() {
                    if paragraph.depth + 1 == depth && self.run.is_none() {
                        self.run = Some(RunBuilder {
                            index: paragraph.runs.len(),
                            depth,
                            text: String::new(),
                            style: RunStyle::default(),
                            segments: Vec::new(),
                            open_text: None,
                            props_open: false,
                        });
                    }
                }
            }
            Tag::RunProps => {
                if let Some(run) = self.run.as_mut() {
                    if run.depth + 1 == depth {
                        run.props_open = !empty;
                    }
                }
            }
            Tag::Text => {
                if let Some(run) = self.run.as_mut() {
                    if run.depth + 1 == depth {
                        run.open_text = Some((span.start, run.text.len()));
                    }
                }
            }
            Tag::Tab | Tag::Break => {
                if let Some(run) = self.run.as_mut() {
                    if run.depth + 1 == depth {
                        if let Some(ch) = control_char(kind, &attributes(tag)?) {
                            run.push_control(ch);
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, kind: Tag, span: Span) {
        let depth = self.stack.len();
        if let Some(paragraph) = self.paragraph.as_mut() {
            if paragraph.layout_open && paragraph.layout_depth + 1 == depth {
                if let Some(child) = paragraph
                    .layout
                    .as_mut()
                    .and_then(|layout| layout.children.last_mut())
                {
                    child.span.end = span.end;
                }
                return;
            }
        }

        match kind {
            Tag::Table if !self.inside_run_content() => {
                self.tables.pop();
            }
            Tag::Paragraph => {
                if self
                    .paragraph
                    .as_ref()
                    .is_some_and(|paragraph| paragraph.depth == depth)
                {
                    if let Some(builder) = self.paragraph.take() {
                        self.paragraphs.push(Paragraph {
                            path: builder.path,
                            props: builder.props,
                            runs: builder.runs,
                            open_tag: builder.open_tag,
                            self_closing: builder.self_closing,
                            layout: builder.layout,
                        });
                    }
                }
            }
            Tag::ParagraphProps => {
                if let Some(paragraph) = self.paragraph.as_mut() {
                    if paragraph.layout_open && paragraph.layout_depth == depth {
                        if let Some(layout) = paragraph.layout.as_mut() {
                            layout.content_end = span.start;
                            layout.span.end = span.end;
                        }
                        paragraph.layout_open = false;
                    }
                }
            }
            Tag::Run => {
                if self.run.as_ref().is_some_and(|run| run.depth == depth) {
                    if let (Some(builder), Some(paragraph)) = (self.run.take(), self.paragraph.as_mut())
                    {
                        paragraph.runs.push(Run {
                            id: RunId {
                                paragraph: paragraph.path.clone(),
                                run: builder.index,
                            },
                            text: builder.text,
                            style: builder.style,
                            segments: builder.segments,
                        });
                    }
                }
            }
            Tag::RunProps => {
                if let Some(run) = self.run.as_mut() {
                    if run.depth + 1 == depth {
                        run.props_open = false;
                    }
                }
            }
            Tag::Text => {
                if let Some(run) = self.run.as_mut() {
                    if run.depth + 1 == depth {
                        let (start, offset) =
                            run.open_text.take().unwrap_or((span.start, run.text.len()));
                        run.segments.push(Segment {
                            source: SegmentSource::Text(Span {
                                start,
                                end: span.end,
                            }),
                            range: offset..run.text.len(),
                        });
                    }
                }
            }
            _ => {}
        }
    }
}

fn attributes(tag: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in tag.attributes() {
        let attr = attr.map_err(|err| anyhow!("read attribute: {err}"))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| anyhow!("decode attribute {key}: {err}"))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

fn apply_paragraph_property(props: &mut ParagraphProps, name: &str, attrs: &[(String, String)]) {
    match name {
        "w:ind" => {
            props.first_line_indent = attr(attrs, "w:firstLine").and_then(|v| v.parse().ok());
        }
        "w:spacing" => {
            // Auto line rules store 240ths of a line, not twips.
            let rule = attr(attrs, "w:lineRule").unwrap_or("auto");
            props.line_spacing = match rule {
                "exact" | "atLeast" => attr(attrs, "w:line").and_then(|v| v.parse().ok()),
                _ => None,
            };
        }
        "w:numPr" => props.has_direct_numbering = true,
        _ => {}
    }
}

fn apply_run_property(style: &mut RunStyle, name: &[u8], attrs: &[(String, String)]) {
    match name {
        b"w:rFonts" => {
            style.latin_font = attr(attrs, "w:ascii").map(str::to_string);
            style.east_asia_font = attr(attrs, "w:eastAsia").map(str::to_string);
        }
        b"w:sz" => {
            style.size_half_points = attr(attrs, "w:val").and_then(|v| v.parse().ok());
        }
        b"w:b" => style.bold = toggle_on(attrs),
        b"w:i" => style.italic = toggle_on(attrs),
        _ => {}
    }
}

/// Page and column breaks carry no text.
fn control_char(kind: Tag, attrs: &[(String, String)]) -> Option<char> {
    match kind {
        Tag::Tab => Some('\t'),
        Tag::Break => match attr(attrs, "w:type") {
            Some("page" | "column") => None,
            _ => Some('\n'),
        },
        _ => None,
    }
}

fn toggle_on(attrs: &[(String, String)]) -> bool {
    !matches!(attr(attrs, "w:val"), Some("0" | "false" | "off"))
}

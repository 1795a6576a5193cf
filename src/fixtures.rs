//! In-memory docx builders for unit tests.
use quick_xml::escape::escape;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

pub fn run(text: &str) -> String {
    format!("<w:r><w:t>{}</w:t></w:r>", escape(text))
}

pub fn styled_run(text: &str, run_props: &str) -> String {
    format!(
        "<w:r><w:rPr>{run_props}</w:rPr><w:t>{}</w:t></w:r>",
        escape(text)
    )
}

pub fn paragraph(runs: &[String]) -> String {
    format!("<w:p>{}</w:p>", runs.concat())
}

pub fn paragraph_with_props(props: &str, runs: &[String]) -> String {
    format!("<w:p><w:pPr>{props}</w:pPr>{}</w:p>", runs.concat())
}

/// Rows of cells of paragraphs.
pub fn table(rows: Vec<Vec<Vec<String>>>) -> String {
    let mut out = String::from("<w:tbl>");
    for row in rows {
        out.push_str("<w:tr>");
        for cell in row {
            out.push_str(&format!("<w:tc>{}</w:tc>", cell.concat()));
        }
        out.push_str("</w:tr>");
    }
    out.push_str("</w:tbl>");
    out
}

pub fn document_xml(blocks: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}<w:sectPr/></w:body></w:document>",
        blocks.concat()
    )
}

pub fn docx_from_xml(document: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, body) in [
        (CONTENT_TYPES_PART, CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("word/document.xml", document),
    ] {
        writer.start_file(name, options).expect("start fixture entry");
        writer
            .write_all(body.as_bytes())
            .expect("write fixture entry");
    }
    writer.finish().expect("finish fixture").into_inner()
}

pub fn docx_bytes(blocks: &[String]) -> Vec<u8> {
    docx_from_xml(&document_xml(blocks))
}

/// A template and its rendered form after substitution with `meeting_notice`.
pub struct Rendered {
    pub template: crate::docx::Document,
    pub rendered: crate::docx::Document,
    pub substitution: crate::substitute::Substitution,
}

pub fn render_meeting(blocks: &[String], payload: serde_json::Value) -> Rendered {
    use crate::skills::{BuiltinSkills, SkillRegistry};

    let template = crate::docx::Document::from_bytes(docx_bytes(blocks)).expect("fixture docx");
    let tokens = crate::placeholder::scan_body(template.body());
    let skill = BuiltinSkills.lookup("meeting_notice").expect("meeting_notice");
    let payload = payload.as_object().cloned().unwrap_or_default();
    let substitution = crate::substitute::substitute(
        template.body(),
        &tokens,
        skill,
        &payload,
        crate::config::BracketMode::Strict,
    )
    .expect("substitute");
    let rendered = template.apply(&substitution.edits).expect("apply edits");
    Rendered {
        template,
        rendered,
        substitution,
    }
}

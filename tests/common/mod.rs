//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Carried through untouched; tests compare it byte for byte.
pub const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:sz w:val="24"/></w:rPr></w:rPrDefault></w:docDefaults></w:styles>"#;

pub const OFFICIAL_RUN_PROPS: &str =
    r#"<w:rFonts w:ascii="Times New Roman" w:eastAsia="仿宋_GB2312"/><w:sz w:val="32"/>"#;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

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

/// A one-row table with one paragraph list per cell.
pub fn table_row(cells: &[Vec<String>]) -> String {
    let cells: String = cells
        .iter()
        .map(|cell| format!("<w:tc>{}</w:tc>", cell.concat()))
        .collect();
    format!("<w:tbl><w:tr>{cells}</w:tr></w:tbl>")
}

pub fn document_xml(blocks: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}<w:sectPr/></w:body></w:document>",
        blocks.concat()
    )
}

/// Build a minimal docx package in memory.
pub fn docx(blocks: &[String]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    let document = document_xml(blocks);
    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("word/styles.xml", STYLES_XML),
        ("word/document.xml", document.as_str()),
    ] {
        writer.start_file(name, options).expect("start entry");
        writer.write_all(body.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish docx").into_inner()
}

/// Read one package part as text.
pub fn read_part(package: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(package)).expect("open docx");
    let mut entry = archive.by_name(name).expect("package part");
    let mut text = String::new();
    entry.read_to_string(&mut text).expect("read part");
    text
}

pub fn payload(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().expect("payload object")
}

/// A temporary working directory holding a template and a task file.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new(template: &[u8], task: &serde_json::Value) -> Self {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("template.docx"), template).expect("write template");
        std::fs::write(
            dir.path().join("task.json"),
            serde_json::to_vec(task).expect("task json"),
        )
        .expect("write task");
        Self { dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.path("out")
    }

    /// Run `docops run` with the workspace template, task and output dir.
    pub fn run(&self, extra: &[&str]) -> Output {
        let mut args: Vec<String> = vec![
            "run".to_string(),
            "--template".to_string(),
            path_arg(&self.path("template.docx")),
            "--task".to_string(),
            path_arg(&self.path("task.json")),
            "--out-dir".to_string(),
            path_arg(&self.out_dir()),
        ];
        args.extend(extra.iter().map(|arg| arg.to_string()));
        docops(&args)
    }

    pub fn artifact_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.out_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn read_json(&self, name: &str) -> serde_json::Value {
        let bytes = std::fs::read(self.out_dir().join(name)).expect("read artifact");
        serde_json::from_slice(&bytes).expect("artifact json")
    }
}

pub fn docops<S: AsRef<std::ffi::OsStr>>(args: &[S]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docops"))
        .args(args)
        .env_remove("DOCOPS_LOG")
        .output()
        .expect("run docops")
}

pub fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

pub const ARTIFACTS: [&str; 4] = [
    "out.docx",
    "out.format_report.json",
    "out.missing_fields.json",
    "out.replace_log.json",
];

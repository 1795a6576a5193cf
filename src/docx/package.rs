use anyhow::{anyhow, Context, Result};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const DOCUMENT_PART: &str = "word/document.xml";

/// Raw package bytes plus the decoded main document part.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    original: Vec<u8>,
    document_xml: String,
}

impl DocxPackage {
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let document_xml = {
            let mut archive =
                ZipArchive::new(Cursor::new(bytes.as_slice())).context("open docx archive")?;
            let mut part = archive
                .by_name(DOCUMENT_PART)
                .with_context(|| format!("locate {DOCUMENT_PART}"))?;
            let mut xml = String::new();
            part.read_to_string(&mut xml)
                .with_context(|| format!("read {DOCUMENT_PART} as UTF-8"))?;
            xml
        };
        Ok(Self {
            original: bytes,
            document_xml,
        })
    }

    pub fn document_xml(&self) -> &str {
        &self.document_xml
    }

    /// Write a package carrying `document_xml` as its main part.
    ///
    /// Every other entry is raw-copied, compressed bytes included.
    pub fn write_with(&self, document_xml: &str) -> Result<Vec<u8>> {
        if document_xml == self.document_xml {
            return Ok(self.original.clone());
        }
        let mut archive = ZipArchive::new(Cursor::new(self.original.as_slice()))
            .context("reopen docx archive")?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut wrote_document = false;
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .with_context(|| format!("read archive entry {index}"))?;
            if entry.name() == DOCUMENT_PART {
                drop(entry);
                let options =
                    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                writer
                    .start_file(DOCUMENT_PART, options)
                    .context("start document part")?;
                writer
                    .write_all(document_xml.as_bytes())
                    .context("write document part")?;
                wrote_document = true;
            } else {
                let name = entry.name().to_string();
                writer
                    .raw_copy_file(entry)
                    .with_context(|| format!("copy archive entry {name}"))?;
            }
        }
        if !wrote_document {
            return Err(anyhow!("{DOCUMENT_PART} vanished while rewriting package"));
        }
        let cursor = writer.finish().context("finish docx archive")?;
        Ok(cursor.into_inner())
    }
}

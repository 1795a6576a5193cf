//! WordprocessingML package access: parse `word/document.xml` into a
//! paragraph/run model and apply byte-range splice edits.
//!
//! Everything outside an edited span is carried through byte-for-byte, and
//! untouched package parts are copied raw.
use anyhow::{Context, Result};

mod edit;
mod model;
mod package;

pub use edit::{EditSet, ParagraphPatch};
pub use model::{
    Body, Paragraph, ParagraphPath, ParagraphProps, PropsChild, PropsLayout, Run, RunId, RunStyle,
    Span,
};
pub use package::{DocxPackage, DOCUMENT_PART};

/// A loaded package plus the parsed body of its main document part.
#[derive(Debug, Clone)]
pub struct Document {
    package: DocxPackage,
    xml: String,
    body: Body,
}

impl Document {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let package = DocxPackage::open(bytes)?;
        let xml = package.document_xml().to_string();
        let body = model::parse_body(&xml).context("parse document body")?;
        Ok(Self { package, xml, body })
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Apply splice edits and re-parse the result.
    pub fn apply(&self, edits: &EditSet) -> Result<Document> {
        if edits.is_empty() {
            return Ok(self.clone());
        }
        let xml = edits.apply(&self.xml)?;
        let body = model::parse_body(&xml).context("re-parse edited document body")?;
        Ok(Document {
            package: self.package.clone(),
            xml,
            body,
        })
    }

    /// Serialize the package. An unedited document returns the input bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.package.write_with(&self.xml)
    }
}

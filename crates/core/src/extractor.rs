use crate::error::IngestError;
use lopdf::Document;
use regex::Regex;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["txt", "md", "pdf", "docx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Markdown,
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" => Some(Self::PlainText),
            "md" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Turns the raw bytes of one document into text. `path` only names the
/// document in errors and logs.
pub trait TextExtractor {
    fn extract(&self, path: &Path, bytes: &[u8]) -> Result<String, IngestError>;
}

#[derive(Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path, bytes: &[u8]) -> Result<String, IngestError> {
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|error| extraction_error(path, error))
    }
}

#[derive(Default)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn extract_pages(&self, path: &Path, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load_mem(bytes).map_err(|error| extraction_error(path, error))?;
        let page_ids = document.get_pages();
        if page_ids.is_empty() {
            return Err(extraction_error(path, "document has no pages"));
        }

        let mut pages = Vec::new();
        for page_no in page_ids.into_keys() {
            // Image-only pages either fail text extraction or come back blank.
            let text = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    debug!(path = %path.display(), page = page_no, %error, "page has no extractable text");
                    continue;
                }
            };

            // lopdf closes every text object with a newline of its own.
            let text = text.trim_end_matches('\n');
            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text: text.to_string(),
                });
            }
        }

        Ok(pages)
    }
}

impl TextExtractor for LopdfExtractor {
    fn extract(&self, path: &Path, bytes: &[u8]) -> Result<String, IngestError> {
        let mut text = String::new();
        for page in self.extract_pages(path, bytes)? {
            debug!(path = %path.display(), page = page.number, chars = page.text.len(), "extracted page");
            text.push_str(&page.text);
            text.push('\n');
        }
        Ok(text)
    }
}

#[derive(Default)]
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn extract(&self, path: &Path, bytes: &[u8]) -> Result<String, IngestError> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|error| extraction_error(path, error))?;
        let mut body = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|error| extraction_error(path, error))?
            .read_to_string(&mut body)
            .map_err(|error| extraction_error(path, error))?;

        Ok(docx_paragraphs(&body)?.join("\n"))
    }
}

/// Reads `path` as plain text, choosing the extractor from its extension.
pub fn extract_text(path: &Path) -> Result<String, IngestError> {
    let format = document_format(path)?;
    let bytes = fs::read(path)?;
    extract_with(format, path, &bytes)
}

/// Same as [`extract_text`] for a document whose bytes were already read.
pub fn extract_document(path: &Path, bytes: &[u8]) -> Result<String, IngestError> {
    extract_with(document_format(path)?, path, bytes)
}

fn document_format(path: &Path) -> Result<DocumentFormat, IngestError> {
    DocumentFormat::from_path(path)
        .ok_or_else(|| IngestError::UnsupportedFormat(path.display().to_string()))
}

fn extract_with(format: DocumentFormat, path: &Path, bytes: &[u8]) -> Result<String, IngestError> {
    match format {
        DocumentFormat::PlainText | DocumentFormat::Markdown => PlainTextExtractor.extract(path, bytes),
        DocumentFormat::Pdf => LopdfExtractor.extract(path, bytes),
        DocumentFormat::Docx => DocxExtractor.extract(path, bytes),
    }
}

fn extraction_error(path: &Path, error: impl std::fmt::Display) -> IngestError {
    IngestError::Extraction {
        path: path.display().to_string(),
        details: error.to_string(),
    }
}

fn docx_paragraphs(xml: &str) -> Result<Vec<String>, IngestError> {
    let paragraph_re = Regex::new(r"(?s)<w:p(?:\s[^>]*)?/>|<w:p(?:\s[^>]*)?>(.*?)</w:p>")?;
    let properties_re = Regex::new(r"(?s)<w:pPr>.*?</w:pPr>|<w:pPr/>")?;
    let run_re = Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:(tab|br|cr)(?:\s[^>]*)?/>")?;

    let paragraphs = paragraph_re
        .captures_iter(xml)
        .map(|paragraph| {
            let body = paragraph.get(1).map(|m| m.as_str()).unwrap_or_default();
            let body = properties_re.replace_all(body, "");

            let mut text = String::new();
            for run in run_re.captures_iter(&body) {
                if let Some(value) = run.get(1) {
                    text.push_str(&unescape_xml(value.as_str()));
                } else if let Some(tag) = run.get(2) {
                    text.push(if tag.as_str() == "tab" { '\t' } else { '\n' });
                }
            }
            text
        })
        .collect();

    Ok(paragraphs)
}

fn unescape_xml(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };

        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                .and_then(|code| code.ok())
                .and_then(char::from_u32),
        };

        match decoded {
            Some(ch) => out.push(ch),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}

//! Plain-text extraction for corpus files.
//!
//! The knowledge base only needs `path -> text`; this module provides the
//! [`TextExtractor`] seam and the default [`FileExtractor`], which handles
//! plain text, Markdown, PDF and Word (`.docx`) files. An extraction error
//! never panics: the caller logs it and skips the file.

use std::fs;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// File extensions the corpus scanner recognises by default.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "pdf", "docx"];

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Per-file extraction failure.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Ooxml(String),
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    /// The extractor panicked on a malformed file.
    #[error("extractor crashed: {0}")]
    Crashed(String),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a corpus file into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Default extractor dispatching on the file extension.
#[derive(Debug, Clone)]
pub struct FileExtractor {
    max_file_bytes: u64,
}

impl FileExtractor {
    pub fn new(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }
}

impl Default for FileExtractor {
    fn default() -> Self {
        Self::new(20 * 1024 * 1024)
    }
}

impl TextExtractor for FileExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let size = fs::metadata(path)?.len();
        if size > self.max_file_bytes {
            return Err(ExtractError::TooLarge {
                size,
                limit: self.max_file_bytes,
            });
        }

        let ext = extension_of(path);
        match ext.as_str() {
            "txt" | "md" => {
                let bytes = fs::read(path)?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            "pdf" => extract_pdf(&fs::read(path)?),
            "docx" => extract_docx(&fs::read(path)?),
            other => Err(ExtractError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Lower-cased extension without the dot (empty when there is none).
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Ooxml("word/document.xml not found".to_string()))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    extract_paragraph_text(&doc_xml)
}

/// Collect `<w:t>` runs, one line per `<w:p>` paragraph.
fn extract_paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

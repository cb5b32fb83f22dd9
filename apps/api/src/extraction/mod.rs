//! Text Extractor: turns an uploaded PDF or DOCX into plain text.
//!
//! Uploads are spooled to a scoped temp file for the duration of extraction.
//! The `NamedTempFile` guard removes the file on every exit path, including a
//! panic inside the parsing crate (unwinding drops the guard).
//!
//! Parsing is CPU-bound and runs inside `tokio::task::spawn_blocking`.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Could not extract text: {0}")]
    ExtractionFailure(String),
}

impl From<std::io::Error> for ExtractError {
    fn from(e: std::io::Error) -> Self {
        ExtractError::ExtractionFailure(format!("spool I/O error: {e}"))
    }
}

/// The document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Classifies a file by the text after its last `.`, case-insensitively.
    pub fn from_file_name(file_name: &str) -> Result<Self, ExtractError> {
        match file_extension(file_name).as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "docx" => Ok(DocumentKind::Docx),
            other => Err(ExtractError::UnsupportedFileType(other.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
        }
    }
}

/// Lowercased extension of a file name; empty when the name has no `.`.
pub fn file_extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// The extraction seam used by the resume pipeline.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, file_name: &str, bytes: Bytes) -> Result<String, ExtractError>;
}

/// Production extractor backed by `pdf-extract` and `docx-rs`.
#[derive(Debug, Clone, Default)]
pub struct DocumentExtractor {
    /// Directory for spooled uploads. `None` uses the system temp dir.
    spool_dir: Option<PathBuf>,
}

impl DocumentExtractor {
    pub fn new(spool_dir: Option<PathBuf>) -> Self {
        Self { spool_dir }
    }
}

#[async_trait]
impl TextExtractor for DocumentExtractor {
    async fn extract(&self, file_name: &str, bytes: Bytes) -> Result<String, ExtractError> {
        let kind = DocumentKind::from_file_name(file_name)?;
        let spool_dir = self.spool_dir.clone();

        let text = tokio::task::spawn_blocking(move || {
            extract_spooled(kind, &bytes, spool_dir.as_deref())
        })
        .await
        .map_err(|e| {
            if e.is_panic() {
                ExtractError::ExtractionFailure(format!(
                    "{} parser panicked",
                    kind.extension()
                ))
            } else {
                ExtractError::ExtractionFailure(format!("extraction task failed: {e}"))
            }
        })??;

        debug!("Extracted {} chars from {}", text.len(), file_name);
        Ok(text)
    }
}

fn extract_spooled(
    kind: DocumentKind,
    bytes: &[u8],
    spool_dir: Option<&Path>,
) -> Result<String, ExtractError> {
    let suffix = format!(".{}", kind.extension());
    let mut builder = tempfile::Builder::new();
    builder.prefix("resume-").suffix(&suffix);
    let mut spool = match spool_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    spool.write_all(bytes)?;
    spool.flush()?;

    match kind {
        DocumentKind::Pdf => pdf_text(spool.path()),
        DocumentKind::Docx => docx_text(&std::fs::read(spool.path())?),
    }
}

/// All pages in document order, trimmed.
fn pdf_text(path: &Path) -> Result<String, ExtractError> {
    pdf_extract::extract_text(path)
        .map(|text| text.trim().to_string())
        .map_err(|e| ExtractError::ExtractionFailure(format!("pdf: {e}")))
}

/// Body paragraphs in document order, one per line.
pub fn docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let doc = docx_rs::read_docx(bytes)
        .map_err(|e| ExtractError::ExtractionFailure(format!("docx: {e}")))?;

    let paragraphs: Vec<String> = doc
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            docx_rs::DocumentChild::Paragraph(p) => Some(paragraph_text(&p.children)),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

fn paragraph_text(children: &[docx_rs::ParagraphChild]) -> String {
    let mut text = String::new();
    for child in children {
        match child {
            docx_rs::ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        docx_rs::RunChild::Text(t) => text.push_str(&t.text),
                        docx_rs::RunChild::Tab(_) => text.push('\t'),
                        docx_rs::RunChild::Break(_) => text.push('\n'),
                        _ => {}
                    }
                }
            }
            // Email addresses and profile links usually live inside hyperlinks.
            docx_rs::ParagraphChild::Hyperlink(link) => {
                text.push_str(&paragraph_text(&link.children));
            }
            _ => {}
        }
    }
    text
}

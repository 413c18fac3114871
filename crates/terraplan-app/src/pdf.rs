//! PDF text extraction behind a trait seam so pipelines can run against fakes.

use std::path::{Path, PathBuf};

use pdfium_render::prelude::{Pdfium, PdfiumError};
use thiserror::Error;

/// Errors emitted while extracting text from PDF documents.
#[derive(Debug, Error)]
pub enum PdfTextError {
    #[error("failed to read PDF file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load Pdfium runtime: {0}")]
    Library(#[from] PdfiumError),
    #[error("failed to load PDF document: {0}")]
    Document(#[source] PdfiumError),
    #[error("failed to extract text for page {page_index}: {source}")]
    PageText {
        page_index: usize,
        #[source]
        source: PdfiumError,
    },
}

/// Collaborator turning a document on disk into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, PdfTextError>;
}

/// Pdfium-backed extractor used in production.
pub struct PdfiumExtractor;

impl TextExtractor for PdfiumExtractor {
    fn extract(&self, path: &Path) -> Result<String, PdfTextError> {
        let bytes = std::fs::read(path).map_err(|source| PdfTextError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        extract_text_from_pdf(&bytes)
    }
}

/// Extracts UTF-8 text from a PDF byte slice, joining page texts with blank
/// lines and preserving Czech diacritics.
pub fn extract_text_from_pdf(bytes: &[u8]) -> Result<String, PdfTextError> {
    let pdfium = load_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(PdfTextError::Document)?;

    let mut buffer = String::new();

    for (page_index, page) in document.pages().iter().enumerate() {
        let page_text = page
            .text()
            .map_err(|source| PdfTextError::PageText { page_index, source })?
            .all();

        if page_text.is_empty() {
            continue;
        }

        if buffer.is_empty() {
            buffer.push_str(&page_text);
        } else {
            buffer.push_str("\n\n");
            buffer.push_str(&page_text);
        }
    }

    Ok(buffer)
}

fn load_pdfium() -> Result<Pdfium, PdfiumError> {
    if let Ok(path) = std::env::var("PDFIUM_LIBRARY_PATH") {
        return Pdfium::bind_to_library(&path).map(Pdfium::new);
    }
    Pdfium::bind_to_system_library().map(Pdfium::new)
}

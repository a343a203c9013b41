use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chunking::normalize_text;
use crate::domain::PageSpan;
use crate::error::AppError;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Result of extracting one document: every page that produced text, plus bookkeeping the
/// ingestion report needs. Pages that decoded to nothing are neither spans nor skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Extraction {
    pub page_count: u32,
    pub spans: Vec<PageSpan>,
    /// Pages whose text could not be decoded.
    pub skipped_pages: Vec<u32>,
}

impl Extraction {
    pub fn has_text(&self) -> bool {
        !self.spans.is_empty()
    }
}

pub trait Extractor: Send + Sync {
    fn extract(&self, bytes: &[u8], document_name: &str) -> Result<Extraction, AppError>;
}

#[derive(Debug, Clone, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    // Some producers emit a few junk bytes before the header; readers accept up to 1KB.
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

impl Extractor for PdfExtractor {
    fn extract(&self, bytes: &[u8], document_name: &str) -> Result<Extraction, AppError> {
        if !looks_like_pdf(bytes) {
            return Err(AppError::new("DOC_UNREADABLE", "Document is not a PDF")
                .with_details(format!("document={document_name}")));
        }

        let doc = lopdf::Document::load_mem(bytes).map_err(|e| {
            AppError::new("DOC_UNREADABLE", "Invalid or corrupted PDF file")
                .with_details(format!("document={document_name}; err={e}"))
        })?;
        if doc.is_encrypted() {
            return Err(AppError::new("DOC_UNREADABLE", "Encrypted PDFs are not supported")
                .with_details(format!("document={document_name}")));
        }

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(AppError::new("DOC_UNREADABLE", "PDF appears to be empty")
                .with_details(format!("document={document_name}")));
        }

        let mut spans = Vec::new();
        let mut skipped_pages = Vec::new();
        for page in pages.keys().copied() {
            match doc.extract_text(&[page]) {
                Ok(text) => {
                    let text = normalize_text(&text);
                    if text.trim().is_empty() {
                        debug!(document = document_name, page, "page has no extractable text");
                        continue;
                    }
                    spans.push(PageSpan {
                        document: document_name.to_string(),
                        page,
                        text,
                    });
                }
                Err(e) => {
                    warn!(document = document_name, page, error = %e, "skipping undecodable page");
                    skipped_pages.push(page);
                }
            }
        }

        Ok(Extraction {
            page_count: pages.len() as u32,
            spans,
            skipped_pages,
        })
    }
}

//! Preview text extraction for stored PDFs.
//!
//! Extraction is best-effort: callers treat every [`ExtractError`] as
//! "no preview". The PDF parser can panic on malformed input, so panics are
//! caught here and reported as errors too.

use std::panic::{self, AssertUnwindSafe};

pub const MIME_PDF: &str = "application/pdf";

#[derive(Debug)]
pub enum ExtractError {
    UnsupportedContentType(String),
    Pdf(String),
    Panicked,
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedContentType(ct) => {
                write!(f, "unsupported content-type: {}", ct)
            }
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Panicked => write!(f, "PDF parser panicked"),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Leading text of a document: the first `max_pages` pages with whitespace
/// collapsed, cut at `max_chars` characters. `Ok(None)` when the pages hold
/// no text (e.g. scanned images).
pub fn extract_preview(
    bytes: &[u8],
    content_type: &str,
    max_pages: usize,
    max_chars: usize,
) -> Result<Option<String>, ExtractError> {
    let pages = match content_type {
        MIME_PDF => extract_pdf_pages(bytes)?,
        _ => {
            return Err(ExtractError::UnsupportedContentType(
                content_type.to_string(),
            ))
        }
    };
    Ok(summarize(&pages, max_pages, max_chars))
}

fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));
    match outcome {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Panicked),
    }
}

fn summarize(pages: &[String], max_pages: usize, max_chars: usize) -> Option<String> {
    let mut words: Vec<&str> = Vec::new();
    for page in pages.iter().take(max_pages) {
        words.extend(page.split_whitespace());
    }
    let joined = words.join(" ");
    let preview: String = joined.chars().take(max_chars).collect();
    let preview = preview.trim_end().to_string();

    if preview.is_empty() {
        None
    } else {
        Some(preview)
    }
}

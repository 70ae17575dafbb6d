
use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use crate::{ManualQaError, Result};

/// Text extracted from one PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub page: u32,
    pub text: String,
}

/// Extract per-page text from a PDF on disk.
#[inline]
pub fn extract_pages(path: &Path) -> Result<Vec<PageText>> {
    let doc = Document::load(path).map_err(|e| {
        ManualQaError::Extraction(format!("Failed to load PDF {}: {}", path.display(), e))
    })?;
    extract_document(&doc)
}

/// Extract per-page text from in-memory PDF bytes.
#[inline]
pub fn extract_pages_from_bytes(bytes: &[u8]) -> Result<Vec<PageText>> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| ManualQaError::Extraction(format!("Failed to parse PDF: {}", e)))?;
    extract_document(&doc)
}

fn extract_document(doc: &Document) -> Result<Vec<PageText>> {
    let page_map = doc.get_pages();
    let mut page_numbers: Vec<u32> = page_map.keys().copied().collect();
    page_numbers.sort_unstable();

    if page_numbers.is_empty() {
        return Err(ManualQaError::Extraction(
            "PDF contains no pages".to_string(),
        ));
    }

    debug!("Extracting text from {} pages", page_numbers.len());

    let mut pages = Vec::with_capacity(page_numbers.len());
    for page_number in page_numbers {
        let raw = match doc.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to extract text from page {}: {}", page_number, e);
                String::new()
            }
        };

        pages.push(PageText {
            page: page_number,
            text: normalize_text(&raw),
        });
    }

    if pages.iter().all(|p| p.text.is_empty()) {
        return Err(ManualQaError::Extraction(
            "No text content extracted from PDF".to_string(),
        ));
    }

    Ok(pages)
}

/// Collapse padding whitespace while keeping line structure the chunker
/// splits on.
fn normalize_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

//! Text-layer detection for report PDFs
//!
//! The geometric pipeline only works on text-bearing PDFs (scanned reports
//! would need OCR, which is out of scope). A fast byte scan of the content
//! streams for show-text operators tells the two apart without interpreting
//! the streams, so callers can surface "no text layer" instead of a silent
//! empty result.

use crate::ExtractError;
use lopdf::{Document, Object, ObjectId};
use std::path::Path;

/// Outcome of scanning a document's content streams for text operators
#[derive(Debug, Clone, Copy)]
pub struct TextLayerReport {
    /// Number of pages in the document
    pub page_count: u32,
    /// Pages on which at least one show-text operator was found
    pub pages_with_text: u32,
    /// Total show-text operators across all pages
    pub text_ops: u32,
}

impl TextLayerReport {
    /// True when the document carries any extractable text at all
    pub fn has_text_layer(&self) -> bool {
        self.pages_with_text > 0
    }
}

/// Inspect a PDF file's text layer
pub fn inspect_report<P: AsRef<Path>>(path: P) -> Result<TextLayerReport, ExtractError> {
    let doc = Document::load(path)?;
    Ok(inspect_text_layer(&doc))
}

/// Inspect a PDF memory buffer's text layer
pub fn inspect_report_mem(buffer: &[u8]) -> Result<TextLayerReport, ExtractError> {
    let doc = Document::load_mem(buffer)?;
    Ok(inspect_text_layer(&doc))
}

/// Scan every page of a loaded document for show-text operators
pub fn inspect_text_layer(doc: &Document) -> TextLayerReport {
    let pages = doc.get_pages();
    let mut pages_with_text = 0u32;
    let mut text_ops = 0u32;

    for (_, &page_id) in pages.iter() {
        let ops = count_show_text_ops(doc, page_id);
        if ops > 0 {
            pages_with_text += 1;
        }
        text_ops += ops;
    }

    TextLayerReport {
        page_count: pages.len() as u32,
        pages_with_text,
        text_ops,
    }
}

/// Count show-text operators on a single page
fn count_show_text_ops(doc: &Document, page_id: ObjectId) -> u32 {
    let mut ops = 0u32;

    for content_id in doc.get_page_contents(page_id) {
        if let Ok(Object::Stream(stream)) = doc.get_object(content_id) {
            let content = match stream.decompressed_content() {
                Ok(data) => data,
                Err(_) => stream.content.clone(),
            };
            ops += scan_for_show_text(&content);
        }
    }

    ops
}

/// Fast scan of content stream bytes for "Tj" / "TJ" operators.
///
/// Operator tokens must be followed by whitespace or end-of-stream to
/// avoid counting e.g. string contents.
fn scan_for_show_text(content: &[u8]) -> u32 {
    let mut text_ops = 0u32;

    let mut i = 0;
    while i < content.len() {
        if content[i] == b'T' && i + 1 < content.len() {
            let next = content[i + 1];
            if next == b'j' || next == b'J' {
                if i + 2 >= content.len() || content[i + 2].is_ascii_whitespace() {
                    text_ops += 1;
                }
            }
        }
        i += 1;
    }

    text_ops
}

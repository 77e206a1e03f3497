//! Lab report PDF extraction using lopdf
//!
//! This crate recovers tabular lab results from PDFs that expose only a
//! flat list of positioned text fragments:
//! - Positioned fragment extraction from content streams
//! - Visual line reconstruction from fragment baselines
//! - Column calibration from the report's header line, with gap-based
//!   splitting as the fallback
//! - Normalization into dated, typed lab-result records

pub mod detector;
pub mod extractor;
pub mod lines;
pub mod rows;

pub use detector::{inspect_report, inspect_report_mem, inspect_text_layer, TextLayerReport};
pub use extractor::{extract_fragments, extract_fragments_mem, TextFragment};
pub use lines::{group_into_lines, Line};
pub use rows::{assemble_records, calibrate, classify_row, LabResult, ParseOptions};

use log::warn;
use lopdf::Document;
use std::path::Path;

/// High-level report processing result
#[derive(Debug)]
pub struct ReportSummary {
    /// Extracted records in document reading order
    pub records: Vec<LabResult>,
    /// Page count
    pub page_count: u32,
    /// Positioned fragments found across all pages
    pub fragment_count: usize,
    /// Reconstructed visual lines
    pub line_count: usize,
    /// X coordinate of the name column, if a header line was found
    pub calibration: Option<f32>,
    /// False when the document carries no show-text operators (scanned)
    pub has_text_layer: bool,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Process a lab report PDF file into records plus extraction statistics.
///
/// A document without a text layer yields an empty record set, not an
/// error; only an unreadable or encrypted document fails.
pub fn process_report<P: AsRef<Path>>(
    path: P,
    options: &ParseOptions,
) -> Result<ReportSummary, ExtractError> {
    let doc = Document::load(path)?;
    process_loaded(&doc, options)
}

/// Process a lab report PDF from a memory buffer
pub fn process_report_mem(
    buffer: &[u8],
    options: &ParseOptions,
) -> Result<ReportSummary, ExtractError> {
    let doc = Document::load_mem(buffer)?;
    process_loaded(&doc, options)
}

fn process_loaded(doc: &Document, options: &ParseOptions) -> Result<ReportSummary, ExtractError> {
    let start = std::time::Instant::now();

    if doc.is_encrypted() {
        return Err(ExtractError::Encrypted);
    }

    let layer = inspect_text_layer(doc);
    if !layer.has_text_layer() {
        warn!(
            "document has no text layer across {} page(s); returning no records",
            layer.page_count
        );
        return Ok(ReportSummary {
            records: Vec::new(),
            page_count: layer.page_count,
            fragment_count: 0,
            line_count: 0,
            calibration: None,
            has_text_layer: false,
            processing_time_ms: start.elapsed().as_millis() as u64,
        });
    }

    let fragments = extractor::extract_fragments_from_doc(doc);
    let fragment_count = fragments.len();

    let lines = lines::group_into_lines(fragments);
    let calibration = rows::calibrate(&lines, options);

    let records: Vec<LabResult> = lines
        .iter()
        .filter_map(|line| rows::classify_row(line, calibration, options))
        .collect();

    Ok(ReportSummary {
        records,
        page_count: layer.page_count,
        fragment_count,
        line_count: lines.len(),
        calibration,
        has_text_layer: true,
        processing_time_ms: start.elapsed().as_millis() as u64,
    })
}

/// Extract records from a lab report PDF file with default options
pub fn extract_records<P: AsRef<Path>>(path: P) -> Result<Vec<LabResult>, ExtractError> {
    let doc = Document::load(path)?;
    extract_from_doc(&doc, &ParseOptions::default())
}

/// Extract records from a PDF memory buffer with default options
pub fn extract_records_mem(buffer: &[u8]) -> Result<Vec<LabResult>, ExtractError> {
    let doc = Document::load_mem(buffer)?;
    extract_from_doc(&doc, &ParseOptions::default())
}

fn extract_from_doc(doc: &Document, options: &ParseOptions) -> Result<Vec<LabResult>, ExtractError> {
    if doc.is_encrypted() {
        return Err(ExtractError::Encrypted);
    }

    let fragments = extractor::extract_fragments_from_doc(doc);
    let lines = lines::group_into_lines(fragments);
    Ok(rows::assemble_records(&lines, options))
}

/// Strategy seam: anything that turns report bytes into an ordered record
/// sequence. Lets callers slot in an alternate extraction path (e.g. a
/// remote service) behind the same output contract; the offline geometric
/// pipeline below is the only in-crate implementation.
pub trait RecordSource {
    fn extract(&self, buffer: &[u8]) -> Result<Vec<LabResult>, ExtractError>;
}

/// The offline geometric extraction pipeline
#[derive(Debug, Clone, Default)]
pub struct GeometricExtractor {
    pub options: ParseOptions,
}

impl RecordSource for GeometricExtractor {
    fn extract(&self, buffer: &[u8]) -> Result<Vec<LabResult>, ExtractError> {
        let doc = Document::load_mem(buffer)?;
        extract_from_doc(&doc, &self.options)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("PDF is encrypted")]
    Encrypted,
}

impl From<lopdf::Error> for ExtractError {
    fn from(e: lopdf::Error) -> Self {
        ExtractError::Parse(e.to_string())
    }
}

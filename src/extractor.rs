//! Positioned text extraction from PDF content streams using lopdf
//!
//! The downstream column-splitting logic needs fragment widths, so the
//! interpreter tracks per-font width tables and advances the text matrix
//! after every show-text operator.

use crate::ExtractError;
use log::warn;
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::path::Path;

/// A positioned run of text as reported by a page's text layer.
///
/// Extraction order is content-stream order, not layout order; ordering is
/// only meaningful after line reconstruction.
#[derive(Debug, Clone)]
pub struct TextFragment {
    /// The text content (non-empty after trim)
    pub text: String,
    /// X position of the baseline start
    pub x: f32,
    /// Y position of the baseline (PDF coordinates, origin at bottom-left)
    pub y: f32,
    /// Horizontal advance of the text
    pub width: f32,
    /// Height (approximated from the effective font size)
    pub height: f32,
    /// Page number (1-indexed)
    pub page: u32,
}

/// Extract positioned fragments from a PDF file
pub fn extract_fragments<P: AsRef<Path>>(path: P) -> Result<Vec<TextFragment>, ExtractError> {
    let doc = Document::load(path)?;
    Ok(extract_fragments_from_doc(&doc))
}

/// Extract positioned fragments from a PDF memory buffer
pub fn extract_fragments_mem(buffer: &[u8]) -> Result<Vec<TextFragment>, ExtractError> {
    let doc = Document::load_mem(buffer)?;
    Ok(extract_fragments_from_doc(&doc))
}

/// Extract positioned fragments from a loaded document, page-ascending.
///
/// A page whose content stream cannot be decoded is logged and skipped;
/// only whole-document load failure is surfaced to the caller.
pub fn extract_fragments_from_doc(doc: &Document) -> Vec<TextFragment> {
    let pages = doc.get_pages();
    let mut all_fragments = Vec::new();

    for (page_num, &page_id) in pages.iter() {
        match extract_page_fragments(doc, page_id, *page_num) {
            Ok(fragments) => all_fragments.extend(fragments),
            Err(e) => warn!("skipping page {page_num}: {e}"),
        }
    }

    all_fragments
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Extract text fragments from a single page
fn extract_page_fragments(
    doc: &Document,
    page_id: ObjectId,
    page_num: u32,
) -> Result<Vec<TextFragment>, ExtractError> {
    use lopdf::content::Content;

    let mut fragments = Vec::new();

    // Fonts for encoding and width lookup
    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let mut width_tables: HashMap<String, Option<FontWidths>> = HashMap::new();

    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| ExtractError::Parse(e.to_string()))?;

    let content = Content::decode(&content_data).map_err(|e| ExtractError::Parse(e.to_string()))?;

    // Graphics state tracking
    let mut ctm = [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut ctm_stack: Vec<[f32; 6]> = Vec::new();

    // Text state tracking
    let mut current_font = String::new();
    let mut current_font_size: f32 = 12.0;
    let mut text_matrix = [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut line_matrix = [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut in_text_block = false;

    for op in &content.operations {
        match op.operator.as_str() {
            "q" => {
                ctm_stack.push(ctm);
            }
            "Q" => {
                if let Some(saved) = ctm_stack.pop() {
                    ctm = saved;
                }
            }
            "cm" => {
                if op.operands.len() >= 6 {
                    let new_matrix = [
                        get_number(&op.operands[0]).unwrap_or(1.0),
                        get_number(&op.operands[1]).unwrap_or(0.0),
                        get_number(&op.operands[2]).unwrap_or(0.0),
                        get_number(&op.operands[3]).unwrap_or(1.0),
                        get_number(&op.operands[4]).unwrap_or(0.0),
                        get_number(&op.operands[5]).unwrap_or(0.0),
                    ];
                    ctm = multiply_matrices(&new_matrix, &ctm);
                }
            }
            "BT" => {
                in_text_block = true;
                text_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
                line_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
            }
            "ET" => {
                in_text_block = false;
            }
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name() {
                        current_font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = get_number(&op.operands[1]) {
                        current_font_size = size;
                    }
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = get_number(&op.operands[0]).unwrap_or(0.0);
                    let ty = get_number(&op.operands[1]).unwrap_or(0.0);
                    line_matrix[4] += tx;
                    line_matrix[5] += ty;
                    text_matrix = line_matrix;
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    for (i, operand) in op.operands.iter().take(6).enumerate() {
                        text_matrix[i] =
                            get_number(operand).unwrap_or(if i == 0 || i == 3 { 1.0 } else { 0.0 });
                    }
                    line_matrix = text_matrix;
                }
            }
            "T*" => {
                // Move to start of next line
                line_matrix[5] -= current_font_size * 1.2; // Approximate line height
                text_matrix = line_matrix;
            }
            "Tj" => {
                if in_text_block && !op.operands.is_empty() {
                    if let Object::String(bytes, _) = &op.operands[0] {
                        show_text(
                            doc,
                            &fonts,
                            &current_font,
                            current_font_size,
                            &mut width_tables,
                            bytes,
                            &mut text_matrix,
                            &ctm,
                            page_num,
                            &mut fragments,
                        );
                    }
                }
            }
            "TJ" => {
                // Show text with individual glyph positioning; the whole
                // array becomes one fragment, kerning offsets included in
                // the advance.
                if in_text_block && !op.operands.is_empty() {
                    if let Ok(array) = op.operands[0].as_array() {
                        let start = multiply_matrices(&text_matrix, &ctm);
                        let mut combined_text = String::new();
                        let mut displacement = 0.0f32;

                        for element in array {
                            match element {
                                Object::String(bytes, _) => {
                                    combined_text
                                        .push_str(&decode_string(doc, &fonts, &current_font, bytes));
                                    let widths =
                                        font_widths(doc, &fonts, &current_font, &mut width_tables);
                                    displacement +=
                                        text_displacement(bytes, widths, current_font_size);
                                }
                                _ => {
                                    if let Some(offset) = get_number(element) {
                                        displacement -= offset / 1000.0 * current_font_size;
                                    }
                                }
                            }
                        }

                        if !combined_text.trim().is_empty() {
                            let rendered_size =
                                effective_font_size(current_font_size, &text_matrix);
                            let scale_x = (start[0].powi(2) + start[1].powi(2)).sqrt();
                            fragments.push(TextFragment {
                                text: combined_text,
                                x: start[4],
                                y: start[5],
                                width: displacement * scale_x,
                                height: rendered_size,
                                page: page_num,
                            });
                        }

                        advance_text_matrix(&mut text_matrix, displacement);
                    }
                }
            }
            "'" => {
                // Move to next line and show text
                line_matrix[5] -= current_font_size * 1.2;
                text_matrix = line_matrix;
                if !op.operands.is_empty() {
                    if let Object::String(bytes, _) = &op.operands[0] {
                        show_text(
                            doc,
                            &fonts,
                            &current_font,
                            current_font_size,
                            &mut width_tables,
                            bytes,
                            &mut text_matrix,
                            &ctm,
                            page_num,
                            &mut fragments,
                        );
                    }
                }
            }
            "\"" => {
                // Set word/char spacing, move to next line, show text
                line_matrix[5] -= current_font_size * 1.2;
                text_matrix = line_matrix;
                if op.operands.len() >= 3 {
                    if let Object::String(bytes, _) = &op.operands[2] {
                        show_text(
                            doc,
                            &fonts,
                            &current_font,
                            current_font_size,
                            &mut width_tables,
                            bytes,
                            &mut text_matrix,
                            &ctm,
                            page_num,
                            &mut fragments,
                        );
                    }
                }
            }
            _ => {}
        }
    }

    Ok(fragments)
}

/// Decode one string operand, emit a fragment and advance the text matrix
#[allow(clippy::too_many_arguments)]
fn show_text(
    doc: &Document,
    fonts: &std::collections::BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    current_font: &str,
    font_size: f32,
    width_tables: &mut HashMap<String, Option<FontWidths>>,
    bytes: &[u8],
    text_matrix: &mut [f32; 6],
    ctm: &[f32; 6],
    page: u32,
    out: &mut Vec<TextFragment>,
) {
    let text = decode_string(doc, fonts, current_font, bytes);
    let widths = font_widths(doc, fonts, current_font, width_tables);
    let displacement = text_displacement(bytes, widths, font_size);

    if !text.trim().is_empty() {
        let rendered_size = effective_font_size(font_size, text_matrix);
        let combined = multiply_matrices(text_matrix, ctm);
        let scale_x = (combined[0].powi(2) + combined[1].powi(2)).sqrt();

        out.push(TextFragment {
            text,
            x: combined[4],
            y: combined[5],
            width: displacement * scale_x,
            height: rendered_size,
            page,
        });
    }

    advance_text_matrix(text_matrix, displacement);
}

/// Translate the text matrix by a horizontal displacement in text space
fn advance_text_matrix(text_matrix: &mut [f32; 6], displacement: f32) {
    text_matrix[4] += displacement * text_matrix[0];
    text_matrix[5] += displacement * text_matrix[1];
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Compute effective font size from base size and text matrix
/// Text matrix is [a, b, c, d, tx, ty] where a,d are scale factors
fn effective_font_size(base_size: f32, text_matrix: &[f32; 6]) -> f32 {
    let scale_x = (text_matrix[0].powi(2) + text_matrix[1].powi(2)).sqrt();
    let scale_y = (text_matrix[2].powi(2) + text_matrix[3].powi(2)).sqrt();
    // Usually equal for non-rotated text
    let scale = scale_x.max(scale_y);
    base_size * scale
}

/// Glyph width table for a simple font, in glyph space units (1/1000 em)
#[derive(Debug, Clone)]
struct FontWidths {
    first_char: i64,
    widths: Vec<f32>,
    missing_width: f32,
}

impl FontWidths {
    fn glyph_width(&self, code: u8) -> f32 {
        let index = code as i64 - self.first_char;
        if index >= 0 && (index as usize) < self.widths.len() {
            self.widths[index as usize]
        } else {
            self.missing_width
        }
    }
}

/// Horizontal displacement of a string in unscaled text space.
///
/// With a width table: sum of glyph advances. Without one (standard fonts
/// whose dictionaries omit /Widths), fall back to half an em per character.
fn text_displacement(bytes: &[u8], widths: Option<&FontWidths>, font_size: f32) -> f32 {
    match widths {
        Some(table) => {
            bytes.iter().map(|&code| table.glyph_width(code)).sum::<f32>() / 1000.0 * font_size
        }
        None => bytes.len() as f32 * 0.5 * font_size,
    }
}

/// Look up (and lazily load) the width table for the current font
fn font_widths<'a>(
    doc: &Document,
    fonts: &std::collections::BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    current_font: &str,
    cache: &'a mut HashMap<String, Option<FontWidths>>,
) -> Option<&'a FontWidths> {
    cache
        .entry(current_font.to_string())
        .or_insert_with(|| {
            fonts
                .get(current_font.as_bytes())
                .and_then(|font_dict| load_font_widths(doc, font_dict))
        })
        .as_ref()
}

/// Read /FirstChar + /Widths (+ /MissingWidth) from a simple font dictionary.
///
/// Standard fonts may legitimately omit all three; the caller falls back to
/// an estimate in that case.
fn load_font_widths(doc: &Document, font: &lopdf::Dictionary) -> Option<FontWidths> {
    let first_char = resolve(doc, font.get(b"FirstChar").ok()?).as_i64().ok()?;

    let widths_obj = resolve(doc, font.get(b"Widths").ok()?);
    let widths: Vec<f32> = widths_obj
        .as_array()
        .ok()?
        .iter()
        .filter_map(|w| get_number(resolve(doc, w)))
        .collect();

    if widths.is_empty() {
        return None;
    }

    let missing_width = font
        .get(b"MissingWidth")
        .ok()
        .and_then(|w| get_number(resolve(doc, w)))
        .unwrap_or(0.0);

    Some(FontWidths {
        first_char,
        widths,
        missing_width,
    })
}

/// Follow a reference one level if needed
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Decode a string operand's bytes, handling font encoding
fn decode_string(
    doc: &Document,
    fonts: &std::collections::BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    current_font: &str,
    bytes: &[u8],
) -> String {
    // Try to decode using font encoding
    if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return text;
            }
        }
    }

    // Fallback: UTF-16BE (BOM: 0xFE 0xFF), then Latin-1
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    bytes.iter().map(|&b| b as char).collect()
}

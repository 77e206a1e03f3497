//! Row classification and column splitting
//!
//! Turns reconstructed lines into lab-result records. A data row starts
//! with a DD/MM/YYYY date and ends with a numeric value; the interior
//! fragments are split into a category ("exam type") and a name column,
//! either at an x boundary learned from the report's header line or, absent
//! a header, at the widest horizontal gap.

use crate::extractor::TextFragment;
use crate::lines::Line;
use chrono::NaiveDate;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A normalized lab-result record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    pub date: NaiveDate,
    pub exam_type: String,
    pub exam_name: String,
    pub value: f64,
}

/// Options for row classification and column splitting
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Header marker naming the category column
    pub category_marker: String,
    /// Header marker naming the name column; its fragment's x becomes the
    /// calibration value
    pub name_marker: String,
    /// Tolerance subtracted from the calibrated x before partitioning
    pub calibration_margin: f32,
    /// Minimum horizontal gap that counts as a column separation
    pub min_column_gap: f32,
    /// Category label for rows whose category cannot be determined
    pub default_category: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            category_marker: "ExamType".to_string(),
            name_marker: "Exam".to_string(),
            calibration_margin: 20.0,
            min_column_gap: 15.0,
            default_category: "General".to_string(),
        }
    }
}

/// Strict DD/MM/YYYY (or DD.MM.YYYY) date token
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})[/.](\d{2})[/.](\d{4})$").unwrap());

/// Scan lines for a header naming both columns; the x of the name-column
/// marker becomes the document's calibration value.
///
/// Only the first header line matters: once a line contains both markers
/// the scan stops, whether or not an exactly-matching fragment was found.
pub fn calibrate(lines: &[Line], options: &ParseOptions) -> Option<f32> {
    for line in lines {
        let full_text = line.text();
        if full_text.contains(&options.category_marker) && full_text.contains(&options.name_marker)
        {
            return line
                .fragments
                .iter()
                .find(|f| f.text.trim() == options.name_marker)
                .map(|f| f.x);
        }
    }
    None
}

/// Validate a line as a data row and split it into a record.
///
/// Returns `None` for the many lines of a report that are not data rows
/// (titles, reference ranges, footers); that is not an error.
pub fn classify_row(
    line: &Line,
    calibration: Option<f32>,
    options: &ParseOptions,
) -> Option<LabResult> {
    // Needs at least date, one interior fragment, value
    if line.fragments.len() < 3 {
        return None;
    }

    let first = &line.fragments[0];
    let last = &line.fragments[line.fragments.len() - 1];

    let caps = DATE_RE.captures(first.text.trim())?;
    let value = parse_value(last.text.trim())?;

    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    let date = match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => date,
        None => {
            debug!("rejecting row at y={}: invalid calendar date {}", line.y, first.text.trim());
            return None;
        }
    };

    let interior = &line.fragments[1..line.fragments.len() - 1];
    if interior.is_empty() {
        return None;
    }

    let (exam_type, exam_name) = split_columns(interior, calibration, options);

    if exam_name.is_empty() {
        debug!("skipping row at y={}: name column resolved empty", line.y);
        return None;
    }

    let exam_type = if exam_type.is_empty() {
        options.default_category.clone()
    } else {
        exam_type
    };

    Some(LabResult {
        date,
        exam_type,
        exam_name,
        value,
    })
}

/// Split interior fragments into (category, name).
///
/// Policies apply in priority order and short-circuit:
/// 1. calibrated split at `calibration - margin`;
/// 2. widest horizontal gap, if it exceeds the minimum column gap;
/// 3. exactly two fragments: one each;
/// 4. degenerate: everything is the name, category left empty for the
///    caller's default label.
fn split_columns(
    interior: &[TextFragment],
    calibration: Option<f32>,
    options: &ParseOptions,
) -> (String, String) {
    if let Some(name_x) = calibration {
        let boundary = name_x - options.calibration_margin;
        let category: Vec<&TextFragment> = interior.iter().filter(|f| f.x < boundary).collect();
        let name: Vec<&TextFragment> = interior.iter().filter(|f| f.x >= boundary).collect();
        return (join_refs(&category), join_refs(&name));
    }

    let mut max_gap = 0.0f32;
    let mut split_index = None;

    for (i, pair) in interior.windows(2).enumerate() {
        // Distance between the end of one fragment and the start of the next
        let gap = pair[1].x - (pair[0].x + pair[0].width);
        if gap > max_gap {
            max_gap = gap;
            split_index = Some(i);
        }
    }

    if let Some(i) = split_index {
        if max_gap > options.min_column_gap {
            let (category, name) = interior.split_at(i + 1);
            return (join(category), join(name));
        }
    }

    if interior.len() == 2 {
        return (
            interior[0].text.trim().to_string(),
            interior[1].text.trim().to_string(),
        );
    }

    (String::new(), join(interior))
}

/// Run calibration, then classify every line, preserving reading order.
///
/// No deduplication or sorting happens here; downstream consumers own that.
pub fn assemble_records(lines: &[Line], options: &ParseOptions) -> Vec<LabResult> {
    let calibration = calibrate(lines, options);
    match calibration {
        Some(x) => debug!("name column calibrated at x={x:.1}"),
        None => debug!("no header line found, falling back to gap splitting"),
    }

    lines
        .iter()
        .filter_map(|line| classify_row(line, calibration, options))
        .collect()
}

/// Strict full-token numeric parse, comma accepted as decimal separator
fn parse_value(raw: &str) -> Option<f64> {
    let normalized = raw.replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn join(fragments: &[TextFragment]) -> String {
    fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn join_refs(fragments: &[&TextFragment]) -> String {
    fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, x: f32) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            x,
            y: 500.0,
            width: text.len() as f32 * 6.0,
            height: 12.0,
            page: 1,
        }
    }

    fn frag_w(text: &str, x: f32, width: f32) -> TextFragment {
        TextFragment {
            width,
            ..frag(text, x)
        }
    }

    fn line(fragments: Vec<TextFragment>) -> Line {
        Line {
            y: 500.0,
            page: 1,
            fragments,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_options_defaults() {
        let options = ParseOptions::default();
        assert_eq!(options.category_marker, "ExamType");
        assert_eq!(options.name_marker, "Exam");
        assert_eq!(options.calibration_margin, 20.0);
        assert_eq!(options.min_column_gap, 15.0);
        assert_eq!(options.default_category, "General");
    }

    #[test]
    fn test_accepts_data_row_with_comma_decimal() {
        let options = ParseOptions::default();
        let row = line(vec![
            frag("15/03/2024", 30.0),
            frag("Hemogram", 100.0),
            frag("4,5", 400.0),
        ]);
        let record = classify_row(&row, None, &options).unwrap();
        assert_eq!(record.date, date(2024, 3, 15));
        assert_eq!(record.value, 4.5);
    }

    #[test]
    fn test_rejects_iso_date_token() {
        let options = ParseOptions::default();
        let row = line(vec![
            frag("2024-03-15", 30.0),
            frag("Hemogram", 100.0),
            frag("4.5", 400.0),
        ]);
        assert!(classify_row(&row, None, &options).is_none());
    }

    #[test]
    fn test_rejects_invalid_calendar_date() {
        let options = ParseOptions::default();
        let row = line(vec![
            frag("45/13/2024", 30.0),
            frag("Hemogram", 100.0),
            frag("4.5", 400.0),
        ]);
        assert!(classify_row(&row, None, &options).is_none());
    }

    #[test]
    fn test_accepts_dotted_and_mixed_separators() {
        // Each separator position matches independently, as in the
        // original layout; both dots and a dot/slash mix are accepted.
        let options = ParseOptions::default();
        for token in ["15.03.2024", "15/03.2024"] {
            let row = line(vec![
                frag(token, 30.0),
                frag("Hemogram", 100.0),
                frag("4.5", 400.0),
            ]);
            assert!(classify_row(&row, None, &options).is_some(), "{token}");
        }
    }

    #[test]
    fn test_strict_value_parsing_rejects_trailing_garbage() {
        let options = ParseOptions::default();
        let row = line(vec![
            frag("15/03/2024", 30.0),
            frag("Hemogram", 100.0),
            frag("5abc", 400.0),
        ]);
        assert!(classify_row(&row, None, &options).is_none());
    }

    #[test]
    fn test_rejects_short_lines() {
        let options = ParseOptions::default();
        let row = line(vec![frag("15/03/2024", 30.0), frag("4.5", 400.0)]);
        assert!(classify_row(&row, None, &options).is_none());
    }

    #[test]
    fn test_gap_split_at_widest_gap() {
        // Interior at x = [0, 20, 100, 115], widths 15: the 65-unit gap
        // between x=20 (end 35) and x=100 wins and exceeds the threshold.
        let options = ParseOptions::default();
        let row = line(vec![
            frag("01/01/2024", -50.0),
            frag_w("Blood", 0.0, 15.0),
            frag_w("Panel", 20.0, 15.0),
            frag_w("Vitamin", 100.0, 15.0),
            frag_w("D", 115.0, 15.0),
            frag("32.0", 300.0),
        ]);
        let record = classify_row(&row, None, &options).unwrap();
        assert_eq!(record.exam_type, "Blood Panel");
        assert_eq!(record.exam_name, "Vitamin D");
    }

    #[test]
    fn test_gap_below_threshold_uses_two_fragment_fallback() {
        let options = ParseOptions::default();
        let row = line(vec![
            frag("01/01/2024", 0.0),
            frag_w("Hormonal", 100.0, 50.0),
            frag_w("TSH", 160.0, 20.0), // gap 10 < 15
            frag("3.2", 300.0),
        ]);
        let record = classify_row(&row, None, &options).unwrap();
        assert_eq!(record.exam_type, "Hormonal");
        assert_eq!(record.exam_name, "TSH");
    }

    #[test]
    fn test_degenerate_fallback_single_interior_fragment() {
        let options = ParseOptions::default();
        let row = line(vec![
            frag("01/01/2024", 0.0),
            frag("Glucose", 100.0),
            frag("99.0", 300.0),
        ]);
        let record = classify_row(&row, None, &options).unwrap();
        assert_eq!(record.exam_type, "General");
        assert_eq!(record.exam_name, "Glucose");
    }

    #[test]
    fn test_degenerate_fallback_many_tight_fragments() {
        // Three interior fragments with no qualifying gap: all become the
        // name, category falls back to the default label.
        let options = ParseOptions::default();
        let row = line(vec![
            frag("01/01/2024", 0.0),
            frag_w("Total", 100.0, 30.0),
            frag_w("Iron", 132.0, 24.0),
            frag_w("Binding", 158.0, 40.0),
            frag("270.0", 300.0),
        ]);
        let record = classify_row(&row, None, &options).unwrap();
        assert_eq!(record.exam_type, "General");
        assert_eq!(record.exam_name, "Total Iron Binding");
    }

    #[test]
    fn test_calibrated_split_boundary_arithmetic() {
        // Calibration 150, margin 20: boundary at 130. x < 130 is
        // category, x >= 130 is name.
        let options = ParseOptions::default();
        let calibration = Some(150.0);

        let category_side = classify_row(
            &line(vec![
                frag("01/01/2024", 0.0),
                frag("Lipids", 129.9),
                frag("HDL", 200.0),
                frag("55.0", 400.0),
            ]),
            calibration,
            &options,
        )
        .unwrap();
        assert_eq!(category_side.exam_type, "Lipids");
        assert_eq!(category_side.exam_name, "HDL");

        for x in [130.0, 135.0] {
            let record = classify_row(
                &line(vec![
                    frag("01/01/2024", 0.0),
                    frag("Lipids", 60.0),
                    frag("HDL", x),
                    frag("55.0", 400.0),
                ]),
                calibration,
                &options,
            )
            .unwrap();
            assert_eq!(record.exam_name, "HDL", "x={x}");
        }
    }

    #[test]
    fn test_calibrated_split_empty_category_gets_default_label() {
        // Everything sits right of the boundary
        let options = ParseOptions::default();
        let record = classify_row(
            &line(vec![
                frag("01/01/2024", 0.0),
                frag("Ferritin", 200.0),
                frag("140.0", 400.0),
            ]),
            Some(150.0),
            &options,
        )
        .unwrap();
        assert_eq!(record.exam_type, "General");
        assert_eq!(record.exam_name, "Ferritin");
    }

    #[test]
    fn test_calibrated_split_empty_name_skips_row() {
        // Everything sits left of the boundary; the row carries no name
        let options = ParseOptions::default();
        let result = classify_row(
            &line(vec![
                frag("01/01/2024", 0.0),
                frag("Lipids", 60.0),
                frag("55.0", 400.0),
            ]),
            Some(150.0),
            &options,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_calibrate_finds_name_marker_x() {
        let options = ParseOptions::default();
        let lines = vec![
            line(vec![frag("Laboratory Report", 40.0)]),
            line(vec![
                frag("Date", 30.0),
                frag("ExamType", 80.0),
                frag("Exam", 200.0),
                frag("Value", 350.0),
            ]),
        ];
        assert_eq!(calibrate(&lines, &options), Some(200.0));
    }

    #[test]
    fn test_calibrate_stops_at_first_header_line() {
        let options = ParseOptions::default();
        let lines = vec![
            line(vec![
                frag("ExamType", 80.0),
                frag("Exam", 200.0),
            ]),
            line(vec![
                frag("ExamType", 90.0),
                frag("Exam", 999.0),
            ]),
        ];
        assert_eq!(calibrate(&lines, &options), Some(200.0));
    }

    #[test]
    fn test_calibrate_absent_without_header() {
        let options = ParseOptions::default();
        let lines = vec![line(vec![frag("Laboratory Report", 40.0)])];
        assert_eq!(calibrate(&lines, &options), None);
    }

    #[test]
    fn test_assemble_records_preserves_line_order() {
        let options = ParseOptions::default();
        let lines = vec![
            line(vec![
                frag("02/01/2024", 0.0),
                frag("Glucose", 100.0),
                frag("99.0", 300.0),
            ]),
            line(vec![frag("Reference ranges apply to adults", 0.0)]),
            line(vec![
                frag("01/01/2024", 0.0),
                frag("TSH", 100.0),
                frag("3.2", 300.0),
            ]),
        ];
        let records = assemble_records(&lines, &options);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].exam_name, "Glucose");
        assert_eq!(records[1].exam_name, "TSH");
    }

    #[test]
    fn test_parse_value_strictness() {
        assert_eq!(parse_value("4,5"), Some(4.5));
        assert_eq!(parse_value("4.5"), Some(4.5));
        assert_eq!(parse_value("-0.7"), Some(-0.7));
        assert_eq!(parse_value("5abc"), None);
        assert_eq!(parse_value("abc"), None);
        assert_eq!(parse_value("inf"), None);
        assert_eq!(parse_value("NaN"), None);
    }

    #[test]
    fn test_record_serializes_with_iso_date() {
        let record = LabResult {
            date: date(2023, 1, 1),
            exam_type: "Hormonal".to_string(),
            exam_name: "TSH".to_string(),
            value: 3.2,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"2023-01-01\""));
        assert!(json.contains("\"TSH\""));
    }
}

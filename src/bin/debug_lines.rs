//! Debug tool: print reconstructed lines and row classification
//!
//! Usage: debug_lines <pdf_file> [page_number]
//!
//! Shows each reconstructed line with its baseline y, fragment x/width
//! positions, and whether the row classifier accepts it as a data row.

use lab_extractor::{
    calibrate, classify_row, extract_fragments, group_into_lines, ParseOptions,
};
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file> [page_number]", args[0]);
        eprintln!();
        eprintln!("Prints reconstructed lines with fragment positions and");
        eprintln!("marks the ones accepted as data rows.");
        process::exit(1);
    }

    let pdf_path = &args[1];
    let filter_page: Option<u32> = args.get(2).and_then(|s| s.parse().ok());

    let fragments = match extract_fragments(pdf_path) {
        Ok(fragments) => fragments,
        Err(e) => {
            eprintln!("Error extracting fragments: {}", e);
            process::exit(1);
        }
    };

    if fragments.is_empty() {
        eprintln!("No positioned text found in PDF.");
        process::exit(0);
    }

    let options = ParseOptions::default();
    let lines = group_into_lines(fragments);
    let calibration = calibrate(&lines, &options);

    match calibration {
        Some(x) => eprintln!("Calibration: name column at x={x:.1}"),
        None => eprintln!("Calibration: none (gap-based splitting)"),
    }
    eprintln!();

    let mut current_page = 0u32;

    for line in &lines {
        if let Some(fp) = filter_page {
            if line.page != fp {
                continue;
            }
        }

        if line.page != current_page {
            current_page = line.page;
            println!("=== Page {} ===", current_page);
        }

        let marker = match classify_row(line, calibration, &options) {
            Some(record) => format!(
                "ROW {} | {} | {} | {}",
                record.date, record.exam_type, record.exam_name, record.value
            ),
            None => "-".to_string(),
        };

        println!("y={:8.2}  {}", line.y, marker);
        for fragment in &line.fragments {
            println!(
                "    x={:8.2} w={:7.2}  {:?}",
                fragment.x, fragment.width, fragment.text
            );
        }
    }
}

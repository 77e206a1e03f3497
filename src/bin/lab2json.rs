//! CLI tool for extracting lab-result records from a report PDF

use lab_extractor::{process_report, ParseOptions};
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file> [output_file]", args[0]);
        eprintln!("       {} <pdf_file> --json", args[0]);
        eprintln!();
        eprintln!("Extracts dated lab results from a text-bearing report PDF.");
        eprintln!("Returns early if the PDF has no text layer (OCR needed).");
        process::exit(1);
    }

    let pdf_path = &args[1];
    let json_output = args.get(2).map(|a| a == "--json").unwrap_or(false);
    let output_file = if !json_output { args.get(2) } else { None };

    let options = ParseOptions::default();

    match process_report(pdf_path, &options) {
        Ok(summary) => {
            if json_output {
                println!(
                    "{}",
                    serde_json::to_string(&summary.records).expect("records serialize")
                );
                return;
            }

            println!("Lab Report Extraction");
            println!("=====================");
            println!("File: {}", pdf_path);
            println!();

            if !summary.has_text_layer {
                println!("Type: NO TEXT LAYER (scanned or image-only)");
                println!("Pages: {}", summary.page_count);
                println!();
                println!("This PDF requires OCR before extraction; only text-bearing");
                println!("reports are supported.");
                process::exit(2);
            }

            println!("Pages: {}", summary.page_count);
            println!(
                "Fragments: {} across {} lines",
                summary.fragment_count, summary.line_count
            );
            match summary.calibration {
                Some(x) => println!("Header calibration: name column at x={x:.1}"),
                None => println!("Header calibration: none (gap-based splitting)"),
            }
            println!("Processing time: {}ms", summary.processing_time_ms);
            println!();

            if summary.records.is_empty() {
                println!("No valid rows found.");
                return;
            }

            if let Some(output) = output_file {
                let json = serde_json::to_string_pretty(&summary.records)
                    .expect("records serialize");
                fs::write(output, json).expect("Failed to write output file");
                println!("{} record(s) written to: {}", summary.records.len(), output);
            } else {
                println!("--- Records ---");
                println!();
                for record in &summary.records {
                    println!(
                        "{}  {}  {}  {}",
                        record.date, record.exam_type, record.exam_name, record.value
                    );
                }
            }
        }
        Err(e) => {
            if json_output {
                println!(r#"{{"error":"{}"}}"#, e);
            } else {
                eprintln!("Error: {}", e);
            }
            process::exit(1);
        }
    }
}

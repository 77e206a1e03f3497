//! CLI tool for checking whether a report PDF carries a text layer

use lab_extractor::inspect_report;
use std::env;
use std::process;
use std::time::Instant;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file>", args[0]);
        eprintln!("       {} <pdf_file> --json", args[0]);
        process::exit(1);
    }

    let pdf_path = &args[1];
    let json_output = args.get(2).map(|a| a == "--json").unwrap_or(false);

    let start = Instant::now();

    match inspect_report(pdf_path) {
        Ok(report) => {
            let elapsed = start.elapsed();

            if json_output {
                println!(
                    r#"{{"has_text_layer":{},"page_count":{},"pages_with_text":{},"text_ops":{},"detection_time_ms":{}}}"#,
                    report.has_text_layer(),
                    report.page_count,
                    report.pages_with_text,
                    report.text_ops,
                    elapsed.as_millis()
                );
            } else {
                println!("Report Text Layer Check");
                println!("=======================");
                println!("File: {}", pdf_path);
                println!();
                println!(
                    "Type: {}",
                    if report.has_text_layer() {
                        "TEXT-BEARING (extractable)"
                    } else {
                        "NO TEXT LAYER (scanned, OCR needed)"
                    }
                );
                println!();
                println!("Page count: {}", report.page_count);
                println!("Pages with text: {}", report.pages_with_text);
                println!("Show-text operators: {}", report.text_ops);
                println!();
                println!("Detection time: {}ms", elapsed.as_millis());
            }

            if !report.has_text_layer() {
                process::exit(2);
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

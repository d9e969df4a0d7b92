//! Minimal program that mail-merges a template with a CSV file.
//!
//! Usage:
//!   cargo run --example generate_letters -- template.docx grantees.csv FY25
//!   cargo run --example generate_letters -- template.docx grantees.csv FY25 "Grant Agreement"

use bulkdocx::{DocumentGenerator, NamingScheme};
use std::{env, fs, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 4 {
        eprintln!(
            "Usage: {} <template.docx> <data.csv> <prefix> [document type]",
            args[0]
        );
        process::exit(1);
    }

    let document_type = args.get(4).map(String::as_str).unwrap_or("Award Letter");
    let naming = NamingScheme::new(args[3].as_str(), document_type);

    let generator = DocumentGenerator::from_path(&args[1]).unwrap_or_else(|e| {
        eprintln!("Error loading template: {e}");
        process::exit(1);
    });

    let data = fs::read(&args[2]).unwrap_or_else(|e| {
        eprintln!("Error reading data file: {e}");
        process::exit(1);
    });

    let report = match generator.generate(&data, &naming) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("✗ {e}");
            process::exit(1);
        }
    };

    for entry in &report.entries {
        println!("✓ {entry}");
    }
    for skipped in &report.skipped {
        println!("⚠ skipped {skipped}");
    }

    if report.is_empty() {
        eprintln!("✗ No documents generated");
        process::exit(1);
    }

    if let Err(e) = fs::write("documents.zip", &report.archive) {
        eprintln!("✗ Could not write documents.zip: {e}");
        process::exit(1);
    }
    println!("Wrote documents.zip ({} document(s))", report.entries.len());
}

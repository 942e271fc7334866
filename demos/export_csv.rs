//! CSV export example.
//!
//! Checks the endpoints listed in a file and writes the results to CSV.
//!
//! Run with: cargo run --example export_csv -- hosts.txt certificates.csv

use std::env;

use certcheck::output::export::export_csv;
use certcheck::{read_endpoints, scan, ScanOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let input = args.next().unwrap_or_else(|| "hosts.txt".to_string());
    let output = args.next().unwrap_or_else(|| "certificates.csv".to_string());

    let endpoints = read_endpoints(&input)?;
    let records: Vec<_> = scan(&endpoints, &ScanOptions::default())
        .into_iter()
        .map(|inspection| inspection.record)
        .collect();

    export_csv(&output, &records)?;
    println!("Exported {} records to {}", records.len(), output);
    Ok(())
}
